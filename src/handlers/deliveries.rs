//! Delivery handlers
//!
//! GET    /api/deliveries
//! POST   /api/deliveries
//! GET    /api/deliveries/{id}
//! PATCH  /api/deliveries/{id}
//! POST   /api/deliveries/{id}/fulfill
//! GET    /api/deliveries/{id}/operations

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::DeliveryError;
use crate::models::actor::Actor;
use crate::models::delivery::{
    CreateDeliveryRequest, DeliveryListQuery, DeliveryListResponse, DeliveryResponse,
    UpdateDeliveryRequest,
};
use crate::models::operation::{FulfillmentRequest, FulfillmentResponse, OperationResponse};
use crate::services::{delivery_creation, delivery_listing, delivery_state, fulfillment};
use crate::AppState;

fn log_failure(correlation_id: &Uuid, operation: &str, error: &DeliveryError) {
    warn!(
        correlation_id = %correlation_id,
        operation,
        code = error.code(),
        error = %error,
        "Delivery request failed"
    );
}

/// List deliveries
///
/// GET /api/deliveries?state=pending&search=perez&scheduled=true&page=1
pub async fn list_deliveries(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<DeliveryListQuery>,
) -> Result<Json<DeliveryListResponse>, DeliveryError> {
    info!(
        actor_id = actor.user_id,
        state = ?query.state,
        search = ?query.search,
        scheduled = ?query.scheduled,
        page = ?query.page,
        "Delivery list request received"
    );

    let response = delivery_listing::list_deliveries(&state.db, &actor, &query).await?;
    Ok(Json(response))
}

/// Create a delivery
///
/// POST /api/deliveries
pub async fn create_delivery(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateDeliveryRequest>,
) -> Result<(StatusCode, Json<DeliveryResponse>), DeliveryError> {
    let correlation_id = Uuid::new_v4();
    info!(
        correlation_id = %correlation_id,
        actor_id = actor.user_id,
        delivery_type = %request.delivery_type,
        items = request.items.len(),
        "Create delivery request received"
    );

    let response = delivery_creation::create_delivery(&state.db, &actor, request)
        .await
        .inspect_err(|e| log_failure(&correlation_id, "create", e))?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Delivery detail with items, history and last disposition
///
/// GET /api/deliveries/{id}
pub async fn get_delivery(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<DeliveryResponse>, DeliveryError> {
    let response = delivery_listing::get_delivery(&state.db, &actor, id).await?;
    Ok(Json(response))
}

/// State change and/or scheduled date update
///
/// PATCH /api/deliveries/{id}
///
/// ```json
/// { "id": 12, "state": "cancelled" }
/// { "scheduledDate": "2026-11-02" }
/// ```
pub async fn update_delivery(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
    Json(request): Json<UpdateDeliveryRequest>,
) -> Result<Json<DeliveryResponse>, DeliveryError> {
    let correlation_id = Uuid::new_v4();
    info!(
        correlation_id = %correlation_id,
        delivery_id = id,
        actor_id = actor.user_id,
        state = ?request.state,
        scheduled_date = ?request.scheduled_date,
        "Update delivery request received"
    );

    let response = delivery_state::apply_update(&state.db, &actor, id, request)
        .await
        .inspect_err(|e| log_failure(&correlation_id, "update", e))?;

    Ok(Json(response))
}

/// Fulfill some or all pending items
///
/// POST /api/deliveries/{id}/fulfill
///
/// ```json
/// {
///   "items": [{ "product_sku": "SKU-A", "quantity": 2, "source_store": "S2" }],
///   "carrier_id": 4,
///   "delivery_cost": "1500.00"
/// }
/// ```
///
/// `pickup_store` replaces `carrier_id` + `delivery_cost` for customer pickups.
pub async fn fulfill_delivery(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
    Json(request): Json<FulfillmentRequest>,
) -> Result<Json<FulfillmentResponse>, DeliveryError> {
    let correlation_id = Uuid::new_v4();
    info!(
        correlation_id = %correlation_id,
        delivery_id = id,
        actor_id = actor.user_id,
        items = request.items.len(),
        "Fulfillment request received"
    );

    let outcome = fulfillment::fulfill(
        &state.db,
        state.inventory.as_ref(),
        &state.events,
        &actor,
        id,
        request,
    )
    .await
    .inspect_err(|e| log_failure(&correlation_id, "fulfill", e))?;

    let operation = OperationResponse::from_parts(outcome.recorded.operation, outcome.recorded.items);

    Ok(Json(FulfillmentResponse {
        delivery: outcome.delivery,
        operation,
        fully_delivered: outcome.fully_delivered,
        transfers: outcome.transfers,
    }))
}

/// Operation history, oldest first
///
/// GET /api/deliveries/{id}/operations
pub async fn list_operations(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Vec<OperationResponse>>, DeliveryError> {
    let operations = delivery_listing::operations_for(&state.db, &actor, id).await?;
    Ok(Json(operations))
}
