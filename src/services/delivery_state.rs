//! Delivery state machine
//!
//! pending → delivered is driven by the fulfillment engine only. Users can
//! cancel from any state; cancellation clears the scheduled date and appends
//! a cancellation operation without touching earlier history.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use tracing::info;

use crate::entities::{
    deliveries, delivery_operations,
    prelude::{Customers, Deliveries, DeliveryOperations, Users},
};
use crate::error::DeliveryError;
use crate::models::actor::Actor;
use crate::models::delivery::{DeliveryResponse, DeliveryState, UpdateDeliveryRequest};
use crate::models::operation::{Dispatch, OperationType};
use crate::services::delivery_listing::{self, ensure_visible};
use crate::services::notifications::{DeliveryEvent, FulfilledDelivery, Salesperson};
use crate::services::{item_ledger, operation_recorder};

pub const CARRIER_PAYMENT_WARNING: &str =
    "Carrier payments already recorded for this delivery are not reversed by the cancellation";

/// Outcome of a user-requested transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Target equals the current state
    Unchanged,
    Cancel,
}

/// Validate a user-requested state change
pub fn check_transition(
    current: DeliveryState,
    target: DeliveryState,
) -> Result<Transition, DeliveryError> {
    if target == DeliveryState::Cancelled {
        return Ok(Transition::Cancel);
    }
    if target == current {
        return Ok(Transition::Unchanged);
    }

    let reason = match (current, target) {
        (DeliveryState::Pending, DeliveryState::Delivered) => {
            "deliveries become delivered by fulfilling their items, the only allowed target state is cancelled"
        }
        _ => "the only allowed target state is cancelled",
    };
    Err(DeliveryError::InvalidStateTransition(format!(
        "Cannot change delivery state from {} to {}: {}",
        current, target, reason
    )))
}

pub fn parse_state(delivery: &deliveries::Model) -> Result<DeliveryState, DeliveryError> {
    delivery.state.parse().map_err(|e: String| {
        DeliveryError::ConstraintViolation(format!("Delivery {} has {}", delivery.id, e))
    })
}

/// Load a delivery and lock its row until the surrounding transaction ends
pub async fn load_for_update<C: ConnectionTrait>(
    conn: &C,
    delivery_id: i32,
) -> Result<deliveries::Model, DeliveryError> {
    Deliveries::find_by_id(delivery_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| DeliveryError::delivery_not_found(delivery_id))
}

/// pending → delivered. Called by the fulfillment engine inside its
/// transaction once the ledger has no pending line left.
pub async fn mark_delivered<C: ConnectionTrait>(
    conn: &C,
    delivery: deliveries::Model,
) -> Result<deliveries::Model, DeliveryError> {
    let current = parse_state(&delivery)?;
    if current != DeliveryState::Pending {
        return Err(DeliveryError::InvalidStateTransition(format!(
            "Cannot change delivery state from {} to delivered: only pending deliveries can be fulfilled",
            current
        )));
    }

    let mut active = delivery.into_active_model();
    active.state = Set(DeliveryState::Delivered.to_string());
    active.updated_at = Set(Utc::now().fixed_offset());
    let updated = active.update(conn).await?;

    info!(delivery_id = updated.id, "Delivery fully delivered");
    Ok(updated)
}

/// Any state → cancelled. Returns the updated row and the warnings to show
/// the user.
pub async fn cancel<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    delivery: deliveries::Model,
) -> Result<(deliveries::Model, Vec<String>), DeliveryError> {
    let mut warnings = Vec::new();
    if has_carrier_payments(conn, delivery.id).await? {
        warnings.push(CARRIER_PAYMENT_WARNING.to_string());
    }

    operation_recorder::record_dispatch(conn, delivery.id, actor.user_id, &Dispatch::Cancellation, &[])
        .await?;

    let previous = delivery.state.clone();
    let mut active = delivery.into_active_model();
    active.state = Set(DeliveryState::Cancelled.to_string());
    active.scheduled_date = Set(None);
    active.updated_at = Set(Utc::now().fixed_offset());
    let updated = active.update(conn).await?;

    info!(
        delivery_id = updated.id,
        actor_id = actor.user_id,
        from = %previous,
        "Delivery cancelled"
    );
    Ok((updated, warnings))
}

async fn has_carrier_payments<C: ConnectionTrait>(
    conn: &C,
    delivery_id: i32,
) -> Result<bool, DeliveryError> {
    let count = DeliveryOperations::find()
        .filter(delivery_operations::Column::DeliveryId.eq(delivery_id))
        .filter(delivery_operations::Column::OperationType.eq(OperationType::Delivery.to_string()))
        .filter(delivery_operations::Column::CarrierId.is_not_null())
        .filter(delivery_operations::Column::DeliveryCost.gt(Decimal::ZERO))
        .count(conn)
        .await?;
    Ok(count > 0)
}

/// PATCH semantics: optional state change and optional scheduled date.
/// Cancellation wins over a date sent in the same request.
pub async fn apply_update(
    db: &DatabaseConnection,
    actor: &Actor,
    delivery_id: i32,
    request: UpdateDeliveryRequest,
) -> Result<DeliveryResponse, DeliveryError> {
    if let Some(body_id) = request.id {
        if body_id != delivery_id {
            return Err(DeliveryError::validation(format!(
                "Delivery id {} in body does not match {} in path",
                body_id, delivery_id
            )));
        }
    }
    if request.state.is_none() && request.scheduled_date.is_none() {
        return Err(DeliveryError::validation(
            "Nothing to update: provide state or scheduled_date",
        ));
    }

    let txn = db.begin().await?;

    let delivery = load_for_update(&txn, delivery_id).await?;
    ensure_visible(actor, &delivery)?;
    let current = parse_state(&delivery)?;

    let transition = match request.state {
        Some(target) => check_transition(current, target)?,
        None => Transition::Unchanged,
    };

    let (updated, warnings) = match transition {
        Transition::Cancel => cancel(&txn, actor, delivery).await?,
        Transition::Unchanged => match request.scheduled_date {
            Some(date) => (reschedule(&txn, delivery, current, date).await?, Vec::new()),
            None => (delivery, Vec::new()),
        },
    };

    let mut response = delivery_listing::delivery_detail(&txn, updated).await?;
    txn.commit().await?;

    response.warnings = warnings;
    Ok(response)
}

async fn reschedule<C: ConnectionTrait>(
    conn: &C,
    delivery: deliveries::Model,
    current: DeliveryState,
    date: Option<chrono::NaiveDate>,
) -> Result<deliveries::Model, DeliveryError> {
    if current != DeliveryState::Pending {
        return Err(DeliveryError::validation(format!(
            "Scheduled date can only be changed while the delivery is pending (currently {})",
            current
        )));
    }

    let mut active = delivery.into_active_model();
    active.scheduled_date = Set(date);
    active.updated_at = Set(Utc::now().fixed_offset());
    Ok(active.update(conn).await?)
}

/// Snapshot everything the notification dispatcher needs, read on the same
/// connection that marked the delivery as delivered.
pub async fn fulfilled_event<C: ConnectionTrait>(
    conn: &C,
    delivery: &deliveries::Model,
) -> Result<DeliveryEvent, DeliveryError> {
    let customer = match delivery.customer_id {
        Some(id) => Customers::find_by_id(id).one(conn).await?,
        None => None,
    };

    let salesperson = Users::find_by_id(delivery.created_by)
        .one(conn)
        .await?
        .map(|user| Salesperson {
            user_id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
        });

    let skus: Vec<String> = item_ledger::items_for(conn, delivery.id)
        .await?
        .into_iter()
        .map(|item| item.product_sku)
        .collect();
    let names = delivery_listing::product_names(conn, &skus).await?;
    let product_names = skus
        .into_iter()
        .map(|sku| names.get(&sku).cloned().unwrap_or(sku))
        .collect();

    Ok(DeliveryEvent::Fulfilled(FulfilledDelivery {
        delivery_id: delivery.id,
        customer_name: customer.as_ref().map(|c| c.name.clone()),
        customer_email: customer.and_then(|c| c.email),
        salesperson,
        product_names,
    }))
}
