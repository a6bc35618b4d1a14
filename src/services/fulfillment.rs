//! Fulfillment engine
//!
//! Flow for one request:
//! 1. request shape checks and strict dispatch parsing
//! 2. ledger validation against the current pending quantities
//! 3. inventory transfers for lines taken from a store other than the
//!    delivery's home store, one after another
//! 4. one transaction: lock the delivery, re-validate, record the operation,
//!    decrement the ledger and mark the delivery delivered when nothing is
//!    left pending
//!    and building the response detail
//! 5. publish `DeliveryEvent::Fulfilled` after commit
//!
//! Transfers that completed before a failure stay in effect and are reported
//! in the error.

use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait, TransactionTrait};
use tracing::{error, info};

use crate::entities::{deliveries, prelude::Deliveries};
use crate::error::DeliveryError;
use crate::models::actor::Actor;
use crate::models::delivery::{DeliveryResponse, DeliveryState};
use crate::models::operation::{Dispatch, FulfillmentItem, FulfillmentRequest};
use crate::services::delivery_listing::{self, ensure_visible};
use crate::services::delivery_state;
use crate::services::inventory_transfer::{InventoryTransfer, TransferRequest};
use crate::services::item_ledger;
use crate::services::notifications::{DeliveryEvent, EventPublisher};
use crate::services::operation_recorder::{self, RecordedOperation};

#[derive(Debug, Clone)]
pub struct FulfillmentOutcome {
    /// Detail as of the commit
    pub delivery: DeliveryResponse,
    pub recorded: RecordedOperation,
    pub fully_delivered: bool,
    pub transfers: Vec<TransferRequest>,
}

/// Shape checks that need no database access
pub fn check_request(request: &FulfillmentRequest) -> Result<Dispatch, DeliveryError> {
    if request.items.is_empty() {
        return Err(DeliveryError::validation("At least one item must be selected"));
    }
    if request
        .items
        .iter()
        .any(|item| item.source_store.trim().is_empty())
    {
        return Err(DeliveryError::validation(item_ledger::STORE_REQUIRED));
    }
    Dispatch::from_request(&request.dispatch).map_err(DeliveryError::Validation)
}

/// Transfers needed to bring each line's stock to the home store, in
/// submission order. No home store means no transfers.
pub fn plan_transfers(
    delivery: &deliveries::Model,
    items: &[FulfillmentItem],
) -> Vec<TransferRequest> {
    let Some(home) = delivery.home_store() else {
        return Vec::new();
    };

    items
        .iter()
        .filter(|item| item.source_store.trim() != home.trim())
        .map(|item| TransferRequest {
            origin_store: item.source_store.trim().to_string(),
            dest_store: home.trim().to_string(),
            product_sku: item.product_sku.clone(),
            quantity: item.quantity,
        })
        .collect()
}

fn ensure_pending(delivery: &deliveries::Model) -> Result<(), DeliveryError> {
    let state = delivery_state::parse_state(delivery)?;
    if state != DeliveryState::Pending {
        return Err(DeliveryError::InvalidStateTransition(format!(
            "Delivery {} is {}: only pending deliveries can be fulfilled",
            delivery.id, state
        )));
    }
    Ok(())
}

pub async fn fulfill(
    db: &DatabaseConnection,
    inventory: &dyn InventoryTransfer,
    events: &EventPublisher,
    actor: &Actor,
    delivery_id: i32,
    request: FulfillmentRequest,
) -> Result<FulfillmentOutcome, DeliveryError> {
    let dispatch = check_request(&request)?;

    let delivery = Deliveries::find_by_id(delivery_id)
        .one(db)
        .await?
        .ok_or_else(|| DeliveryError::delivery_not_found(delivery_id))?;
    ensure_visible(actor, &delivery)?;
    ensure_pending(&delivery)?;

    item_ledger::validate_items(db, delivery_id, &request.items).await?;

    let planned = plan_transfers(&delivery, &request.items);
    let completed = run_transfers(inventory, delivery_id, &planned).await?;

    let committed = async {
        let txn = db.begin().await?;
        let recorded = record_fulfillment(&txn, actor, delivery_id, &dispatch, &request.items).await?;
        txn.commit().await?;
        Ok::<_, DeliveryError>(recorded)
    }
    .await;

    let (delivery, recorded, event) = match committed {
        Ok(result) => result,
        Err(e) if completed.is_empty() => return Err(e),
        Err(e) => {
            error!(
                delivery_id,
                error = %e,
                code = e.code(),
                completed_transfers = ?completed,
                "Recording failed after inventory transfers were applied"
            );
            return Err(e.with_completed_transfers(completed));
        }
    };

    let fully_delivered = event.is_some();
    if let Some(event) = event {
        events.publish(event);
    }

    info!(
        delivery_id,
        actor_id = actor.user_id,
        operation_id = recorded.operation.id,
        items = recorded.items.len(),
        transfers = completed.len(),
        fully_delivered,
        "Fulfillment recorded"
    );

    Ok(FulfillmentOutcome {
        delivery,
        recorded,
        fully_delivered,
        transfers: completed,
    })
}

/// Sequential on purpose: the first failure stops the rest
async fn run_transfers(
    inventory: &dyn InventoryTransfer,
    delivery_id: i32,
    planned: &[TransferRequest],
) -> Result<Vec<TransferRequest>, DeliveryError> {
    let total = planned.len();
    let mut completed = Vec::with_capacity(total);

    for (index, transfer) in planned.iter().enumerate() {
        if let Err(e) = inventory.transfer(transfer).await {
            let step = format!(
                "inventory transfer {} of {} ({} from {} to {})",
                index + 1,
                total,
                transfer.product_sku,
                transfer.origin_store,
                transfer.dest_store
            );
            error!(
                delivery_id,
                step = %step,
                error = %e,
                completed = ?completed,
                "Inventory transfer failed"
            );
            return Err(DeliveryError::Dependency {
                step,
                message: e.to_string(),
                completed_transfers: completed,
            });
        }
        completed.push(transfer.clone());
    }

    Ok(completed)
}

/// The unit of work that must commit atomically
async fn record_fulfillment<C: ConnectionTrait>(
    txn: &C,
    actor: &Actor,
    delivery_id: i32,
    dispatch: &Dispatch,
    items: &[FulfillmentItem],
) -> Result<(DeliveryResponse, RecordedOperation, Option<DeliveryEvent>), DeliveryError> {
    let delivery = delivery_state::load_for_update(txn, delivery_id).await?;
    ensure_pending(&delivery)?;

    // Another request may have consumed stock since the first validation
    let ledger = item_ledger::items_for(txn, delivery_id).await?;
    item_ledger::check_requested(&ledger, items)?;

    let recorded =
        operation_recorder::record_dispatch(txn, delivery_id, actor.user_id, dispatch, items).await?;

    if !recorded.fully_satisfied {
        let detail = delivery_listing::delivery_detail(txn, delivery).await?;
        return Ok((detail, recorded, None));
    }

    let delivered = delivery_state::mark_delivered(txn, delivery).await?;
    let event = delivery_state::fulfilled_event(txn, &delivered).await?;
    let detail = delivery_listing::delivery_detail(txn, delivered).await?;
    Ok((detail, recorded, Some(event)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::operation::DispatchFields;
    use chrono::{NaiveDate, Utc};

    fn delivery(store_id: Option<&str>, destination: Option<&str>) -> deliveries::Model {
        let now = Utc::now().fixed_offset();
        deliveries::Model {
            id: 1,
            delivery_type: "home_delivery".to_string(),
            state: "pending".to_string(),
            order_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            scheduled_date: None,
            store_id: store_id.map(str::to_string),
            origin_store: None,
            destination_store: destination.map(str::to_string),
            customer_id: None,
            supplier_id: None,
            product_summary: None,
            notes: None,
            created_by: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn item(sku: &str, quantity: i32, store: &str) -> FulfillmentItem {
        FulfillmentItem {
            product_sku: sku.to_string(),
            quantity,
            source_store: store.to_string(),
        }
    }

    fn pickup(store: &str) -> DispatchFields {
        DispatchFields {
            pickup_store: Some(store.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_transfers_only_for_foreign_stores_in_order() {
        let d = delivery(Some("S1"), None);
        let planned = plan_transfers(
            &d,
            &[item("A", 1, "S2"), item("B", 1, "S1"), item("C", 2, "S3")],
        );
        let skus: Vec<&str> = planned.iter().map(|t| t.product_sku.as_str()).collect();
        assert_eq!(skus, vec!["A", "C"]);
        assert_eq!(planned[1].origin_store, "S3");
        assert_eq!(planned[1].dest_store, "S1");
        assert_eq!(planned[1].quantity, 2);
    }

    #[test]
    fn test_destination_store_is_home_fallback() {
        let d = delivery(None, Some("S4"));
        let planned = plan_transfers(&d, &[item("A", 1, "S2")]);
        assert_eq!(planned[0].dest_store, "S4");
    }

    #[test]
    fn test_no_home_store_no_transfers() {
        let d = delivery(None, None);
        assert!(plan_transfers(&d, &[item("A", 1, "S2")]).is_empty());
    }

    #[test]
    fn test_empty_selection_rejected() {
        let request = FulfillmentRequest {
            items: vec![],
            dispatch: pickup("S1"),
        };
        assert!(matches!(check_request(&request), Err(DeliveryError::Validation(_))));
    }

    #[test]
    fn test_missing_source_store_rejected() {
        let request = FulfillmentRequest {
            items: vec![item("A", 1, "")],
            dispatch: pickup("S1"),
        };
        let err = check_request(&request).unwrap_err();
        assert_eq!(err.to_string(), item_ledger::STORE_REQUIRED);
    }

    #[test]
    fn test_ensure_pending_rejects_delivered() {
        let mut d = delivery(Some("S1"), None);
        d.state = "delivered".to_string();
        assert!(matches!(
            ensure_pending(&d),
            Err(DeliveryError::InvalidStateTransition(_))
        ));
    }
}
