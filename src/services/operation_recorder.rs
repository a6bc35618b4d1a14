//! Operation recorder: append-only history of fulfillment and cancellation events
//!
//! Callers pass the connection the writes should run on. The fulfillment
//! engine passes its transaction, so the operation row, its item rows and
//! the ledger decrements commit or roll back together.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use tracing::debug;

use crate::entities::{delivery_operations, operation_items};
use crate::error::DeliveryError;
use crate::models::operation::{Dispatch, DispatchFields, FulfillmentItem, OperationType};
use crate::services::item_ledger;

#[derive(Debug, Clone)]
pub struct RecordedOperation {
    pub operation: delivery_operations::Model,
    pub items: Vec<operation_items::Model>,
    /// No ledger line of the delivery is pending any more
    pub fully_satisfied: bool,
}

/// Record an operation from flat dispatch fields.
///
/// A `delivery` needs a pickup store or a carrier with cost; a pickup store
/// wins over carrier data. Cancellations ignore dispatch fields and items.
pub async fn record<C: ConnectionTrait>(
    conn: &C,
    delivery_id: i32,
    actor_id: i32,
    operation_type: OperationType,
    fields: &DispatchFields,
    items: &[FulfillmentItem],
) -> Result<RecordedOperation, DeliveryError> {
    let dispatch = match operation_type {
        OperationType::Cancellation => Dispatch::Cancellation,
        OperationType::Delivery => {
            Dispatch::from_fields(fields).map_err(DeliveryError::Validation)?
        }
    };
    record_dispatch(conn, delivery_id, actor_id, &dispatch, items).await
}

/// Record an operation whose dispatch mode is already resolved
pub async fn record_dispatch<C: ConnectionTrait>(
    conn: &C,
    delivery_id: i32,
    actor_id: i32,
    dispatch: &Dispatch,
    items: &[FulfillmentItem],
) -> Result<RecordedOperation, DeliveryError> {
    let fields = dispatch.to_fields();
    let operation_type = dispatch.operation_type();

    let operation = delivery_operations::ActiveModel {
        delivery_id: Set(delivery_id),
        operation_type: Set(operation_type.to_string()),
        actor_id: Set(actor_id),
        carrier_id: Set(fields.carrier_id),
        delivery_cost: Set(fields.delivery_cost),
        pickup_store: Set(fields.pickup_store),
        created_at: Set(Utc::now().fixed_offset()),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    if operation_type == OperationType::Cancellation {
        debug!(delivery_id, operation_id = operation.id, "Recorded cancellation");
        return Ok(RecordedOperation {
            operation,
            items: Vec::new(),
            fully_satisfied: false,
        });
    }

    let mut recorded_items = Vec::with_capacity(items.len());
    for item in items {
        let row = operation_items::ActiveModel {
            operation_id: Set(operation.id),
            product_sku: Set(item.product_sku.clone()),
            quantity: Set(item.quantity),
            store_id: Set(item.source_store.clone()),
            ..Default::default()
        }
        .insert(conn)
        .await?;

        item_ledger::decrement_pending(conn, delivery_id, &item.product_sku, item.quantity).await?;
        recorded_items.push(row);
    }

    let remaining = item_ledger::remaining_count(conn, delivery_id).await?;

    debug!(
        delivery_id,
        operation_id = operation.id,
        items = recorded_items.len(),
        remaining,
        "Recorded delivery operation"
    );

    Ok(RecordedOperation {
        operation,
        items: recorded_items,
        fully_satisfied: remaining == 0,
    })
}
