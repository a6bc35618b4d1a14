//! Item ledger: ordered and pending quantity per delivery line
//!
//! All functions take any `ConnectionTrait` so they run either on the pool
//! or inside the caller's transaction.

use std::collections::HashMap;

use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use tracing::error;

use crate::entities::{delivery_items, prelude::DeliveryItems};
use crate::error::DeliveryError;
use crate::models::operation::FulfillmentItem;

pub const STORE_REQUIRED: &str = "Store ID is required";
pub const PRODUCT_NOT_FOUND: &str = "Product not found in delivery";
pub const INVALID_QUANTITY: &str = "Invalid quantity";

/// Ledger lines of a delivery, in creation order
pub async fn items_for<C: ConnectionTrait>(
    conn: &C,
    delivery_id: i32,
) -> Result<Vec<delivery_items::Model>, DeliveryError> {
    let items = DeliveryItems::find()
        .filter(delivery_items::Column::DeliveryId.eq(delivery_id))
        .order_by_asc(delivery_items::Column::Id)
        .all(conn)
        .await?;
    Ok(items)
}

/// Check a fulfillment selection against the ledger without writing.
pub async fn validate_items<C: ConnectionTrait>(
    conn: &C,
    delivery_id: i32,
    requested: &[FulfillmentItem],
) -> Result<(), DeliveryError> {
    let items = items_for(conn, delivery_id).await?;
    check_requested(&items, requested)
}

/// Per-entry checks. Repeated SKUs are summed, so the ceiling applies to the
/// cumulative quantity of the submission.
pub fn check_requested(
    items: &[delivery_items::Model],
    requested: &[FulfillmentItem],
) -> Result<(), DeliveryError> {
    let by_sku: HashMap<&str, &delivery_items::Model> = items
        .iter()
        .map(|item| (item.product_sku.as_str(), item))
        .collect();
    let mut cumulative: HashMap<&str, i32> = HashMap::new();

    for entry in requested {
        if entry.source_store.trim().is_empty() {
            return Err(DeliveryError::validation(STORE_REQUIRED));
        }

        let Some(item) = by_sku.get(entry.product_sku.as_str()) else {
            return Err(DeliveryError::validation(PRODUCT_NOT_FOUND));
        };

        if entry.quantity <= 0 {
            return Err(DeliveryError::validation(INVALID_QUANTITY));
        }

        let total = cumulative.entry(item.product_sku.as_str()).or_insert(0);
        *total = total.saturating_add(entry.quantity);
        if *total > item.pending_quantity {
            return Err(DeliveryError::validation(INVALID_QUANTITY));
        }
    }

    Ok(())
}

/// Subtract `quantity` from one line's pending quantity in a single
/// conditional UPDATE. The WHERE clause refuses to go below zero, so two
/// racing decrements can never both pass.
pub async fn decrement_pending<C: ConnectionTrait>(
    conn: &C,
    delivery_id: i32,
    product_sku: &str,
    quantity: i32,
) -> Result<(), DeliveryError> {
    if quantity <= 0 {
        return Err(DeliveryError::validation(INVALID_QUANTITY));
    }

    let result = DeliveryItems::update_many()
        .col_expr(
            delivery_items::Column::PendingQuantity,
            Expr::col(delivery_items::Column::PendingQuantity).sub(quantity),
        )
        .filter(delivery_items::Column::DeliveryId.eq(delivery_id))
        .filter(delivery_items::Column::ProductSku.eq(product_sku))
        .filter(delivery_items::Column::PendingQuantity.gte(quantity))
        .exec(conn)
        .await?;

    if result.rows_affected == 1 {
        return Ok(());
    }

    let existing = DeliveryItems::find()
        .filter(delivery_items::Column::DeliveryId.eq(delivery_id))
        .filter(delivery_items::Column::ProductSku.eq(product_sku))
        .one(conn)
        .await?;

    match existing {
        None => Err(DeliveryError::NotFound(format!(
            "Product {} not found in delivery {}",
            product_sku, delivery_id
        ))),
        Some(item) => {
            error!(
                delivery_id,
                sku = %product_sku,
                requested = quantity,
                pending = item.pending_quantity,
                "Refusing to drive pending quantity below zero"
            );
            Err(DeliveryError::ConstraintViolation(format!(
                "Cannot fulfill {} of {} for delivery {}: only {} pending",
                quantity, product_sku, delivery_id, item.pending_quantity
            )))
        }
    }
}

/// Number of lines still waiting for stock
pub async fn remaining_count<C: ConnectionTrait>(
    conn: &C,
    delivery_id: i32,
) -> Result<u64, DeliveryError> {
    let count = DeliveryItems::find()
        .filter(delivery_items::Column::DeliveryId.eq(delivery_id))
        .filter(delivery_items::Column::PendingQuantity.gt(0))
        .count(conn)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(sku: &str, quantity: i32, pending: i32) -> delivery_items::Model {
        delivery_items::Model {
            id: 1,
            delivery_id: 1,
            product_sku: sku.to_string(),
            quantity,
            pending_quantity: pending,
        }
    }

    fn req(sku: &str, quantity: i32, store: &str) -> FulfillmentItem {
        FulfillmentItem {
            product_sku: sku.to_string(),
            quantity,
            source_store: store.to_string(),
        }
    }

    fn message(result: Result<(), DeliveryError>) -> String {
        match result {
            Err(DeliveryError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_selection_passes() {
        let items = [line("SKU-A", 2, 2), line("SKU-B", 1, 1)];
        assert!(check_requested(&items, &[req("SKU-A", 1, "S1"), req("SKU-B", 1, "S2")]).is_ok());
    }

    #[test]
    fn test_store_is_required() {
        let items = [line("SKU-A", 2, 2)];
        assert_eq!(message(check_requested(&items, &[req("SKU-A", 1, " ")])), STORE_REQUIRED);
    }

    #[test]
    fn test_unknown_product() {
        let items = [line("SKU-A", 2, 2)];
        assert_eq!(message(check_requested(&items, &[req("SKU-Z", 1, "S1")])), PRODUCT_NOT_FOUND);
    }

    #[test]
    fn test_quantity_above_pending() {
        let items = [line("SKU-A", 3, 1)];
        assert_eq!(message(check_requested(&items, &[req("SKU-A", 2, "S1")])), INVALID_QUANTITY);
    }

    #[test]
    fn test_repeated_sku_is_cumulative() {
        let items = [line("SKU-A", 3, 3)];
        assert!(check_requested(&items, &[req("SKU-A", 1, "S1"), req("SKU-A", 2, "S2")]).is_ok());
        assert_eq!(
            message(check_requested(&items, &[req("SKU-A", 2, "S1"), req("SKU-A", 2, "S2")])),
            INVALID_QUANTITY
        );
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        let items = [line("SKU-A", 3, 3)];
        assert_eq!(message(check_requested(&items, &[req("SKU-A", 0, "S1")])), INVALID_QUANTITY);
        assert_eq!(message(check_requested(&items, &[req("SKU-A", -2, "S1")])), INVALID_QUANTITY);
    }
}
