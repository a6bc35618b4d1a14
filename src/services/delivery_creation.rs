//! Delivery creation
//!
//! New deliveries start `pending` with every ledger line fully pending.

use std::collections::HashSet;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set, TransactionTrait};
use tracing::info;

use crate::entities::{
    deliveries, delivery_items,
    prelude::{Customers, Users},
};
use crate::error::DeliveryError;
use crate::models::actor::Actor;
use crate::models::delivery::{CreateDeliveryRequest, DeliveryResponse, DeliveryState, DeliveryType};
use crate::services::delivery_listing;

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Per-type party rules and the item list checks
pub fn validate_create_request(request: &CreateDeliveryRequest) -> Result<(), DeliveryError> {
    match request.delivery_type {
        DeliveryType::HomeDelivery => {
            if request.customer_id.is_none() {
                return Err(DeliveryError::validation("customer_id is required for home deliveries"));
            }
            if request.supplier_id.is_some() {
                return Err(DeliveryError::validation(
                    "supplier_id is not allowed for home deliveries",
                ));
            }
        }
        DeliveryType::SupplierPickup => {
            if request.supplier_id.is_none() {
                return Err(DeliveryError::validation(
                    "supplier_id is required for supplier pickups",
                ));
            }
            if request.customer_id.is_some() {
                return Err(DeliveryError::validation(
                    "customer_id is not allowed for supplier pickups",
                ));
            }
        }
        DeliveryType::StoreMovement => {
            let (Some(origin), Some(destination)) = (
                present(&request.origin_store),
                present(&request.destination_store),
            ) else {
                return Err(DeliveryError::validation(
                    "origin_store and destination_store are required for store movements",
                ));
            };
            if origin == destination {
                return Err(DeliveryError::validation(
                    "origin_store and destination_store must differ",
                ));
            }
            if request.customer_id.is_some() || request.supplier_id.is_some() {
                return Err(DeliveryError::validation(
                    "store movements cannot reference a customer or supplier",
                ));
            }
        }
    }

    if request.items.is_empty() {
        if present(&request.product_summary).is_none() {
            return Err(DeliveryError::validation(
                "Either items or product_summary must be provided",
            ));
        }
        return Ok(());
    }

    let mut seen = HashSet::new();
    for item in &request.items {
        if item.product_sku.trim().is_empty() {
            return Err(DeliveryError::validation("product_sku is required"));
        }
        if item.quantity <= 0 {
            return Err(DeliveryError::validation(format!(
                "Quantity for {} must be positive",
                item.product_sku
            )));
        }
        if !seen.insert(item.product_sku.trim()) {
            return Err(DeliveryError::validation(format!(
                "Product {} is listed more than once",
                item.product_sku
            )));
        }
    }

    Ok(())
}

pub async fn create_delivery(
    db: &DatabaseConnection,
    actor: &Actor,
    request: CreateDeliveryRequest,
) -> Result<DeliveryResponse, DeliveryError> {
    validate_create_request(&request)?;

    let txn = db.begin().await?;

    if Users::find_by_id(actor.user_id).one(&txn).await?.is_none() {
        return Err(DeliveryError::NotFound(format!("User {} not found", actor.user_id)));
    }
    if let Some(customer_id) = request.customer_id {
        if Customers::find_by_id(customer_id).one(&txn).await?.is_none() {
            return Err(DeliveryError::NotFound(format!(
                "Customer {} not found",
                customer_id
            )));
        }
    }

    let now = Utc::now().fixed_offset();
    let delivery = deliveries::ActiveModel {
        delivery_type: Set(request.delivery_type.to_string()),
        state: Set(DeliveryState::Pending.to_string()),
        order_date: Set(request.order_date.unwrap_or_else(|| Utc::now().date_naive())),
        scheduled_date: Set(request.scheduled_date),
        store_id: Set(request.store_id),
        origin_store: Set(request.origin_store),
        destination_store: Set(request.destination_store),
        customer_id: Set(request.customer_id),
        supplier_id: Set(request.supplier_id),
        product_summary: Set(request.product_summary),
        notes: Set(request.notes),
        created_by: Set(actor.user_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    for item in &request.items {
        delivery_items::ActiveModel {
            delivery_id: Set(delivery.id),
            product_sku: Set(item.product_sku.trim().to_string()),
            quantity: Set(item.quantity),
            pending_quantity: Set(item.quantity),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    let response = delivery_listing::delivery_detail(&txn, delivery).await?;
    txn.commit().await?;

    info!(
        delivery_id = response.id,
        actor_id = actor.user_id,
        delivery_type = %response.delivery_type,
        items = response.items.len(),
        "Delivery created"
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::delivery::NewDeliveryItem;

    fn request(delivery_type: DeliveryType) -> CreateDeliveryRequest {
        CreateDeliveryRequest {
            delivery_type,
            order_date: None,
            scheduled_date: None,
            store_id: Some("S1".to_string()),
            origin_store: None,
            destination_store: None,
            customer_id: None,
            supplier_id: None,
            product_summary: None,
            notes: None,
            items: vec![NewDeliveryItem {
                product_sku: "SKU-A".to_string(),
                quantity: 2,
            }],
        }
    }

    #[test]
    fn test_home_delivery_needs_customer() {
        let mut req = request(DeliveryType::HomeDelivery);
        assert!(validate_create_request(&req).is_err());
        req.customer_id = Some(1);
        assert!(validate_create_request(&req).is_ok());
        req.supplier_id = Some(2);
        assert!(validate_create_request(&req).is_err());
    }

    #[test]
    fn test_supplier_pickup_forbids_customer() {
        let mut req = request(DeliveryType::SupplierPickup);
        req.supplier_id = Some(2);
        assert!(validate_create_request(&req).is_ok());
        req.customer_id = Some(1);
        assert!(validate_create_request(&req).is_err());
    }

    #[test]
    fn test_store_movement_needs_distinct_stores() {
        let mut req = request(DeliveryType::StoreMovement);
        req.origin_store = Some("S1".to_string());
        req.destination_store = Some("S1".to_string());
        assert!(validate_create_request(&req).is_err());
        req.destination_store = Some("S2".to_string());
        assert!(validate_create_request(&req).is_ok());
    }

    #[test]
    fn test_items_or_summary_required() {
        let mut req = request(DeliveryType::HomeDelivery);
        req.customer_id = Some(1);
        req.items.clear();
        assert!(validate_create_request(&req).is_err());
        req.product_summary = Some("Sofá 3 cuerpos".to_string());
        assert!(validate_create_request(&req).is_ok());
    }

    #[test]
    fn test_duplicate_and_non_positive_items_rejected() {
        let mut req = request(DeliveryType::HomeDelivery);
        req.customer_id = Some(1);
        req.items.push(NewDeliveryItem {
            product_sku: "SKU-A".to_string(),
            quantity: 1,
        });
        assert!(validate_create_request(&req).is_err());

        req.items.truncate(1);
        req.items[0].quantity = 0;
        assert!(validate_create_request(&req).is_err());
    }
}
