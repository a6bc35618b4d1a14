//! Delivery types, lifecycle states and request/response bodies

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::entities::{customers, deliveries, delivery_items};
use crate::models::operation::OperationResponse;

/// Kind of logistics order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    HomeDelivery,
    SupplierPickup,
    StoreMovement,
}

impl std::fmt::Display for DeliveryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryType::HomeDelivery => write!(f, "home_delivery"),
            DeliveryType::SupplierPickup => write!(f, "supplier_pickup"),
            DeliveryType::StoreMovement => write!(f, "store_movement"),
        }
    }
}

impl std::str::FromStr for DeliveryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "home_delivery" => Ok(DeliveryType::HomeDelivery),
            "supplier_pickup" => Ok(DeliveryType::SupplierPickup),
            "store_movement" => Ok(DeliveryType::StoreMovement),
            _ => Err(format!("Unknown delivery type: {}", s)),
        }
    }
}

/// Delivery lifecycle
/// pending → delivered (fulfillment engine only)
///        ↘ cancelled (from any state, explicit user action)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Pending,
    Delivered,
    Cancelled,
}

impl std::fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryState::Pending => write!(f, "pending"),
            DeliveryState::Delivered => write!(f, "delivered"),
            DeliveryState::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for DeliveryState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(DeliveryState::Pending),
            "delivered" => Ok(DeliveryState::Delivered),
            "cancelled" => Ok(DeliveryState::Cancelled),
            _ => Err(format!("Unknown delivery state: {}", s)),
        }
    }
}

/// Request body for POST /api/deliveries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeliveryRequest {
    pub delivery_type: DeliveryType,
    /// Defaults to today
    pub order_date: Option<NaiveDate>,
    pub scheduled_date: Option<NaiveDate>,
    pub store_id: Option<String>,
    pub origin_store: Option<String>,
    pub destination_store: Option<String>,
    pub customer_id: Option<i32>,
    pub supplier_id: Option<i32>,
    /// Legacy free-text path, used when `items` is empty
    pub product_summary: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<NewDeliveryItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDeliveryItem {
    pub product_sku: String,
    pub quantity: i32,
}

/// Request body for PATCH /api/deliveries/{id}
///
/// `scheduled_date` distinguishes "absent" (leave as is) from `null` (clear).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDeliveryRequest {
    /// Optional echo of the path id; must match when present
    pub id: Option<i32>,
    pub state: Option<DeliveryState>,
    #[serde(default, alias = "scheduledDate", deserialize_with = "deserialize_some")]
    pub scheduled_date: Option<Option<NaiveDate>>,
}

/// Maps a present field (including `null`) to `Some`, so a missing field
/// stays `None` through `#[serde(default)]`.
fn deserialize_some<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryItemResponse {
    pub product_sku: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub quantity: i32,
    pub pending_quantity: i32,
}

impl DeliveryItemResponse {
    pub fn from_model(model: delivery_items::Model, product_name: Option<String>) -> Self {
        Self {
            product_sku: model.product_sku,
            product_name,
            quantity: model.quantity,
            pending_quantity: model.pending_quantity,
        }
    }
}

/// Full delivery view: ledger, history and last known disposition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryResponse {
    pub id: i32,
    pub delivery_type: String,
    pub state: String,
    pub order_date: NaiveDate,
    pub scheduled_date: Option<NaiveDate>,
    pub store_id: Option<String>,
    pub origin_store: Option<String>,
    pub destination_store: Option<String>,
    pub customer_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    pub supplier_id: Option<i32>,
    pub product_summary: Option<String>,
    pub notes: Option<String>,
    pub created_by: i32,
    pub created_at: String,
    pub updated_at: String,
    pub items: Vec<DeliveryItemResponse>,
    /// Oldest first
    pub operations: Vec<OperationResponse>,
    pub last_operation: Option<OperationResponse>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl DeliveryResponse {
    pub fn from_parts(
        model: deliveries::Model,
        customer: Option<customers::Model>,
        items: Vec<DeliveryItemResponse>,
        operations: Vec<OperationResponse>,
    ) -> Self {
        let last_operation = operations.last().cloned();
        Self {
            id: model.id,
            delivery_type: model.delivery_type,
            state: model.state,
            order_date: model.order_date,
            scheduled_date: model.scheduled_date,
            store_id: model.store_id,
            origin_store: model.origin_store,
            destination_store: model.destination_store,
            customer_id: model.customer_id,
            customer_name: customer.map(|c| c.name),
            supplier_id: model.supplier_id,
            product_summary: model.product_summary,
            notes: model.notes,
            created_by: model.created_by,
            created_at: model.created_at.to_rfc3339(),
            updated_at: model.updated_at.to_rfc3339(),
            items,
            operations,
            last_operation,
            warnings: Vec::new(),
        }
    }
}

/// Query parameters for GET /api/deliveries
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryListQuery {
    pub state: Option<DeliveryState>,
    /// Free text matched against customer name and phone
    pub search: Option<String>,
    /// true: only deliveries with a scheduled date; false: only without
    pub scheduled: Option<bool>,
    /// 1-based page number (default: 1)
    pub page: Option<u64>,
}

impl DeliveryListQuery {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(page) = self.page {
            if page < 1 {
                return Err("page must be at least 1".to_string());
            }
        }
        Ok(())
    }

    /// Trimmed search text, `None` when blank
    pub fn search_text(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Row of the delivery listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryListEntry {
    pub id: i32,
    pub delivery_type: String,
    pub state: String,
    pub order_date: NaiveDate,
    pub scheduled_date: Option<NaiveDate>,
    pub store_id: Option<String>,
    pub customer_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    pub supplier_id: Option<i32>,
    pub product_summary: Option<String>,
    pub created_by: i32,
    pub items: Vec<DeliveryItemResponse>,
    pub last_operation: Option<OperationResponse>,
}

/// Response for GET /api/deliveries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryListResponse {
    pub deliveries: Vec<DeliveryListEntry>,
    /// Total rows matching the filters
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}
