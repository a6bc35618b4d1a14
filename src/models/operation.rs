//! Operation types and dispatch modes for fulfillment/cancellation tracking

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::{delivery_operations, operation_items};
use crate::services::inventory_transfer::TransferRequest;

use super::delivery::DeliveryResponse;

pub const DISPATCH_REQUIRED_MESSAGE: &str =
    "Either pickup_store or both carrier_id and delivery_cost must be provided";

/// Operation types recorded against a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Delivery,
    Cancellation,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationType::Delivery => write!(f, "delivery"),
            OperationType::Cancellation => write!(f, "cancellation"),
        }
    }
}

impl std::str::FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "delivery" => Ok(OperationType::Delivery),
            "cancellation" => Ok(OperationType::Cancellation),
            _ => Err(format!("Unknown operation type: {}", s)),
        }
    }
}

/// How an operation was carried out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Dispatch {
    /// Shipped by a carrier, who is owed `cost`
    Carrier { carrier_id: i32, cost: Decimal },
    /// Collected by the customer at a store
    Pickup { store: String },
    Cancellation,
}

/// Dispatch fields as they arrive on the wire and as they are stored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchFields {
    pub carrier_id: Option<i32>,
    pub delivery_cost: Option<Decimal>,
    pub pickup_store: Option<String>,
}

impl DispatchFields {
    fn pickup(&self) -> Option<&str> {
        self.pickup_store
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn has_carrier_data(&self) -> bool {
        self.carrier_id.is_some() || self.delivery_cost.is_some()
    }
}

impl Dispatch {
    /// Lenient parse used when recording: a pickup store wins and any
    /// carrier data next to it is dropped.
    pub fn from_fields(fields: &DispatchFields) -> Result<Self, String> {
        if let Some(store) = fields.pickup() {
            return Ok(Dispatch::Pickup {
                store: store.to_string(),
            });
        }

        match (fields.carrier_id, fields.delivery_cost) {
            (Some(carrier_id), Some(cost)) => {
                if cost < Decimal::ZERO {
                    return Err("delivery_cost cannot be negative".to_string());
                }
                Ok(Dispatch::Carrier { carrier_id, cost })
            }
            _ => Err(DISPATCH_REQUIRED_MESSAGE.to_string()),
        }
    }

    /// Strict parse for user submissions: carrier and pickup together are
    /// ambiguous and rejected.
    pub fn from_request(fields: &DispatchFields) -> Result<Self, String> {
        if fields.pickup().is_some() && fields.has_carrier_data() {
            return Err(
                "Dispatch mode is ambiguous: provide either pickup_store or carrier_id with delivery_cost, not both"
                    .to_string(),
            );
        }
        Self::from_fields(fields)
    }

    /// Rebuild the typed form from a stored operation row
    pub fn from_model(model: &delivery_operations::Model) -> Self {
        if model.operation_type == OperationType::Cancellation.to_string() {
            return Dispatch::Cancellation;
        }
        match (&model.pickup_store, model.carrier_id) {
            (Some(store), _) => Dispatch::Pickup {
                store: store.clone(),
            },
            (None, Some(carrier_id)) => Dispatch::Carrier {
                carrier_id,
                cost: model.delivery_cost.unwrap_or(Decimal::ZERO),
            },
            (None, None) => Dispatch::Cancellation,
        }
    }

    pub fn operation_type(&self) -> OperationType {
        match self {
            Dispatch::Cancellation => OperationType::Cancellation,
            _ => OperationType::Delivery,
        }
    }

    /// Flat nullable columns for persistence
    pub fn to_fields(&self) -> DispatchFields {
        match self {
            Dispatch::Carrier { carrier_id, cost } => DispatchFields {
                carrier_id: Some(*carrier_id),
                delivery_cost: Some(*cost),
                pickup_store: None,
            },
            Dispatch::Pickup { store } => DispatchFields {
                carrier_id: None,
                delivery_cost: None,
                pickup_store: Some(store.clone()),
            },
            Dispatch::Cancellation => DispatchFields::default(),
        }
    }
}

/// One selected line of a fulfillment submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FulfillmentItem {
    pub product_sku: String,
    pub quantity: i32,
    /// Store the stock is taken from
    #[serde(default, alias = "store_id")]
    pub source_store: String,
}

/// Request body for POST /api/deliveries/{id}/fulfill
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FulfillmentRequest {
    #[serde(default)]
    pub items: Vec<FulfillmentItem>,
    #[serde(flatten)]
    pub dispatch: DispatchFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationItemResponse {
    pub product_sku: String,
    pub quantity: i32,
    pub store_id: String,
}

impl From<operation_items::Model> for OperationItemResponse {
    fn from(model: operation_items::Model) -> Self {
        Self {
            product_sku: model.product_sku,
            quantity: model.quantity,
            store_id: model.store_id,
        }
    }
}

/// Response for operation queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResponse {
    pub id: i32,
    pub operation_type: String,
    pub actor_id: i32,
    pub dispatch: Dispatch,
    pub created_at: String,
    pub items: Vec<OperationItemResponse>,
}

impl OperationResponse {
    pub fn from_parts(model: delivery_operations::Model, items: Vec<operation_items::Model>) -> Self {
        Self {
            id: model.id,
            operation_type: model.operation_type.clone(),
            actor_id: model.actor_id,
            dispatch: Dispatch::from_model(&model),
            created_at: model.created_at.to_rfc3339(),
            items: items.into_iter().map(OperationItemResponse::from).collect(),
        }
    }
}

/// Response for POST /api/deliveries/{id}/fulfill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentResponse {
    pub delivery: DeliveryResponse,
    pub operation: OperationResponse,
    /// true when this fulfillment satisfied the last pending item
    pub fully_delivered: bool,
    /// Inventory transfers performed for this request, in order
    pub transfers: Vec<TransferRequest>,
}
