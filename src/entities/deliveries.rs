//! SeaORM Entity for deliveries
//!
//! One logistics order: a home delivery, a supplier pickup or a store movement.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "deliveries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// 'home_delivery', 'supplier_pickup' or 'store_movement'
    pub delivery_type: String,
    /// 'pending', 'delivered' or 'cancelled'
    pub state: String,
    pub order_date: Date,
    pub scheduled_date: Option<Date>,
    /// Home store: where stock is expected to ship from
    pub store_id: Option<String>,
    pub origin_store: Option<String>,
    pub destination_store: Option<String>,
    pub customer_id: Option<i32>,
    pub supplier_id: Option<i32>,
    /// Legacy free-text product list (deliveries without structured items)
    #[sea_orm(column_type = "Text", nullable)]
    pub product_summary: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    /// User that created the delivery (sales role visibility)
    pub created_by: i32,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Stock location fulfillment is measured against; movement and pickup
    /// deliveries fall back to their destination.
    pub fn home_store(&self) -> Option<&str> {
        self.store_id
            .as_deref()
            .or(self.destination_store.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::delivery_items::Entity")]
    DeliveryItems,
    #[sea_orm(has_many = "super::delivery_operations::Entity")]
    DeliveryOperations,
    #[sea_orm(
        belongs_to = "super::customers::Entity",
        from = "Column::CustomerId",
        to = "super::customers::Column::Id"
    )]
    Customer,
}

impl Related<super::delivery_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeliveryItems.def()
    }
}

impl Related<super::delivery_operations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeliveryOperations.def()
    }
}

impl Related<super::customers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
