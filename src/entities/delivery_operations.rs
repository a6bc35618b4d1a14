//! SeaORM Entity for delivery_operations
//!
//! Append-only. Dispatch mode is flattened into nullable columns here; the
//! typed form lives in `models::operation::Dispatch`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "delivery_operations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub delivery_id: i32,
    /// 'delivery' or 'cancellation'
    pub operation_type: String,
    pub actor_id: i32,
    pub carrier_id: Option<i32>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))", nullable)]
    pub delivery_cost: Option<Decimal>,
    pub pickup_store: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::deliveries::Entity",
        from = "Column::DeliveryId",
        to = "super::deliveries::Column::Id"
    )]
    Delivery,
    #[sea_orm(has_many = "super::operation_items::Entity")]
    OperationItems,
}

impl Related<super::deliveries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Delivery.def()
    }
}

impl Related<super::operation_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OperationItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
