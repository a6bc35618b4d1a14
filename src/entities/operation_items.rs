//! SeaORM Entity for operation_items

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "operation_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub operation_id: i32,
    pub product_sku: String,
    pub quantity: i32,
    /// Store the quantity was taken from
    pub store_id: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::delivery_operations::Entity",
        from = "Column::OperationId",
        to = "super::delivery_operations::Column::Id"
    )]
    Operation,
}

impl Related<super::delivery_operations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Operation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
