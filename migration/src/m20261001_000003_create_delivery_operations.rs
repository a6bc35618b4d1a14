//! Append-only fulfillment/cancellation history and the per-SKU lines of
//! each fulfillment.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DeliveryOperations::Table)
                    .if_not_exists()
                    .col(pk_auto(DeliveryOperations::Id))
                    .col(integer(DeliveryOperations::DeliveryId))
                    .col(string(DeliveryOperations::OperationType))
                    .col(integer(DeliveryOperations::ActorId))
                    .col(integer_null(DeliveryOperations::CarrierId))
                    .col(decimal_len_null(DeliveryOperations::DeliveryCost, 12, 2))
                    .col(string_null(DeliveryOperations::PickupStore))
                    .col(
                        timestamp_with_time_zone(DeliveryOperations::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_delivery_operations_delivery")
                            .from(DeliveryOperations::Table, DeliveryOperations::DeliveryId)
                            .to(Deliveries::Table, Deliveries::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // History is read per delivery in creation order
        manager
            .create_index(
                Index::create()
                    .name("idx_delivery_operations_delivery_created")
                    .table(DeliveryOperations::Table)
                    .col(DeliveryOperations::DeliveryId)
                    .col(DeliveryOperations::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OperationItems::Table)
                    .if_not_exists()
                    .col(pk_auto(OperationItems::Id))
                    .col(integer(OperationItems::OperationId))
                    .col(string(OperationItems::ProductSku))
                    .col(integer(OperationItems::Quantity))
                    .col(string(OperationItems::StoreId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_operation_items_operation")
                            .from(OperationItems::Table, OperationItems::OperationId)
                            .to(DeliveryOperations::Table, DeliveryOperations::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_operation_items_operation")
                    .table(OperationItems::Table)
                    .col(OperationItems::OperationId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OperationItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DeliveryOperations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum DeliveryOperations {
    Table,
    Id,
    DeliveryId,
    OperationType,
    ActorId,
    CarrierId,
    DeliveryCost,
    PickupStore,
    CreatedAt,
}

#[derive(DeriveIden)]
enum OperationItems {
    Table,
    Id,
    OperationId,
    ProductSku,
    Quantity,
    StoreId,
}

#[derive(DeriveIden)]
enum Deliveries {
    Table,
    Id,
}
