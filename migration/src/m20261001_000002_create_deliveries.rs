//! Deliveries and their SKU lines (the item ledger).

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Deliveries::Table)
                    .if_not_exists()
                    .col(pk_auto(Deliveries::Id))
                    .col(string(Deliveries::DeliveryType))
                    .col(string(Deliveries::State).default("pending"))
                    .col(date(Deliveries::OrderDate))
                    .col(date_null(Deliveries::ScheduledDate))
                    .col(string_null(Deliveries::StoreId))
                    .col(string_null(Deliveries::OriginStore))
                    .col(string_null(Deliveries::DestinationStore))
                    .col(integer_null(Deliveries::CustomerId))
                    .col(integer_null(Deliveries::SupplierId))
                    .col(text_null(Deliveries::ProductSummary))
                    .col(text_null(Deliveries::Notes))
                    .col(integer(Deliveries::CreatedBy))
                    .col(
                        timestamp_with_time_zone(Deliveries::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Deliveries::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deliveries_customer")
                            .from(Deliveries::Table, Deliveries::CustomerId)
                            .to(Customers::Table, Customers::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deliveries_created_by")
                            .from(Deliveries::Table, Deliveries::CreatedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // Listing filters on state and orders pending rows by scheduled date
        manager
            .create_index(
                Index::create()
                    .name("idx_deliveries_state_scheduled")
                    .table(Deliveries::Table)
                    .col(Deliveries::State)
                    .col(Deliveries::ScheduledDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_deliveries_created_by")
                    .table(Deliveries::Table)
                    .col(Deliveries::CreatedBy)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DeliveryItems::Table)
                    .if_not_exists()
                    .col(pk_auto(DeliveryItems::Id))
                    .col(integer(DeliveryItems::DeliveryId))
                    .col(string(DeliveryItems::ProductSku))
                    .col(integer(DeliveryItems::Quantity))
                    .col(integer(DeliveryItems::PendingQuantity))
                    .check(Expr::col(DeliveryItems::PendingQuantity).gte(0))
                    .check(
                        Expr::col(DeliveryItems::PendingQuantity)
                            .lte(Expr::col(DeliveryItems::Quantity)),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_delivery_items_delivery")
                            .from(DeliveryItems::Table, DeliveryItems::DeliveryId)
                            .to(Deliveries::Table, Deliveries::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One ledger line per SKU per delivery
        manager
            .create_index(
                Index::create()
                    .name("idx_delivery_items_delivery_sku")
                    .table(DeliveryItems::Table)
                    .col(DeliveryItems::DeliveryId)
                    .col(DeliveryItems::ProductSku)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeliveryItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Deliveries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Deliveries {
    Table,
    Id,
    DeliveryType,
    State,
    OrderDate,
    ScheduledDate,
    StoreId,
    OriginStore,
    DestinationStore,
    CustomerId,
    SupplierId,
    ProductSummary,
    Notes,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum DeliveryItems {
    Table,
    Id,
    DeliveryId,
    ProductSku,
    Quantity,
    PendingQuantity,
}

#[derive(DeriveIden)]
enum Customers {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
