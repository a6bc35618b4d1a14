pub use sea_orm_migration::prelude::*;

mod m20261001_000001_create_reference_tables;
mod m20261001_000002_create_deliveries;
mod m20261001_000003_create_delivery_operations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_reference_tables::Migration),
            Box::new(m20261001_000002_create_deliveries::Migration),
            Box::new(m20261001_000003_create_delivery_operations::Migration),
        ]
    }
}
