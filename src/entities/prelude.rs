//! `SeaORM` entity prelude

pub use super::customers::Entity as Customers;
pub use super::deliveries::Entity as Deliveries;
pub use super::delivery_items::Entity as DeliveryItems;
pub use super::delivery_operations::Entity as DeliveryOperations;
pub use super::operation_items::Entity as OperationItems;
pub use super::products::Entity as Products;
pub use super::users::Entity as Users;
