#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{body::Body, http::Request, Router};
use chrono::Utc;
use http_body_util::BodyExt;
use logistics_backend::{
    build_router,
    entities::{customers, prelude::Products, products, users},
    models::actor::{Actor, Role},
    models::delivery::{CreateDeliveryRequest, DeliveryResponse, DeliveryType, NewDeliveryItem},
    services::{
        delivery_creation,
        inventory_transfer::{InventoryTransfer, TransferError, TransferRequest},
        notifications::{DeliveryEvent, EmailTemplate, EventPublisher, Notifier, NotifyError, Salesperson},
    },
    AppState,
};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, DbErr, EntityTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;
use tower::ServiceExt;

pub const ADMIN_ID: i32 = 1;
pub const LOGISTICS_ID: i32 = 2;
pub const SELLER_ID: i32 = 3;
pub const OTHER_SELLER_ID: i32 = 4;
pub const CUSTOMER_ID: i32 = 1;

pub fn logistics() -> Actor {
    Actor::new(LOGISTICS_ID, Role::Logistics)
}

pub fn seller() -> Actor {
    Actor::new(SELLER_ID, Role::Sales)
}

pub fn other_seller() -> Actor {
    Actor::new(OTHER_SELLER_ID, Role::Sales)
}

/// In-memory SQLite with the real migrations applied. A single pooled
/// connection keeps every query on the same database.
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Staff, one customer and a small catalogue
pub async fn seed_reference_data(db: &DatabaseConnection) -> Result<(), DbErr> {
    for (id, name, email, phone, role) in [
        (ADMIN_ID, "Admin", None, None, "admin"),
        (LOGISTICS_ID, "Depósito", None, None, "logistics"),
        (SELLER_ID, "Lucía", Some("lucia@example.com"), Some("+54 11 4444 0000"), "sales"),
        (OTHER_SELLER_ID, "Marcos", None, None, "sales"),
    ] {
        users::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            email: Set(email.map(str::to_string)),
            phone: Set(phone.map(str::to_string)),
            role: Set(role.to_string()),
        }
        .insert(db)
        .await?;
    }

    seed_customer(db, CUSTOMER_ID, "Ana Pérez", Some("ana@example.com"), Some("+54 11 5555 1234")).await?;

    Products::insert_many([
        products::ActiveModel {
            sku: Set("SKU-A".to_string()),
            name: Set("Colchón Gani Plus 2 plazas".to_string()),
        },
        products::ActiveModel {
            sku: Set("SKU-B".to_string()),
            name: Set("Sommier base".to_string()),
        },
        products::ActiveModel {
            sku: Set("SKU-C".to_string()),
            name: Set("Mesa de luz".to_string()),
        },
    ])
    .exec_without_returning(db)
    .await?;

    Ok(())
}

pub async fn seed_customer(
    db: &DatabaseConnection,
    id: i32,
    name: &str,
    email: Option<&str>,
    phone: Option<&str>,
) -> Result<customers::Model, DbErr> {
    customers::ActiveModel {
        id: Set(id),
        name: Set(name.to_string()),
        email: Set(email.map(str::to_string)),
        phone: Set(phone.map(str::to_string)),
        created_at: Set(Utc::now().fixed_offset()),
    }
    .insert(db)
    .await
}

/// Home delivery for the seeded customer, shipped from `store`
pub async fn create_home_delivery(
    db: &DatabaseConnection,
    actor: &Actor,
    store: &str,
    items: &[(&str, i32)],
) -> DeliveryResponse {
    let request = CreateDeliveryRequest {
        delivery_type: DeliveryType::HomeDelivery,
        order_date: None,
        scheduled_date: None,
        store_id: Some(store.to_string()),
        origin_store: None,
        destination_store: None,
        customer_id: Some(CUSTOMER_ID),
        supplier_id: None,
        product_summary: None,
        notes: None,
        items: items
            .iter()
            .map(|(sku, quantity)| NewDeliveryItem {
                product_sku: sku.to_string(),
                quantity: *quantity,
            })
            .collect(),
    };

    delivery_creation::create_delivery(db, actor, request)
        .await
        .expect("Failed to create delivery")
}

/// Inventory collaborator that records calls and can fail on the Nth one
#[derive(Default)]
pub struct FakeInventory {
    pub calls: Mutex<Vec<TransferRequest>>,
    /// 1-based call number that fails
    pub fail_on: Option<usize>,
}

impl FakeInventory {
    pub fn failing_on(call: usize) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: Some(call),
        }
    }

    pub fn calls(&self) -> Vec<TransferRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl InventoryTransfer for FakeInventory {
    async fn transfer(&self, request: &TransferRequest) -> Result<(), TransferError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(request.clone());
        if self.fail_on == Some(calls.len()) {
            return Err(TransferError::Rejected(format!(
                "Insufficient stock of {} in {}",
                request.product_sku, request.origin_store
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SentNotification {
    FollowUp { delivery_id: i32, user_id: i32 },
    Email { template: EmailTemplate, to: String, delivery_id: i32 },
}

/// Notifier that records what it was asked to send
#[derive(Default)]
pub struct FakeNotifier {
    pub sent: Mutex<Vec<SentNotification>>,
    pub fail_follow_up: bool,
}

impl FakeNotifier {
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn schedule_follow_up(
        &self,
        delivery_id: i32,
        salesperson: &Salesperson,
    ) -> Result<(), NotifyError> {
        if self.fail_follow_up {
            return Err(NotifyError::Status {
                status: 503,
                body: "scheduler down".to_string(),
            });
        }
        self.sent.lock().unwrap().push(SentNotification::FollowUp {
            delivery_id,
            user_id: salesperson.user_id,
        });
        Ok(())
    }

    async fn send_email(
        &self,
        template: EmailTemplate,
        to: &str,
        _name: Option<&str>,
        delivery_id: i32,
    ) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(SentNotification::Email {
            template,
            to: to.to_string(),
            delivery_id,
        });
        Ok(())
    }
}

/// Seeded database plus fake collaborators
pub struct TestContext {
    pub db: DatabaseConnection,
    pub inventory: Arc<FakeInventory>,
    pub events: EventPublisher,
    pub rx: UnboundedReceiver<DeliveryEvent>,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_inventory(FakeInventory::default()).await
    }

    pub async fn with_inventory(inventory: FakeInventory) -> Self {
        let db = setup_test_db().await.expect("Failed to set up test DB");
        seed_reference_data(&db).await.expect("Failed to seed test DB");
        let (events, rx) = EventPublisher::channel();

        Self {
            db,
            inventory: Arc::new(inventory),
            events,
            rx,
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            db: self.db.clone(),
            inventory: self.inventory.clone(),
            events: self.events.clone(),
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state())
    }

    /// Events published so far, without waiting
    pub fn drain_events(&mut self) -> Vec<DeliveryEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Send one request through the router and decode the JSON body
pub async fn send(
    app: Router,
    method: &str,
    uri: &str,
    actor: Option<&Actor>,
    body: Option<Value>,
) -> (axum::http::StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        let role = match actor.role {
            Role::Admin => "admin",
            Role::Logistics => "logistics",
            Role::Sales => "sales",
        };
        builder = builder
            .header("x-user-id", actor.user_id.to_string())
            .header("x-user-role", role);
    }

    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
