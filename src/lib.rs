// src/lib.rs

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use sea_orm::DatabaseConnection;
use services::{inventory_transfer::InventoryTransfer, notifications::EventPublisher};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub inventory: Arc<dyn InventoryTransfer>,
    pub events: EventPublisher,
}

pub mod entities {
    pub mod prelude;
    pub mod customers;
    pub mod deliveries;
    pub mod delivery_items;
    pub mod delivery_operations;
    pub mod operation_items;
    pub mod products;
    pub mod users;
}

pub mod services {
    pub mod item_ledger;
    pub mod operation_recorder;
    pub mod fulfillment;
    pub mod delivery_state;
    pub mod delivery_listing;
    pub mod delivery_creation;
    pub mod inventory_transfer;
    pub mod notifications;
}

pub mod config;
pub mod error;
pub mod models;
pub mod handlers;
pub mod jobs;

/// All HTTP routes with tracing and CORS applied
pub fn build_router(state: AppState) -> Router {
    use handlers::deliveries;

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/deliveries",
            get(deliveries::list_deliveries).post(deliveries::create_delivery),
        )
        .route(
            "/api/deliveries/{id}",
            get(deliveries::get_delivery).patch(deliveries::update_delivery),
        )
        .route("/api/deliveries/{id}/fulfill", post(deliveries::fulfill_delivery))
        .route("/api/deliveries/{id}/operations", get(deliveries::list_operations))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
