use std::sync::Arc;

use logistics_backend::{
    build_router,
    config::AppConfig,
    jobs::notification_dispatch::start_notification_dispatch_job,
    services::{
        inventory_transfer::HttpInventoryTransfer,
        notifications::{EventPublisher, HttpNotifier},
    },
    AppState,
};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,logistics_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env().expect("Invalid configuration");

    // Connect to database
    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    let inventory = HttpInventoryTransfer::new(
        config.inventory_transfer_url.clone(),
        config.inventory_timeout,
        config.inventory_max_retries,
    )
    .expect("Failed to build inventory transfer client");

    let notifier = HttpNotifier::new(
        config.follow_up_url.clone(),
        config.email_trigger_url.clone(),
        config.notification_timeout,
    )
    .expect("Failed to build notification client");

    // Notifications run off the request path
    let (events, rx) = EventPublisher::channel();
    let _dispatcher = start_notification_dispatch_job(rx, Arc::new(notifier), config.warranty_keyword.clone());

    let state = AppState {
        db,
        inventory: Arc::new(inventory),
        events,
    };

    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
