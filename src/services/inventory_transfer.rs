//! Inventory transfer client
//!
//! Moves stock between stores when an item is fulfilled from a store other
//! than the delivery's home store. The collaborator answers 2xx on success
//! or an error payload `{"error": "..."}`.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One store-to-store movement of a single SKU
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub origin_store: String,
    pub dest_store: String,
    pub product_sku: String,
    pub quantity: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The request never reached the inventory service
    #[error("connection failed: {0}")]
    Connection(String),
    /// The request may have been applied; never retried
    #[error("request timed out")]
    Timeout,
    /// The inventory service refused the transfer
    #[error("{0}")]
    Rejected(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait InventoryTransfer: Send + Sync {
    async fn transfer(&self, request: &TransferRequest) -> Result<(), TransferError>;
}

#[derive(Debug, Deserialize)]
struct TransferErrorPayload {
    error: String,
}

/// HTTP implementation backed by `reqwest`
#[derive(Clone)]
pub struct HttpInventoryTransfer {
    client: Client,
    url: String,
    max_retries: usize,
}

impl HttpInventoryTransfer {
    pub fn new(url: String, timeout: Duration, max_retries: usize) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url,
            max_retries,
        })
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(self.max_retries)
            .with_jitter()
    }

    async fn post_once(&self, request: &TransferRequest) -> Result<(), TransferError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(error_from_body(status.as_u16(), &body))
    }
}

fn classify_send_error(e: reqwest::Error) -> TransferError {
    if e.is_timeout() {
        TransferError::Timeout
    } else if e.is_connect() {
        TransferError::Connection(e.to_string())
    } else {
        TransferError::Transport(e.to_string())
    }
}

fn error_from_body(status: u16, body: &str) -> TransferError {
    match serde_json::from_str::<TransferErrorPayload>(body) {
        Ok(payload) => TransferError::Rejected(payload.error),
        Err(_) => TransferError::Http {
            status,
            body: body.chars().take(200).collect(),
        },
    }
}

#[async_trait]
impl InventoryTransfer for HttpInventoryTransfer {
    async fn transfer(&self, request: &TransferRequest) -> Result<(), TransferError> {
        debug!(
            sku = %request.product_sku,
            origin = %request.origin_store,
            dest = %request.dest_store,
            quantity = request.quantity,
            "Requesting inventory transfer"
        );

        // Only connection failures are retried: anything else may already
        // have moved stock on the other side.
        (|| async { self.post_once(request).await })
            .retry(self.backoff())
            .when(|e| matches!(e, TransferError::Connection(_)))
            .notify(|e, delay| {
                warn!(error = %e, delay_ms = delay.as_millis() as u64, "Inventory service unreachable, retrying");
            })
            .await
    }
}
