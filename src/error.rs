//! Service-level error type for the delivery core
//!
//! Every variant propagates unchanged up to the HTTP boundary, where it is
//! rendered as `{error, code, details?}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};

use crate::services::inventory_transfer::TransferRequest;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Malformed or semantically invalid request; the caller can fix it
    #[error("{0}")]
    Validation(String),

    /// Requested edge is not part of the delivery lifecycle
    #[error("{0}")]
    InvalidStateTransition(String),

    /// A ledger invariant would break (pending quantity below zero)
    #[error("{0}")]
    ConstraintViolation(String),

    #[error("{0}")]
    NotFound(String),

    /// An external step failed. `completed_transfers` lists the inventory
    /// transfers of the same request that already took effect.
    #[error("{step} failed: {message}")]
    Dependency {
        step: String,
        message: String,
        completed_transfers: Vec<TransferRequest>,
    },

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Failure after some inventory transfers already took effect. Reports
    /// the code and status of `source`.
    #[error("{source}")]
    AfterTransfers {
        source: Box<DeliveryError>,
        completed_transfers: Vec<TransferRequest>,
    },
}

impl DeliveryError {
    pub fn validation(msg: impl Into<String>) -> Self {
        DeliveryError::Validation(msg.into())
    }

    pub fn delivery_not_found(id: i32) -> Self {
        DeliveryError::NotFound(format!("Delivery {} not found", id))
    }

    /// Attach transfers that already ran; a no-op when there are none
    pub fn with_completed_transfers(self, completed_transfers: Vec<TransferRequest>) -> Self {
        if completed_transfers.is_empty() {
            return self;
        }
        DeliveryError::AfterTransfers {
            source: Box::new(self),
            completed_transfers,
        }
    }

    /// The error with any transfer context stripped
    pub fn kind(&self) -> &DeliveryError {
        match self {
            DeliveryError::AfterTransfers { source, .. } => source.kind(),
            other => other,
        }
    }

    /// Taxonomy name reported to callers
    pub fn code(&self) -> &'static str {
        match self {
            DeliveryError::Validation(_) => "ValidationError",
            DeliveryError::InvalidStateTransition(_) => "InvalidStateTransition",
            DeliveryError::ConstraintViolation(_) => "ConstraintViolation",
            DeliveryError::NotFound(_) => "NotFoundError",
            DeliveryError::Dependency { .. } | DeliveryError::Database(_) => "DependencyError",
            DeliveryError::AfterTransfers { source, .. } => source.code(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            DeliveryError::Validation(_) => StatusCode::BAD_REQUEST,
            DeliveryError::InvalidStateTransition(_) => StatusCode::CONFLICT,
            DeliveryError::ConstraintViolation(_) => StatusCode::CONFLICT,
            DeliveryError::NotFound(_) => StatusCode::NOT_FOUND,
            DeliveryError::Dependency { .. } => StatusCode::BAD_GATEWAY,
            DeliveryError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DeliveryError::AfterTransfers { source, .. } => source.status(),
        }
    }
}

/// Error body returned by every delivery endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
            details: None,
        }
    }
}

impl IntoResponse for DeliveryError {
    fn into_response(self) -> Response {
        let status = self.status();

        match self.kind() {
            DeliveryError::ConstraintViolation(msg) => {
                tracing::error!(error = %msg, "Ledger constraint violation");
            }
            DeliveryError::Database(e) => {
                tracing::error!(error = %e, "Database error");
            }
            _ => {}
        }

        let details = match &self {
            DeliveryError::Dependency {
                step,
                completed_transfers,
                ..
            } => Some(serde_json::json!({
                "step": step,
                "completed_transfers": completed_transfers,
            })),
            DeliveryError::AfterTransfers {
                completed_transfers,
                ..
            } => Some(serde_json::json!({
                "completed_transfers": completed_transfers,
            })),
            _ => None,
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: Some(self.code().to_string()),
            details,
        };

        (status, Json(body)).into_response()
    }
}
