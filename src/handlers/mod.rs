pub mod deliveries;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
};
use serde::Serialize;
use tracing::warn;

use crate::error::ErrorResponse;
use crate::models::actor::{Actor, Role};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Caller identity forwarded by the gateway. Rejects with 401 when either
/// header is missing or malformed.
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let user_id = header(USER_ID_HEADER).and_then(|v| v.parse::<i32>().ok());
        let role = header(USER_ROLE_HEADER).and_then(|v| v.parse::<Role>().ok());

        match (user_id, role) {
            (Some(user_id), Some(role)) => Ok(Actor::new(user_id, role)),
            _ => {
                warn!(path = %parts.uri.path(), "Rejected request without valid identity headers");
                Err((
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse::new(format!(
                        "Missing or invalid {} / {} headers",
                        USER_ID_HEADER, USER_ROLE_HEADER
                    ))),
                ))
            }
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
