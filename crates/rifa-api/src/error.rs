use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use rifa_db::StoreError;

/// Request-level error taxonomy. Every variant maps to a status code and a
/// JSON `{"error": ...}` body; internal details are logged, never sent.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("admin access required")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("not enough tickets available")]
    InsufficientAvailability,

    #[error("not enough ticket numbers left to draw")]
    InsufficientTickets,

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::InsufficientAvailability | ApiError::InsufficientTickets => {
                StatusCode::CONFLICT
            }
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(err) = &self {
            error!("internal error: {err:#}");
        }
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound,
            StoreError::RaffleInactive => ApiError::Validation("raffle is not active".into()),
            StoreError::NotPending => ApiError::Validation("purchase is not pending".into()),
            StoreError::InsufficientAvailability => ApiError::InsufficientAvailability,
            StoreError::InsufficientTickets => ApiError::InsufficientTickets,
            StoreError::TotalBelowAssigned { assigned } => ApiError::Validation(format!(
                "total tickets cannot shrink below the {assigned} already-assigned numbers"
            )),
            other => ApiError::Internal(other.into()),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(err.into())
    }
}
