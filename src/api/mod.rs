pub mod attendance;
pub mod health;
pub mod ws;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::error::SyncError;

/// Failures the HTTP surface reports to clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Nothing to serve: the key is absent or its value could not be decoded.
    #[error("no data: {0}")]
    NoData(String),

    /// The source store or the cache backend could not be reached.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<SyncError> for ApiError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Upstream(_) | SyncError::Cache(_) => {
                warn!(error = %e, "Backend unavailable");
                ApiError::Unavailable(e.to_string())
            }
            other => {
                error!(error = %other, "Request failed");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NoData(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // backend details stay in the log
        let message = match self {
            ApiError::NoData(msg) => msg.as_str(),
            ApiError::Unavailable(_) => "Service Unavailable",
            ApiError::Internal(_) => "Internal Server Error",
        };
        HttpResponse::build(self.status_code()).json(json!({ "error": message }))
    }
}
