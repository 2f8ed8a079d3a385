//! HTTP error mapping

use serde::Serialize;
use thiserror::Error;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Reply;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
    pub timestamp: String,
}

/// Error detail
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Failures a handler reports to the client
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{message}")]
    NotFound { message: String, details: Option<serde_json::Value> },

    /// Logged where it happens; the client only sees a generic message
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::Internal => "INTERNAL_ERROR",
        }
    }

    pub fn to_body(&self) -> ErrorResponse {
        let details = match self {
            ApiError::NotFound { details, .. } => details.clone(),
            _ => None,
        };

        ErrorResponse {
            error: ErrorDetail { code: self.code().to_string(), message: self.to_string(), details },
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl Reply for ApiError {
    fn into_response(self) -> Response {
        warp::reply::with_status(warp::reply::json(&self.to_body()), self.status()).into_response()
    }
}
