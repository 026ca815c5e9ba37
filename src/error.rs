use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Errors produced by the backend clients
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection refused, DNS failure or any other transport-level failure
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The backend answered 2xx but flagged the request as failed
    #[error("backend rejected the request: {0}")]
    Rejected(String),

    /// The backend answered but had nothing to say
    #[error("backend returned an empty result")]
    EmptyResult,

    #[error("failed to decode backend response: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Every candidate was tried; one entry per failed attempt
    #[error("all backends failed: {}", .0.join("; "))]
    Exhausted(Vec<String>),
}

impl ClientError {
    /// Whether the failure means the backend could not be reached at all,
    /// so retrying the same URL is pointless.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            ClientError::NetworkUnreachable(_) | ClientError::Timeout(_)
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        // a connect timeout reports both flags
        if err.is_timeout() {
            ClientError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            ClientError::NetworkUnreachable(err.to_string())
        } else if err.is_decode() || err.is_body() {
            ClientError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ClientError::Http {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            ClientError::NetworkUnreachable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Custom error type for the gateway handlers
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    ValidationError(String),
    BadGateway(String),
    GatewayTimeout(String),
    InternalServerError(String),
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            AppError::BadGateway(msg) => {
                warn!("Backend failure: {}", msg);
                (StatusCode::BAD_GATEWAY, "BAD_GATEWAY", msg)
            }
            AppError::GatewayTimeout(msg) => {
                warn!("Backend timeout: {}", msg);
                (StatusCode::GATEWAY_TIMEOUT, "GATEWAY_TIMEOUT", msg)
            }
            AppError::InternalServerError(msg) => {
                error!("Internal server error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    msg,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::InvalidRequest(msg) => AppError::ValidationError(msg),
            ClientError::Timeout(_) => AppError::GatewayTimeout(err.to_string()),
            ClientError::NetworkUnreachable(_)
            | ClientError::Http { .. }
            | ClientError::Rejected(_)
            | ClientError::Exhausted(_) => AppError::BadGateway(err.to_string()),
            ClientError::EmptyResult | ClientError::Decode(_) => {
                AppError::InternalServerError(err.to_string())
            }
        }
    }
}

/// Result type for gateway handlers
pub type AppResult<T> = Result<T, AppError>;
