//! Unified error types for the subscription service.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Unified error type for the subscription service.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration loaded but failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Update cycle error.
    #[error("update error: {0}")]
    Update(#[from] UpdateError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to obtain a single node URL from sing-box.
#[derive(Error, Debug)]
pub enum NodeError {
    /// `info` reported the config as unknown.
    #[error("config {name} does not exist")]
    NotFound {
        /// Config name.
        name: String,
    },

    /// `url` exited non-zero or printed nothing.
    #[error("config {name} fetch failed: {stderr}")]
    Failed {
        /// Config name.
        name: String,
        /// Captured stderr.
        stderr: String,
    },

    /// The subprocess did not finish in time.
    #[error("config {name} fetch timed out after {timeout:?}")]
    Timeout {
        /// Config name.
        name: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// The subprocess could not be spawned or awaited.
    #[error("config {name} fetch error: {source}")]
    Io {
        /// Config name.
        name: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// subconverter request errors.
#[derive(Error, Debug)]
pub enum ConverterError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("subconverter request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// subconverter answered with a non-success status.
    #[error("subconverter returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },
}

/// Errors that abort an update cycle.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// The liveness probe failed before any work was done.
    #[error("subconverter service is not running")]
    ConverterUnavailable,

    /// Every configured node failed.
    #[error("no nodes were retrieved")]
    NoNodes {
        /// Per-node error messages.
        details: Vec<String>,
    },

    /// Writing artifacts failed.
    #[error("artifact io failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by HTTP handlers, mapped to a status code at the boundary.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed request.
    #[error("{0}")]
    BadRequest(String),

    /// An upstream dependency is down.
    #[error("{0}")]
    ServiceUnavailable(String),

    /// The update produced no nodes.
    #[error("{message}")]
    NoNodes {
        /// Summary message.
        message: String,
        /// Per-node error messages.
        details: Vec<String>,
    },

    /// A requested artifact does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A requested artifact exists but could not be read.
    #[error("{0}")]
    ReadFailed(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::NoNodes { .. } => StatusCode::BAD_REQUEST,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ReadFailed(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<UpdateError> for ApiError {
    fn from(err: UpdateError) -> Self {
        match err {
            UpdateError::ConverterUnavailable => ApiError::ServiceUnavailable(err.to_string()),
            UpdateError::NoNodes { details } => ApiError::NoNodes {
                message: "no nodes were retrieved".to_string(),
                details,
            },
            UpdateError::Io(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            // File routes answer in plain text like the files they serve.
            ApiError::NotFound(message) | ApiError::ReadFailed(message) => {
                (status, message).into_response()
            }
            ApiError::NoNodes { message, details } => {
                (status, Json(json!({ "error": message, "details": details }))).into_response()
            }
            other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
        }
    }
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, AppError>;
