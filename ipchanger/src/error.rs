//! Error types for the service transport and client

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Service unreachable at {endpoint}: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("Service closed the connection without a response")]
    NoResponse,

    #[error("Windows service mode is only available on Windows")]
    ServiceModeUnsupported,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
