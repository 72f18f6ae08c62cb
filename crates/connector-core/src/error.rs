//! Error types for connector-core

use thiserror::Error;

use crate::http::HttpResponse;
use openapi_parser::SpecError;

/// Result type alias for connector operations
pub type Result<T> = std::result::Result<T, ConnectorError>;

/// Connector error types
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("Failed to resolve specification: {0}")]
    SpecResolution(#[from] SpecError),

    #[error("Specification is invalid: {0}")]
    Validation(String),

    #[error("No swagger specification provided")]
    NoSpecProvided,

    #[error("Operation not found: {0}")]
    OperationNotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Observer failed: {0}")]
    Observer(String),

    #[error("Cache error: {0}")]
    Cache(String),

    /// Response rejected by the default response transform
    #[error("{message}")]
    Http {
        message: String,
        details: Box<HttpResponse>,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl ConnectorError {
    /// HTTP status of the rejected response, if this is an HTTP error
    pub fn status(&self) -> Option<u16> {
        match self {
            ConnectorError::Http { details, .. } => Some(details.status),
            _ => None,
        }
    }
}
