//! Error types for the OpenAPI parser

use thiserror::Error;

/// Result type alias for parser operations
pub type ParseResult<T> = std::result::Result<T, SpecError>;

/// Spec resolution error types
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("Failed to fetch OpenAPI spec: {0}")]
    FetchError(String),

    #[error("Unsupported spec file format: {0} (expected .json, .yaml or .yml)")]
    UnsupportedFormat(String),

    #[error("Invalid spec type: {0} (expected a URL, a file path or a specification object)")]
    InvalidSpecType(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unresolvable reference: {0}")]
    DereferenceError(String),

    #[error("Spec validation failed: {}", .0.join("; "))]
    ValidationError(Vec<String>),

    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unsupported OpenAPI version: {0}")]
    UnsupportedVersion(String),
}
