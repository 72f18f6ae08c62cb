//! # connector-core
//!
//! Shared building blocks for openapi-connector:
//! - Error taxonomy and `Result` alias
//! - Connector settings and the JSON configuration file format
//! - HTTP request/response records passed through the interceptor pipeline
//! - Response cache store trait with an in-memory implementation
//! - Model registry used to look up named cache models

pub mod cache;
pub mod error;
pub mod http;
pub mod registry;
pub mod settings;

pub use cache::{CacheStore, CachedResponse, MemoryCacheStore};
pub use error::{ConnectorError, Result};
pub use http::{HttpRequest, HttpResponse};
pub use registry::ModelRegistry;
pub use settings::{
    CacheModel, CacheSettings, ConnectorConfig, ConnectorSettings, HttpClientOptions, Positional,
    ResponseTransform, TransformResponse,
};
