//! # openapi-connector
//!
//! Turns a Swagger 2.0 / OpenAPI 3.0 specification into a table of callable
//! methods. Each call binds its arguments to the operation's parameters,
//! builds the HTTP request and runs it through an interceptor pipeline with
//! before/after execute observers and an optional GET response cache.

pub mod binder;
mod connector;
mod invocation;
pub mod pipeline;
pub mod request;
pub mod transport;

pub use binder::{ArgumentBinder, BoundCall, CallArgs, CallOptions};
pub use connector::{MethodTable, ModelBinding, OpenApiConnector};
pub use invocation::{default_transform, MethodOutput, OperationMethod};
pub use pipeline::{
    cache_key, AsyncFnObserver, ExecuteContext, ExecuteEvent, ExecuteObserver, FnObserver,
    InterceptorPipeline, ObserverRegistry, ResponseCache,
};
pub use request::RequestBuilder;
pub use transport::{HttpTransport, ReqwestTransport};

pub use connector_core::{
    CacheModel, CacheSettings, ConnectorConfig, ConnectorError, ConnectorSettings, HttpRequest,
    HttpResponse, MemoryCacheStore, ModelRegistry, Positional, ResponseTransform, Result,
    TransformResponse,
};
pub use openapi_parser::{Authorization, OAuthToken, SpecSource};
