//! Transports that carry built requests over the wire

mod http;

pub use http::ReqwestTransport;

use async_trait::async_trait;
use connector_core::{HttpRequest, HttpResponse, Result};

/// Sends one request and returns the response, whatever its status
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}
