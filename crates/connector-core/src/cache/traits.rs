//! Cache store trait definition

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::http::HttpResponse;

/// Key-value store for cached responses
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up a live entry; expired entries are misses
    async fn get(&self, key: &str) -> Result<Option<HttpResponse>>;

    /// Store a response for `ttl`
    async fn set(&self, key: &str, value: &HttpResponse, ttl: Duration) -> Result<()>;

    /// Get a human-readable name for this store
    fn store_name(&self) -> &'static str;
}
