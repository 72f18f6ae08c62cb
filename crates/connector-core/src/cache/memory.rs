//! In-process cache store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use super::CacheStore;
use crate::error::{ConnectorError, Result};
use crate::http::HttpResponse;

/// A cached response with its expiry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedResponse {
    pub response: HttpResponse,
    pub expires_at: DateTime<Utc>,
}

impl CachedResponse {
    pub fn new(response: HttpResponse, ttl: Duration) -> Result<Self> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| ConnectorError::Cache(e.to_string()))?;
        Ok(Self {
            response,
            expires_at: Utc::now() + ttl,
        })
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Cache store backed by a map in memory
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Arc<RwLock<HashMap<String, CachedResponse>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, expired ones included
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop expired entries
    pub async fn purge_expired(&self) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| !entry.is_expired());
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<HttpResponse>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired() => {
                    debug!("Cache hit for {}", key);
                    return Ok(Some(entry.response.clone()));
                }
                None => return Ok(None),
                Some(_) => {}
            }
        }

        // Expired; re-checked under the write lock since a set may have raced
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(CachedResponse::is_expired) {
            debug!("Evicting expired cache entry {}", key);
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &HttpResponse, ttl: Duration) -> Result<()> {
        let entry = CachedResponse::new(value.clone(), ttl)?;
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| !entry.is_expired());
        entries.insert(key.to_string(), entry);
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}
