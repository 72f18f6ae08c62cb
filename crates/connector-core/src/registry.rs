//! Registry of named cache models

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::CacheStore;

/// Maps model names to cache stores, so settings can refer to a store by name
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: Arc<RwLock<HashMap<String, Arc<dyn CacheStore>>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a named store
    pub async fn register(&self, name: impl Into<String>, store: Arc<dyn CacheStore>) {
        let name = name.into();
        debug!("Registering cache model {} ({})", name, store.store_name());
        self.models.write().await.insert(name, store);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn CacheStore>> {
        self.models.read().await.get(name).cloned()
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}
