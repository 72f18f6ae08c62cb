//! Response caching for GET requests

use regex::Regex;
use std::sync::{Arc, LazyLock};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use connector_core::{
    CacheModel, CacheSettings, CacheStore, HttpRequest, HttpResponse, ModelRegistry, Result,
};
use openapi_parser::HttpMethod;

static ORIGIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^:/?#]+://[^/?#]*").expect("valid origin pattern"));

/// Cache key for `request`, or `None` when it must not be cached.
///
/// The key is the URL without scheme and host, then `;`, then the headers
/// form-urlencoded in name order.
pub fn cache_key(request: &HttpRequest) -> Option<String> {
    if request.method != HttpMethod::Get {
        return None;
    }

    let path = ORIGIN_RE.replace(&request.url, "");

    let mut headers: Vec<(&str, &str)> = request
        .headers
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();
    headers.sort_by(|a, b| a.0.cmp(b.0));

    let encoded = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(headers)
        .finish();

    Some(format!("{};{}", path, encoded))
}

/// The cache stage of the pipeline.
///
/// A named model is looked up once, on first use. If the registry does not
/// know it, caching stays off for the lifetime of the connector.
pub struct ResponseCache {
    settings: CacheSettings,
    registry: ModelRegistry,
    store: OnceCell<Option<Arc<dyn CacheStore>>>,
    /// Data source label for the missing-model warning
    label: String,
}

impl ResponseCache {
    pub fn new(settings: CacheSettings, registry: ModelRegistry, label: impl Into<String>) -> Self {
        Self {
            settings,
            registry,
            store: OnceCell::new(),
            label: label.into(),
        }
    }

    async fn store(&self) -> Option<&Arc<dyn CacheStore>> {
        self.store
            .get_or_init(|| async {
                match &self.settings.model {
                    CacheModel::Store(store) => Some(store.clone()),
                    CacheModel::Named(name) => {
                        let store = self.registry.get(name).await;
                        if store.is_none() {
                            warn!(
                                "Model \"{}\" not found, caching is disabled for datasource {}",
                                name, self.label
                            );
                        }
                        store
                    }
                }
            })
            .await
            .as_ref()
    }

    pub async fn lookup(&self, key: &str) -> Result<Option<HttpResponse>> {
        let Some(store) = self.store().await else {
            return Ok(None);
        };
        let cached = store.get(key).await?;
        debug!(
            "Cache {} for {}",
            if cached.is_some() { "hit" } else { "miss" },
            key
        );
        Ok(cached)
    }

    pub async fn update(&self, key: &str, response: &HttpResponse) -> Result<()> {
        if let Some(store) = self.store().await {
            store.set(key, response, self.settings.ttl).await?;
        }
        Ok(())
    }
}
