//! Connector settings
//!
//! [`ConnectorSettings`] is the runtime configuration of a connector. It can
//! be built in code, or loaded from a JSON file through [`ConnectorConfig`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cache::CacheStore;
use crate::error::{ConnectorError, Result};
use crate::http::HttpResponse;
use openapi_parser::{ApiOperation, Authorization, MapToMethods, SpecSource};

/// How generated methods take their arguments
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PositionalSetting", into = "PositionalSetting")]
pub enum Positional {
    /// One object of named parameters plus an options object
    #[default]
    Off,
    /// One argument per declared parameter
    On,
    /// Positional, with the Swagger 2.0 body parameter moved last
    BodyLast,
}

impl Positional {
    pub fn is_positional(&self) -> bool {
        !matches!(self, Positional::Off)
    }
}

/// `false | true | "bodyLast"` in configuration files
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PositionalSetting {
    Flag(bool),
    Mode(String),
}

impl TryFrom<PositionalSetting> for Positional {
    type Error = String;

    fn try_from(setting: PositionalSetting) -> std::result::Result<Self, Self::Error> {
        match setting {
            PositionalSetting::Flag(false) => Ok(Positional::Off),
            PositionalSetting::Flag(true) => Ok(Positional::On),
            PositionalSetting::Mode(mode) if mode == "bodyLast" => Ok(Positional::BodyLast),
            PositionalSetting::Mode(mode) => Err(format!("unknown positional mode `{}`", mode)),
        }
    }
}

impl From<Positional> for PositionalSetting {
    fn from(positional: Positional) -> Self {
        match positional {
            Positional::Off => PositionalSetting::Flag(false),
            Positional::On => PositionalSetting::Flag(true),
            Positional::BodyLast => PositionalSetting::Mode("bodyLast".to_string()),
        }
    }
}

/// Custom response transform
pub type ResponseTransform =
    Arc<dyn Fn(HttpResponse, &ApiOperation) -> Result<Value> + Send + Sync>;

/// What generated methods return
#[derive(Clone, Default)]
pub enum TransformResponse {
    /// The full response
    #[default]
    None,
    /// The body for status < 400, an HTTP error otherwise
    Default,
    Custom(ResponseTransform),
}

impl fmt::Debug for TransformResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformResponse::None => f.write_str("None"),
            TransformResponse::Default => f.write_str("Default"),
            TransformResponse::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Options applied to every request the default transport sends
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpClientOptions {
    /// Request timeout in milliseconds
    pub timeout: Option<u64>,
    /// Headers added to every request unless the request sets them
    #[serde(default)]
    pub headers: IndexMap<String, String>,
}

impl HttpClientOptions {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_millis)
    }
}

/// Where cached responses are kept
#[derive(Clone)]
pub enum CacheModel {
    Store(Arc<dyn CacheStore>),
    /// Looked up in the model registry on first use
    Named(String),
}

impl fmt::Debug for CacheModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheModel::Store(store) => write!(f, "Store({})", store.store_name()),
            CacheModel::Named(name) => write!(f, "Named({:?})", name),
        }
    }
}

/// Response cache configuration
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub model: CacheModel,
    pub ttl: Duration,
}

impl CacheSettings {
    pub fn new(model: CacheModel, ttl: Duration) -> Self {
        Self { model, ttl }
    }
}

/// Runtime connector configuration
#[derive(Clone)]
pub struct ConnectorSettings {
    /// Base URL for a spec without a host or with relative servers, used
    /// when the spec was not loaded from a URL
    pub url: Option<String>,
    pub spec: Option<SpecSource>,
    /// Run both validation passes when resolving
    pub validate: bool,
    /// Convert Swagger 2.0 specs to OpenAPI 3.0 before use
    pub force_open_api30: bool,
    pub positional: Positional,
    pub transform_response: TransformResponse,
    pub http_client_options: HttpClientOptions,
    /// Credentials keyed by security scheme name
    pub authorizations: IndexMap<String, Authorization>,
    pub cache: Option<CacheSettings>,
    pub map_to_methods: Option<MapToMethods>,
    /// Version reported in the User-Agent header
    pub version: String,
}

impl ConnectorSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings for a spec location or document
    pub fn with_spec(spec: impl Into<SpecSource>) -> Self {
        Self {
            spec: Some(spec.into()),
            ..Self::default()
        }
    }

    /// Check the invariants configuration files can violate
    pub fn validate(&self) -> Result<()> {
        if let Some(cache) = &self.cache {
            if let CacheModel::Named(name) = &cache.model {
                if name.is_empty() {
                    return Err(ConnectorError::Config(
                        "\"cache.model\" setting is required".to_string(),
                    ));
                }
            }
            if cache.ttl.is_zero() {
                return Err(ConnectorError::Config(
                    "\"cache.ttl\" must be a positive number".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn user_agent(&self) -> String {
        format!("openapi-connector/{}", self.version)
    }
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            url: None,
            spec: None,
            validate: false,
            force_open_api30: false,
            positional: Positional::Off,
            transform_response: TransformResponse::None,
            http_client_options: HttpClientOptions::default(),
            authorizations: IndexMap::new(),
            cache: None,
            map_to_methods: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl fmt::Debug for ConnectorSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorSettings")
            .field("url", &self.url)
            .field("spec", &self.spec.as_ref().map(|s| s.to_string()))
            .field("validate", &self.validate)
            .field("force_open_api30", &self.force_open_api30)
            .field("positional", &self.positional)
            .field("transform_response", &self.transform_response)
            .field("http_client_options", &self.http_client_options)
            .field("authorizations", &self.authorizations.keys().collect::<Vec<_>>())
            .field("cache", &self.cache)
            .field("map_to_methods", &self.map_to_methods.is_some())
            .field("version", &self.version)
            .finish()
    }
}

/// Cache section of a configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// Name of a registered cache model
    pub model: Option<String>,
    /// Time to live in milliseconds
    pub ttl: Option<u64>,
}

/// JSON configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectorConfig {
    pub url: Option<String>,
    /// Location string or inline specification object
    pub spec: Option<Value>,
    pub validate: bool,
    pub force_open_api30: bool,
    pub positional: Positional,
    /// `true` selects the default response transform
    pub transform_response: bool,
    pub http_client_options: HttpClientOptions,
    pub authorizations: IndexMap<String, Authorization>,
    pub cache: Option<CacheConfig>,
    pub version: Option<String>,
}

impl ConnectorConfig {
    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ConnectorConfig = serde_json::from_str(&contents)?;
        debug!("Loaded connector config from {:?}", path);
        Ok(config)
    }

    /// Build runtime settings, checking the cache section
    pub fn into_settings(self) -> Result<ConnectorSettings> {
        let cache = match self.cache {
            Some(cache) => {
                let model = cache.model.filter(|m| !m.is_empty()).ok_or_else(|| {
                    ConnectorError::Config("\"cache.model\" setting is required".to_string())
                })?;
                let ttl = match cache.ttl {
                    None => {
                        return Err(ConnectorError::Config(
                            "\"cache.ttl\" setting is required".to_string(),
                        ))
                    }
                    Some(0) => {
                        return Err(ConnectorError::Config(
                            "\"cache.ttl\" must be a positive number".to_string(),
                        ))
                    }
                    Some(ttl) => Duration::from_millis(ttl),
                };
                Some(CacheSettings::new(CacheModel::Named(model), ttl))
            }
            None => None,
        };

        let spec = self.spec.map(SpecSource::from_value).transpose()?;

        let defaults = ConnectorSettings::default();
        Ok(ConnectorSettings {
            url: self.url,
            spec,
            validate: self.validate,
            force_open_api30: self.force_open_api30,
            positional: self.positional,
            transform_response: if self.transform_response {
                TransformResponse::Default
            } else {
                TransformResponse::None
            },
            http_client_options: self.http_client_options,
            authorizations: self.authorizations,
            cache,
            map_to_methods: None,
            version: self.version.unwrap_or(defaults.version),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_positional_setting_values() {
        let parse = |v: Value| serde_json::from_value::<Positional>(v);

        assert_eq!(parse(json!(false)).unwrap(), Positional::Off);
        assert_eq!(parse(json!(true)).unwrap(), Positional::On);
        assert_eq!(parse(json!("bodyLast")).unwrap(), Positional::BodyLast);
        assert!(parse(json!("first")).is_err());
        assert_eq!(serde_json::to_value(Positional::BodyLast).unwrap(), json!("bodyLast"));
    }

    #[test]
    fn test_load_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("datasource.json");
        std::fs::write(
            &path,
            json!({
                "spec": "specs/petstore.json",
                "validate": true,
                "forceOpenApi30": true,
                "positional": "bodyLast",
                "transformResponse": true,
                "httpClientOptions": {"timeout": 5000, "headers": {"x-trace": "1"}},
                "authorizations": {"api_key": "abc12"},
                "cache": {"model": "ResponseCache", "ttl": 60000},
                "version": "9.9.9"
            })
            .to_string(),
        )
        .unwrap();

        let settings = ConnectorConfig::load(&path).unwrap().into_settings().unwrap();

        assert!(matches!(settings.spec, Some(SpecSource::File(_))));
        assert!(settings.validate);
        assert!(settings.force_open_api30);
        assert_eq!(settings.positional, Positional::BodyLast);
        assert!(matches!(settings.transform_response, TransformResponse::Default));
        assert_eq!(settings.http_client_options.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(settings.authorizations["api_key"], Authorization::Value("abc12".to_string()));
        let cache = settings.cache.as_ref().unwrap();
        assert!(matches!(cache.model, CacheModel::Named(ref name) if name == "ResponseCache"));
        assert_eq!(cache.ttl, Duration::from_secs(60));
        assert_eq!(settings.user_agent(), "openapi-connector/9.9.9");
    }

    #[test]
    fn test_cache_assertions() {
        let config = |cache: Value| ConnectorConfig {
            cache: Some(serde_json::from_value(cache).unwrap()),
            ..ConnectorConfig::default()
        };

        let err = config(json!({"ttl": 100})).into_settings().unwrap_err();
        assert!(err.to_string().contains("\"cache.model\" setting is required"));

        let err = config(json!({"model": "Cache"})).into_settings().unwrap_err();
        assert!(err.to_string().contains("\"cache.ttl\" setting is required"));

        let err = config(json!({"model": "Cache", "ttl": 0})).into_settings().unwrap_err();
        assert!(err.to_string().contains("must be a positive number"));
    }

    #[test]
    fn test_spec_must_be_location_or_object() {
        let config = ConnectorConfig {
            spec: Some(json!(42)),
            ..ConnectorConfig::default()
        };
        assert!(matches!(
            config.into_settings(),
            Err(ConnectorError::SpecResolution(_))
        ));
    }

    #[test]
    fn test_settings_validate() {
        let mut settings = ConnectorSettings::with_spec("petstore.json");
        assert!(settings.validate().is_ok());

        settings.cache = Some(CacheSettings::new(
            CacheModel::Named("Cache".to_string()),
            Duration::ZERO,
        ));
        assert!(settings.validate().is_err());
    }
}
