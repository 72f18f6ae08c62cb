//! Document parsing and conversion into the parsed spec view

use crate::error::ParseResult;
use crate::operations::OperationExtractor;
use crate::types::*;
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

static LARGE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(\s*(?:minimum|maximum|exclusiveMinimum|exclusiveMaximum):\s*)(-?\d{16,})")
        .expect("Regex pattern is hardcoded and valid")
});

/// Swagger 2.0 / OpenAPI 3.x parser
pub struct OpenApiParser;

impl OpenApiParser {
    /// Parse a document from a string (auto-detects JSON/YAML)
    pub fn parse_document(content: &str) -> ParseResult<Value> {
        if content.trim_start().starts_with('{') {
            Self::parse_json(content)
        } else {
            Self::parse_yaml(content)
        }
    }

    /// Parse a document from JSON
    pub fn parse_json(content: &str) -> ParseResult<Value> {
        Ok(serde_json::from_str(content)?)
    }

    /// Parse a document from YAML
    pub fn parse_yaml(content: &str) -> ParseResult<Value> {
        let content = Self::sanitize_large_numbers(content);
        // Going through serde_yaml::Value lets non-string keys such as
        // unquoted response codes become JSON object keys.
        let yaml: serde_yaml::Value = serde_yaml::from_str(&content)?;
        Ok(serde_json::to_value(yaml)?)
    }

    /// Clamp integer constraints outside the i64/u64 range, which the YAML
    /// parser rejects. Values it can represent are left untouched.
    fn sanitize_large_numbers(content: &str) -> String {
        LARGE_NUMBER
            .replace_all(content, |caps: &regex::Captures| {
                let (prefix, number) = (&caps[1], &caps[2]);
                let negative = number.starts_with('-');
                let representable = if negative {
                    number.parse::<i64>().is_ok()
                } else {
                    number.parse::<u64>().is_ok()
                };
                match (representable, negative) {
                    (true, _) => format!("{}{}", prefix, number),
                    (false, true) => format!("{}{}", prefix, i64::MIN),
                    (false, false) => format!("{}{}", prefix, u64::MAX),
                }
            })
            .into_owned()
    }

    /// Convert a dereferenced document into the parsed spec view
    pub fn convert(document: &Value, dialect: Dialect) -> ParseResult<ParsedSpec> {
        let raw: RawSpec = serde_json::from_value(document.clone())?;

        debug!(
            "Parsing {:?} spec: {}",
            dialect,
            raw.info.title
        );

        let operations = OperationExtractor::extract(&raw, dialect)?;

        debug!("Extracted {} operations", operations.len());

        let raw_schemes = match dialect {
            Dialect::SwaggerV2 => Some(&raw.security_definitions),
            Dialect::OpenApi3 => raw.components.as_ref().map(|c| &c.security_schemes),
        };
        let security_schemes = raw_schemes
            .map(Self::convert_security_schemes)
            .unwrap_or_default();

        let global_security = raw
            .security
            .iter()
            .flat_map(|req| {
                req.iter().map(|(name, scopes)| SecurityRequirement {
                    scheme_name: name.clone(),
                    scopes: scopes.clone(),
                })
            })
            .collect();

        let servers = match dialect {
            Dialect::SwaggerV2 => Self::swagger2_servers(&raw),
            Dialect::OpenApi3 => raw
                .servers
                .iter()
                .map(|s| ServerInfo {
                    url: s.url.clone(),
                    description: s.description.clone(),
                })
                .collect(),
        };

        Ok(ParsedSpec {
            dialect,
            title: raw.info.title,
            description: raw.info.description,
            version: raw.info.version,
            servers,
            operations,
            security_schemes,
            global_security,
        })
    }

    /// Swagger 2.0 has no `servers`; one is derived per declared scheme
    fn swagger2_servers(raw: &RawSpec) -> Vec<ServerInfo> {
        let base_path = raw.base_path.clone().unwrap_or_default();
        match &raw.host {
            Some(host) if raw.schemes.is_empty() => vec![ServerInfo {
                url: format!("//{}{}", host, base_path),
                description: None,
            }],
            Some(host) => raw
                .schemes
                .iter()
                .map(|scheme| ServerInfo {
                    url: format!("{}://{}{}", scheme, host, base_path),
                    description: None,
                })
                .collect(),
            None if base_path.is_empty() => Vec::new(),
            None => vec![ServerInfo {
                url: base_path,
                description: None,
            }],
        }
    }

    fn convert_security_schemes(
        raw: &IndexMap<String, RawSecurityScheme>,
    ) -> HashMap<String, SecurityScheme> {
        raw.iter()
            .filter_map(|(name, scheme)| {
                Self::convert_security_scheme(scheme).map(|s| (name.clone(), s))
            })
            .collect()
    }

    fn convert_security_scheme(raw: &RawSecurityScheme) -> Option<SecurityScheme> {
        match raw.scheme_type.as_str() {
            "apiKey" => Some(SecurityScheme::ApiKey {
                name: raw.name.clone().unwrap_or_default(),
                location: match raw.location.as_deref() {
                    Some("query") => ApiKeyLocation::Query,
                    Some("cookie") => ApiKeyLocation::Cookie,
                    _ => ApiKeyLocation::Header,
                },
            }),
            // Swagger 2.0 spelling of HTTP basic
            "basic" => Some(SecurityScheme::Http {
                scheme: "basic".to_string(),
                bearer_format: None,
            }),
            "http" => Some(SecurityScheme::Http {
                scheme: raw.scheme.clone().unwrap_or_else(|| "bearer".to_string()),
                bearer_format: raw.bearer_format.clone(),
            }),
            "oauth2" => Some(SecurityScheme::OAuth2),
            "openIdConnect" => Some(SecurityScheme::OpenIdConnect {
                openid_connect_url: raw.openid_connect_url.clone().unwrap_or_default(),
            }),
            _ => None,
        }
    }
}
