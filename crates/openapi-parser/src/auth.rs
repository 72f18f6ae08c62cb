//! Security schemes and how configured authorizations are applied

use base64::{engine::general_purpose::STANDARD, Engine as _};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::*;

/// OAuth2 token as handed to the connector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// A configured credential, keyed by security scheme name in the settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Authorization {
    /// HTTP basic credentials
    Basic { username: String, password: String },
    /// OAuth2 / OpenID Connect token
    OAuth2 { token: OAuthToken },
    /// API key, bearer token or pre-encoded basic credentials
    Value(String),
}

/// Where a credential ends up in the outgoing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Header { name: String, value: String },
    Query { name: String, value: String },
    Cookie { name: String, value: String },
}

/// Authentication scheme of one security requirement
#[derive(Debug, Clone)]
pub enum AuthScheme {
    /// Bearer token (Authorization: Bearer <token>)
    Bearer,
    /// API key in header, query, or cookie
    ApiKey {
        name: String,
        location: ApiKeyLocation,
    },
    /// Basic authentication
    Basic,
    /// OAuth2 / OpenID Connect access token
    OAuth2,
}

impl AuthScheme {
    /// Convert a security scheme to an auth scheme
    pub fn from_scheme(scheme: &SecurityScheme) -> Self {
        match scheme {
            SecurityScheme::ApiKey { name, location } => AuthScheme::ApiKey {
                name: name.clone(),
                location: *location,
            },
            SecurityScheme::Http { scheme, .. } => match scheme.to_lowercase().as_str() {
                "basic" => AuthScheme::Basic,
                _ => AuthScheme::Bearer,
            },
            SecurityScheme::OAuth2 | SecurityScheme::OpenIdConnect { .. } => AuthScheme::OAuth2,
        }
    }

    /// Turn a configured authorization into a request credential.
    ///
    /// Returns `None` when the authorization does not fit the scheme.
    pub fn credential(&self, authorization: &Authorization) -> Option<Credential> {
        match (self, authorization) {
            (AuthScheme::ApiKey { name, location }, Authorization::Value(value)) => {
                let (name, value) = (name.clone(), value.clone());
                Some(match location {
                    ApiKeyLocation::Header => Credential::Header { name, value },
                    ApiKeyLocation::Query => Credential::Query { name, value },
                    ApiKeyLocation::Cookie => Credential::Cookie { name, value },
                })
            }
            (AuthScheme::Basic, Authorization::Basic { username, password }) => {
                let encoded = STANDARD.encode(format!("{}:{}", username, password));
                Some(authorization_header(format!("Basic {}", encoded)))
            }
            (AuthScheme::Basic, Authorization::Value(encoded)) => {
                Some(authorization_header(format!("Basic {}", encoded)))
            }
            (AuthScheme::Bearer | AuthScheme::OAuth2, Authorization::Value(token)) => {
                Some(authorization_header(format!("Bearer {}", token)))
            }
            (AuthScheme::OAuth2 | AuthScheme::Bearer, Authorization::OAuth2 { token }) => {
                let token_type = token.token_type.as_deref().unwrap_or("Bearer");
                Some(authorization_header(format!("{} {}", token_type, token.access_token)))
            }
            _ => None,
        }
    }
}

fn authorization_header(value: String) -> Credential {
    Credential::Header {
        name: "Authorization".to_string(),
        value,
    }
}

/// Credentials for every security requirement of `operation` that has a
/// configured authorization
pub fn credentials_for(
    operation: &ApiOperation,
    spec: &ParsedSpec,
    authorizations: &IndexMap<String, Authorization>,
) -> Vec<Credential> {
    let mut credentials = Vec::new();

    for requirement in &operation.security {
        let (Some(scheme), Some(authorization)) = (
            spec.security_schemes.get(&requirement.scheme_name),
            authorizations.get(&requirement.scheme_name),
        ) else {
            continue;
        };

        match AuthScheme::from_scheme(scheme).credential(authorization) {
            Some(credential) if !credentials.contains(&credential) => credentials.push(credential),
            Some(_) => {}
            None => debug!(
                "Authorization for {} does not match its security scheme",
                requirement.scheme_name
            ),
        }
    }

    credentials
}
