//! HTTP request and response records
//!
//! These are the values observers see and rewrite, and what the response
//! cache stores. They are transport independent.

use indexmap::IndexMap;
use openapi_parser::HttpMethod;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An outgoing request, fully built from the operation and arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Headers in insertion order
    pub headers: IndexMap<String, String>,
    /// Serialized request body
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: IndexMap::new(),
            body: None,
        }
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Set a header, replacing any existing value regardless of case
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
    }
}

/// A received (or cached) response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    /// Header names are lower-cased
    pub headers: IndexMap<String, String>,
    /// Raw response text
    pub text: String,
    /// Parsed body: JSON when the content type says so, otherwise the text
    pub body: Value,
}

impl HttpResponse {
    pub fn new(
        url: impl Into<String>,
        status: u16,
        status_text: impl Into<String>,
        headers: IndexMap<String, String>,
        text: impl Into<String>,
    ) -> Self {
        let headers: IndexMap<String, String> = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();
        let text = text.into();
        let body = parse_body(find_header(&headers, "content-type"), &text);

        Self {
            url: url.into(),
            status,
            status_text: status_text.into(),
            headers,
            text,
            body,
        }
    }

    /// 2xx status
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a IndexMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn parse_body(content_type: Option<&str>, text: &str) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    let is_json = content_type.is_some_and(|ct| ct.contains("json"));
    if is_json {
        if let Ok(parsed) = serde_json::from_str(text) {
            return parsed;
        }
    }
    Value::String(text.to_string())
}
