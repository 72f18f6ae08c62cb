//! Where a specification comes from

use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::{ParseResult, SpecError};

/// A specification source: remote URL, local file or an in-memory document
#[derive(Debug, Clone, PartialEq)]
pub enum SpecSource {
    /// Fetched over HTTP(S)
    Url(String),
    /// Local `.json`, `.yaml` or `.yml` file
    File(PathBuf),
    /// Already parsed specification object
    Document(Value),
}

impl SpecSource {
    /// Interpret a location string as a URL or a file path
    pub fn from_location(location: &str) -> Self {
        if is_url(location) {
            SpecSource::Url(location.to_string())
        } else {
            SpecSource::File(PathBuf::from(location))
        }
    }

    /// Build a source from an untyped configuration value.
    ///
    /// Strings are locations, objects are documents; every other JSON type
    /// is rejected.
    pub fn from_value(value: Value) -> ParseResult<Self> {
        match value {
            Value::String(location) => Ok(Self::from_location(&location)),
            Value::Object(_) => Ok(SpecSource::Document(value)),
            other => Err(SpecError::InvalidSpecType(json_type_name(&other).to_string())),
        }
    }

    /// Location string used to resolve relative references
    pub fn location(&self) -> Option<String> {
        match self {
            SpecSource::Url(url) => Some(url.clone()),
            SpecSource::File(path) => Some(path.to_string_lossy().into_owned()),
            SpecSource::Document(_) => None,
        }
    }
}

impl From<&str> for SpecSource {
    fn from(location: &str) -> Self {
        SpecSource::from_location(location)
    }
}

impl From<Value> for SpecSource {
    fn from(document: Value) -> Self {
        SpecSource::Document(document)
    }
}

impl std::fmt::Display for SpecSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpecSource::Url(url) => write!(f, "{}", url),
            SpecSource::File(path) => write!(f, "{}", path.display()),
            SpecSource::Document(_) => write!(f, "<in-memory document>"),
        }
    }
}

/// Content format of a spec file, derived from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
    Json,
    Yaml,
}

impl SpecFormat {
    pub fn from_path(path: &Path) -> ParseResult<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(SpecFormat::Json),
            Some("yaml") | Some("yml") => Ok(SpecFormat::Yaml),
            _ => Err(SpecError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

pub(crate) fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
