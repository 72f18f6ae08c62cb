//! `$ref` dereferencing for whole documents

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use crate::error::{ParseResult, SpecError};
use crate::source::is_url;

/// Replaces `$ref` objects with their targets.
///
/// Internal references (`#/...`) point into the document they appear in;
/// anything before `#` names another document relative to the current one.
/// External documents must be preloaded into `documents`, keyed by the
/// location returned from [`join_location`]. A reference that is already
/// being expanded further up the stack is circular and is kept as is.
pub struct RefResolver<'a> {
    root: &'a Value,
    root_location: Option<&'a str>,
    documents: &'a HashMap<String, Value>,
}

impl<'a> RefResolver<'a> {
    pub fn new(
        root: &'a Value,
        root_location: Option<&'a str>,
        documents: &'a HashMap<String, Value>,
    ) -> Self {
        Self {
            root,
            root_location,
            documents,
        }
    }

    /// Produce a fully dereferenced copy of the root document
    pub fn resolve(&self) -> ParseResult<Value> {
        let mut stack = Vec::new();
        self.resolve_value(self.root, self.root_location, &mut stack)
    }

    fn resolve_value(
        &self,
        value: &Value,
        location: Option<&str>,
        stack: &mut Vec<String>,
    ) -> ParseResult<Value> {
        match value {
            Value::Object(obj) => {
                if let Some(Value::String(reference)) = obj.get("$ref") {
                    return self.resolve_ref(value, reference, location, stack);
                }

                let mut result = Map::new();
                for (key, item) in obj {
                    result.insert(key.clone(), self.resolve_value(item, location, stack)?);
                }
                Ok(Value::Object(result))
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve_value(item, location, stack))
                .collect::<ParseResult<Vec<_>>>()
                .map(Value::Array),
            _ => Ok(value.clone()),
        }
    }

    fn resolve_ref(
        &self,
        node: &Value,
        reference: &str,
        location: Option<&str>,
        stack: &mut Vec<String>,
    ) -> ParseResult<Value> {
        let (document_part, pointer) = split_reference(reference);

        let target_location = if document_part.is_empty() {
            location.map(str::to_string)
        } else {
            Some(join_location(location, document_part)?)
        };

        let key = format!("{}#{}", target_location.as_deref().unwrap_or(""), pointer);
        if stack.contains(&key) {
            return Ok(node.clone());
        }

        let document = match target_location.as_deref() {
            None => self.root,
            Some(loc) if Some(loc) == self.root_location => self.root,
            Some(loc) => self
                .documents
                .get(loc)
                .ok_or_else(|| SpecError::DereferenceError(format!("{} (document not loaded)", reference)))?,
        };

        // Fragments may be percent-encoded, e.g. `#/paths/~1pets~1%7Bid%7D`
        let pointer = urlencoding::decode(pointer)
            .map_err(|e| SpecError::DereferenceError(format!("{} ({})", reference, e)))?;
        let target = document
            .pointer(&pointer)
            .ok_or_else(|| SpecError::DereferenceError(reference.to_string()))?;

        stack.push(key);
        let resolved = self.resolve_value(target, target_location.as_deref(), stack);
        stack.pop();
        resolved
    }
}

/// Split `other.yaml#/a/b` into `("other.yaml", "/a/b")`
pub fn split_reference(reference: &str) -> (&str, &str) {
    match reference.split_once('#') {
        Some((document, pointer)) => (document, pointer),
        None => (reference, ""),
    }
}

/// Resolve `reference` (a URL or path, without fragment) against `base`
pub fn join_location(base: Option<&str>, reference: &str) -> ParseResult<String> {
    if is_url(reference) {
        return Ok(reference.to_string());
    }

    match base {
        Some(base) if is_url(base) => {
            let base = url::Url::parse(base).map_err(|e| SpecError::InvalidUrl(e.to_string()))?;
            base.join(reference)
                .map(|u| u.to_string())
                .map_err(|e| SpecError::InvalidUrl(e.to_string()))
        }
        Some(base) => {
            let dir = Path::new(base).parent().unwrap_or_else(|| Path::new(""));
            Ok(normalize_path(&dir.join(reference)))
        }
        None => Ok(normalize_path(Path::new(reference))),
    }
}

/// Locations of every external document referenced from `value`
pub fn external_locations(value: &Value, location: Option<&str>) -> ParseResult<Vec<String>> {
    let mut found = Vec::new();
    collect_external(value, location, &mut found)?;
    Ok(found)
}

fn collect_external(value: &Value, location: Option<&str>, found: &mut Vec<String>) -> ParseResult<()> {
    match value {
        Value::Object(obj) => {
            if let Some(Value::String(reference)) = obj.get("$ref") {
                let (document, _) = split_reference(reference);
                if !document.is_empty() {
                    let joined = join_location(location, document)?;
                    if !found.contains(&joined) {
                        found.push(joined);
                    }
                }
            }
            for item in obj.values() {
                collect_external(item, location, found)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_external(item, location, found)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn normalize_path(path: &Path) -> String {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized.to_string_lossy().into_owned()
}
