//! Binding call arguments to operation parameters

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use connector_core::{ConnectorError, Positional, Result};
use openapi_parser::{ApiOperation, Dialect, ParameterLocation};

/// Name of the trailing body slot of OpenAPI 3.0 operations
pub const REQUEST_BODY: &str = "requestBody";

/// Per-call options, the second argument of a named call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallOptions {
    /// Content type of the request body
    pub request_content_type: Option<String>,
    /// Sent as `Accept`
    pub response_content_type: Option<String>,
    /// OpenAPI 3.0 request body
    pub request_body: Option<Value>,
    /// Server URL overriding the configured one
    pub server: Option<String>,
}

/// Arguments of a generated method call
#[derive(Debug, Clone)]
pub enum CallArgs {
    /// Parameters by name, plus call options
    Named {
        params: Map<String, Value>,
        options: CallOptions,
    },
    /// One value per declared argument, optionally followed by an options object
    Positional(Vec<Value>),
}

impl CallArgs {
    /// Named parameters from a JSON object; anything else counts as no parameters
    pub fn named(params: Value) -> Self {
        Self::named_with(params, CallOptions::default())
    }

    pub fn named_with(params: Value, options: CallOptions) -> Self {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        CallArgs::Named { params, options }
    }

    pub fn positional(values: Vec<Value>) -> Self {
        CallArgs::Positional(values)
    }
}

impl Default for CallArgs {
    fn default() -> Self {
        CallArgs::Named {
            params: Map::new(),
            options: CallOptions::default(),
        }
    }
}

/// Parameters and options after binding, ready for the request builder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundCall {
    pub params: Map<String, Value>,
    pub options: CallOptions,
}

/// Maps call arguments onto one operation's parameters
#[derive(Debug, Clone)]
pub struct ArgumentBinder {
    dialect: Dialect,
    positional: Positional,
    arg_names: Vec<String>,
    /// Swagger 2.0 `in: body` parameter name
    body_name: Option<String>,
    /// JSON bodies are sent as serialized text
    json_body: bool,
    has_request_body: bool,
}

impl ArgumentBinder {
    pub fn new(operation: &ApiOperation, dialect: Dialect, positional: Positional) -> Self {
        let swagger2 = dialect.is_swagger2();
        let moved_last = |location: ParameterLocation| {
            swagger2 && positional == Positional::BodyLast && location == ParameterLocation::Body
        };

        let mut arg_names: Vec<String> = operation
            .parameters
            .iter()
            .filter(|p| !moved_last(p.location))
            .map(|p| p.name.clone())
            .collect();

        let body_name = operation.body_parameter().map(|p| p.name.clone());
        let has_request_body = !swagger2 && operation.request_body.is_some();

        if swagger2 {
            if let Some(body) = operation.parameters.iter().find(|p| moved_last(p.location)) {
                arg_names.push(body.name.clone());
            }
        } else if has_request_body {
            arg_names.push(REQUEST_BODY.to_string());
        }

        let json_body = if swagger2 {
            operation.consumes.is_empty() || operation.accepts_json()
        } else {
            operation
                .request_body
                .as_ref()
                .is_some_and(|body| body.accepts_json())
        };

        Self {
            dialect,
            positional,
            arg_names,
            body_name: if swagger2 { body_name } else { None },
            json_body,
            has_request_body,
        }
    }

    /// Declared argument order for positional calls
    pub fn arg_names(&self) -> &[String] {
        &self.arg_names
    }

    pub fn bind(&self, args: CallArgs) -> Result<BoundCall> {
        let mut call = match (self.positional.is_positional(), args) {
            (_, CallArgs::Named { params, options }) => BoundCall { params, options },
            (true, CallArgs::Positional(values)) => self.bind_positional(values)?,
            (false, CallArgs::Positional(_)) => {
                return Err(ConnectorError::InvalidArguments(
                    "positional arguments require the `positional` setting".to_string(),
                ))
            }
        };

        self.normalize_body(&mut call)?;
        Ok(call)
    }

    fn bind_positional(&self, values: Vec<Value>) -> Result<BoundCall> {
        let count = self.arg_names.len();
        if values.len() > count + 1 {
            debug!("Ignoring {} extra positional arguments", values.len() - count - 1);
        }

        let options = match values.get(count) {
            Some(value @ Value::Object(_)) => serde_json::from_value(value.clone())
                .map_err(|e| ConnectorError::InvalidArguments(format!("invalid call options: {}", e)))?,
            _ => CallOptions::default(),
        };

        let mut call = BoundCall {
            params: Map::new(),
            options,
        };

        for (index, name) in self.arg_names.iter().enumerate() {
            let trailing_request_body =
                !self.dialect.is_swagger2() && index + 1 == count && name == REQUEST_BODY;
            if name.is_empty() || trailing_request_body {
                continue;
            }
            if let Some(value) = values.get(index).filter(|v| !v.is_null()) {
                call.params.insert(name.clone(), value.clone());
            }
        }

        if self.has_request_body {
            call.options.request_body = count
                .checked_sub(1)
                .and_then(|last| values.get(last))
                .filter(|v| !v.is_null())
                .cloned();
        }

        Ok(call)
    }

    /// Serialize JSON bodies to text so they go over the wire unchanged
    fn normalize_body(&self, call: &mut BoundCall) -> Result<()> {
        let json_requested = call.options.request_content_type.as_deref() == Some("application/json");
        if !(json_requested || self.json_body) {
            return Ok(());
        }

        if let Some(name) = &self.body_name {
            if let Some(value) = call.params.get_mut(name).filter(|v| !v.is_null()) {
                *value = Value::String(serde_json::to_string(value)?);
            }
        }

        if !self.dialect.is_swagger2() {
            if let Some(body) = call.options.request_body.as_mut().filter(|v| !v.is_null()) {
                *body = Value::String(serde_json::to_string(body)?);
            }
        }

        Ok(())
    }
}
