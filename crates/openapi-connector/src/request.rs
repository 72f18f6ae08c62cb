//! Building HTTP requests from an operation and bound arguments

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use connector_core::{ConnectorError, HttpRequest, Result};
use openapi_parser::{
    credentials_for, ApiOperation, Authorization, CollectionFormat, Credential, OperationParameter,
    ParameterLocation, ParsedSpec,
};

use crate::binder::BoundCall;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const JSON: &str = "application/json";

/// Turns bound calls into [`HttpRequest`]s for one specification
pub struct RequestBuilder<'a> {
    spec: &'a ParsedSpec,
    /// Base URL that relative server URLs are resolved against
    location: Option<&'a str>,
    authorizations: &'a IndexMap<String, Authorization>,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(
        spec: &'a ParsedSpec,
        location: Option<&'a str>,
        authorizations: &'a IndexMap<String, Authorization>,
    ) -> Self {
        Self {
            spec,
            location,
            authorizations,
        }
    }

    pub fn build(&self, operation: &ApiOperation, call: &BoundCall) -> Result<HttpRequest> {
        let params = &call.params;
        let options = &call.options;

        let mut path = operation.path.clone();
        let mut query: Vec<(String, String)> = Vec::new();
        let mut headers: Vec<(String, String)> = Vec::new();
        let mut cookies: Vec<(String, String)> = Vec::new();
        let mut form: Vec<(String, String)> = Vec::new();
        let mut body: Option<String> = None;

        for param in &operation.parameters {
            let Some(value) = argument(param, params)? else {
                continue;
            };

            match param.location {
                ParameterLocation::Path => {
                    let encoded = urlencoding::encode(&join_values(param, &value)).into_owned();
                    path = path.replace(&format!("{{{}}}", param.name), &encoded);
                }
                ParameterLocation::Query => match (&value, param.collection_format) {
                    (Value::Array(items), CollectionFormat::Multi) => {
                        for item in items {
                            query.push((param.name.clone(), scalar(item)));
                        }
                    }
                    _ => query.push((param.name.clone(), join_values(param, &value))),
                },
                ParameterLocation::Header => headers.push((param.name.clone(), join_values(param, &value))),
                ParameterLocation::Cookie => cookies.push((param.name.clone(), join_values(param, &value))),
                ParameterLocation::FormData => form.push((param.name.clone(), join_values(param, &value))),
                ParameterLocation::Body => {
                    body = Some(match value {
                        Value::String(text) => text,
                        other => serde_json::to_string(&other)?,
                    });
                }
            }
        }

        let mut content_type = None;
        if self.spec.dialect.is_swagger2() {
            if body.is_some() || !form.is_empty() {
                content_type = options
                    .request_content_type
                    .clone()
                    .or_else(|| operation.consumes.first().cloned())
                    .or_else(|| Some(if body.is_some() { JSON } else { FORM_URLENCODED }.to_string()));
            }
            if body.is_none() && !form.is_empty() {
                body = Some(encode_form(&form));
            }
        } else if let (Some(declared), Some(value)) = (&operation.request_body, &options.request_body) {
            let media = options
                .request_content_type
                .clone()
                .filter(|ct| declared.content_types.contains(ct))
                .or_else(|| declared.content_types.first().cloned())
                .unwrap_or_else(|| JSON.to_string());
            body = Some(encode_request_body(&media, value)?);
            content_type = Some(media);
        }

        for credential in credentials_for(operation, self.spec, self.authorizations) {
            match credential {
                Credential::Header { name, value } => headers.push((name, value)),
                Credential::Query { name, value } => query.push((name, value)),
                Credential::Cookie { name, value } => cookies.push((name, value)),
            }
        }

        let base = self.server_url(options.server.as_deref());
        let mut url = format!("{}{}", base.trim_end_matches('/'), path);
        if !query.is_empty() {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query.iter())
                .finish();
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&encoded);
        }

        let mut request = HttpRequest::new(operation.method, url);
        for (name, value) in headers {
            request.set_header(name, value);
        }
        if !cookies.is_empty() {
            let cookie = cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; ");
            request.set_header("Cookie", cookie);
        }
        if let Some(content_type) = content_type {
            request.set_header("Content-Type", content_type);
        }
        if let Some(accept) = &options.response_content_type {
            request.set_header("Accept", accept.clone());
        }
        request.body = body;

        debug!("Built {} {}", request.method, request.url);
        Ok(request)
    }

    /// Per-call server, then the `url` setting, then the first declared server
    fn server_url(&self, server: Option<&str>) -> String {
        let declared = server
            .or_else(|| self.spec.servers.first().map(|s| s.url.as_str()))
            .unwrap_or("");

        if declared.contains("://") {
            return declared.to_string();
        }

        if let Some(base) = self.location.and_then(|l| url::Url::parse(l).ok()) {
            if let Ok(joined) = base.join(if declared.is_empty() { "/" } else { declared }) {
                return joined.to_string();
            }
        }

        match declared.strip_prefix("//") {
            Some(rest) => format!("http://{}", rest),
            None => declared.to_string(),
        }
    }
}

/// The argument for `param`, falling back to its schema default
fn argument(param: &OperationParameter, params: &Map<String, Value>) -> Result<Option<Value>> {
    if let Some(value) = params.get(&param.name).filter(|v| !v.is_null()) {
        return Ok(Some(value.clone()));
    }
    if let Some(default) = param
        .schema
        .as_ref()
        .and_then(|schema| schema.get("default"))
    {
        return Ok(Some(default.clone()));
    }
    if param.required && param.location != ParameterLocation::Body {
        return Err(ConnectorError::InvalidArguments(format!(
            "Required parameter {} is not provided",
            param.name
        )));
    }
    Ok(None)
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn join_values(param: &OperationParameter, value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .map(scalar)
            .collect::<Vec<_>>()
            .join(param.collection_format.separator()),
        other => scalar(other),
    }
}

fn encode_form(pairs: &[(String, String)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter())
        .finish()
}

fn encode_request_body(media: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Object(fields) if media == FORM_URLENCODED || media.starts_with("multipart/") => {
            let pairs: Vec<(String, String)> = fields
                .iter()
                .map(|(name, value)| (name.clone(), scalar(value)))
                .collect();
            Ok(encode_form(&pairs))
        }
        other => Ok(serde_json::to_string(other)?),
    }
}
