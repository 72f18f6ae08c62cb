//! Type definitions for resolved Swagger / OpenAPI specs

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{ParseResult, SpecError};

/// Specification dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    /// `swagger: "2.0"`, body declared as an `in: body` parameter
    SwaggerV2,
    /// `openapi: "3.x"`, body declared as a separate `requestBody`
    OpenApi3,
}

impl Dialect {
    /// Detect the dialect from the top-level version marker
    pub fn detect(document: &Value) -> ParseResult<Self> {
        if let Some(version) = document.get("swagger") {
            return match version.as_str() {
                Some("2.0") => Ok(Dialect::SwaggerV2),
                _ => Err(SpecError::UnsupportedVersion(format!("swagger: {}", version))),
            };
        }

        match document.get("openapi") {
            Some(Value::String(v)) if v.starts_with("3.") => Ok(Dialect::OpenApi3),
            Some(other) => Err(SpecError::UnsupportedVersion(format!("openapi: {}", other))),
            None => Err(SpecError::UnsupportedVersion(
                "missing `swagger` or `openapi` version field".to_string(),
            )),
        }
    }

    pub fn is_swagger2(&self) -> bool {
        matches!(self, Dialect::SwaggerV2)
    }
}

/// HTTP methods supported by OpenAPI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
}

impl HttpMethod {
    /// All methods in the order they are scanned within a path item
    pub const ALL: [HttpMethod; 8] = [
        HttpMethod::Get,
        HttpMethod::Put,
        HttpMethod::Post,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Head,
        HttpMethod::Patch,
        HttpMethod::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
        }
    }

    /// Key used for this method inside a path item
    pub fn key(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Patch => "patch",
            HttpMethod::Delete => "delete",
            HttpMethod::Head => "head",
            HttpMethod::Options => "options",
            HttpMethod::Trace => "trace",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.key().eq_ignore_ascii_case(key))
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parameter location in HTTP request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
    Body,
    FormData,
}

impl ParameterLocation {
    pub fn parse(location: &str) -> Option<Self> {
        match location {
            "path" => Some(ParameterLocation::Path),
            "query" => Some(ParameterLocation::Query),
            "header" => Some(ParameterLocation::Header),
            "cookie" => Some(ParameterLocation::Cookie),
            "body" => Some(ParameterLocation::Body),
            "formData" => Some(ParameterLocation::FormData),
            _ => None,
        }
    }
}

/// How array values of a parameter are serialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollectionFormat {
    #[default]
    Csv,
    Ssv,
    Tsv,
    Pipes,
    Multi,
}

impl CollectionFormat {
    /// Separator used when values are joined into one string
    pub fn separator(&self) -> &'static str {
        match self {
            CollectionFormat::Csv | CollectionFormat::Multi => ",",
            CollectionFormat::Ssv => " ",
            CollectionFormat::Tsv => "\t",
            CollectionFormat::Pipes => "|",
        }
    }
}

/// A parameter for an API operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationParameter {
    /// Parameter name
    pub name: String,
    /// Where the parameter is located
    pub location: ParameterLocation,
    /// Whether the parameter is required
    pub required: bool,
    /// Parameter description
    pub description: Option<String>,
    /// JSON Schema for the parameter
    pub schema: Option<Value>,
    /// Array serialization
    pub collection_format: CollectionFormat,
}

/// OpenAPI 3.x request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBody {
    /// Whether the body is required
    pub required: bool,
    /// Declared content types, in document order
    pub content_types: Vec<String>,
    /// JSON Schema of the preferred (JSON if any) content type
    pub schema: Option<Value>,
    /// Description
    pub description: Option<String>,
}

impl RequestBody {
    pub fn accepts_json(&self) -> bool {
        self.content_types.iter().any(|ct| ct == "application/json")
    }
}

/// A single API operation extracted from the spec
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiOperation {
    /// Operation ID from the spec, or synthesized from method and path
    pub operation_id: String,
    /// Identifier used by the low-level execute path (non-word characters escaped)
    pub client_id: String,
    /// `x-operation-name` extension
    pub operation_name: Option<String>,
    /// HTTP method
    pub method: HttpMethod,
    /// URL path (e.g., "/pet/{petId}")
    pub path: String,
    /// Short summary
    pub summary: Option<String>,
    /// Full description
    pub description: Option<String>,
    /// Tags for grouping
    pub tags: Vec<String>,
    /// Whether the operation is deprecated
    pub deprecated: bool,
    /// Parameters in declaration order (path-level merged with operation-level)
    pub parameters: Vec<OperationParameter>,
    /// Request body (OpenAPI 3.x)
    pub request_body: Option<RequestBody>,
    /// Accepted request content types (Swagger 2.0 `consumes`, OpenAPI 3.x body content)
    pub consumes: Vec<String>,
    /// Response content types
    pub produces: Vec<String>,
    /// Security requirements for this operation
    pub security: Vec<SecurityRequirement>,
    /// The operation object as found in the resolved document
    pub raw: Value,
}

impl ApiOperation {
    /// The `in: body` parameter, if any
    pub fn body_parameter(&self) -> Option<&OperationParameter> {
        self.parameters
            .iter()
            .find(|p| p.location == ParameterLocation::Body)
    }

    pub fn accepts_json(&self) -> bool {
        self.consumes.iter().any(|ct| ct == "application/json")
    }
}

/// Security requirement for an operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityRequirement {
    /// Name of the security scheme
    pub scheme_name: String,
    /// Required scopes (for OAuth2)
    pub scopes: Vec<String>,
}

/// Parsed view of a resolved specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedSpec {
    /// Spec dialect
    pub dialect: Dialect,
    /// API title
    pub title: String,
    /// API description
    pub description: Option<String>,
    /// API version
    pub version: String,
    /// Server URLs (for Swagger 2.0 derived from schemes, host and basePath)
    pub servers: Vec<ServerInfo>,
    /// All extracted operations in document order
    pub operations: Vec<ApiOperation>,
    /// Security schemes defined in the spec
    pub security_schemes: HashMap<String, SecurityScheme>,
    /// Global security requirements
    pub global_security: Vec<SecurityRequirement>,
}

impl ParsedSpec {
    /// First operation, in document order, whose operation id or escaped
    /// client id equals `id`
    pub fn find_operation(&self, id: &str) -> Option<&ApiOperation> {
        self.operations
            .iter()
            .find(|op| op.operation_id == id || op.client_id == id)
    }
}

/// Server information from the spec
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server URL, possibly relative to the spec location
    pub url: String,
    /// Server description
    pub description: Option<String>,
}

/// Security scheme definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SecurityScheme {
    /// API key authentication
    ApiKey {
        name: String,
        #[serde(rename = "in")]
        location: ApiKeyLocation,
    },
    /// HTTP authentication (bearer, basic)
    Http {
        scheme: String,
        bearer_format: Option<String>,
    },
    /// OAuth2 authentication
    OAuth2,
    /// OpenID Connect
    OpenIdConnect { openid_connect_url: String },
}

/// API key location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    Header,
    Query,
    Cookie,
}

// --- Raw structures, shared by both dialects ---

/// Raw Swagger 2.0 / OpenAPI 3.x document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSpec {
    pub swagger: Option<String>,
    pub openapi: Option<String>,
    #[serde(default)]
    pub info: RawInfo,
    pub host: Option<String>,
    pub base_path: Option<String>,
    #[serde(default)]
    pub schemes: Vec<String>,
    #[serde(default)]
    pub consumes: Vec<String>,
    #[serde(default)]
    pub produces: Vec<String>,
    #[serde(default)]
    pub servers: Vec<RawServer>,
    /// Path items, kept raw because the paths object may carry `x-` extensions
    #[serde(default)]
    pub paths: IndexMap<String, Value>,
    #[serde(default)]
    pub components: Option<RawComponents>,
    #[serde(default)]
    pub security_definitions: IndexMap<String, RawSecurityScheme>,
    #[serde(default)]
    pub security: Vec<IndexMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawInfo {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawServer {
    pub url: String,
    pub description: Option<String>,
}

/// Path item; method entries are kept as raw values so the original
/// operation object stays available to naming policies and transforms
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPathItem {
    #[serde(default)]
    pub parameters: Vec<RawParameter>,
    #[serde(flatten)]
    pub entries: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOperation {
    pub operation_id: Option<String>,
    #[serde(rename = "x-operation-name")]
    pub operation_name: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub parameters: Vec<RawParameter>,
    pub request_body: Option<RawRequestBody>,
    pub consumes: Option<Vec<String>>,
    pub produces: Option<Vec<String>>,
    #[serde(default)]
    pub responses: IndexMap<String, Value>,
    #[serde(default)]
    pub security: Option<Vec<IndexMap<String, Vec<String>>>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawParameter {
    /// Parameter name (empty when an unresolved $ref is left in place)
    #[serde(default)]
    pub name: String,
    #[serde(rename = "in", default)]
    pub location: String,
    #[serde(default)]
    pub required: bool,
    pub description: Option<String>,
    pub schema: Option<Value>,
    /// Swagger 2.0 non-body parameters describe their type inline
    #[serde(rename = "type")]
    pub param_type: Option<String>,
    pub format: Option<String>,
    pub items: Option<Value>,
    #[serde(rename = "enum")]
    pub enum_values: Option<Vec<Value>>,
    pub default: Option<Value>,
    pub collection_format: Option<String>,
    pub style: Option<String>,
    pub explode: Option<bool>,
    /// Circular reference left unresolved
    #[serde(rename = "$ref")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRequestBody {
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub content: IndexMap<String, RawMediaType>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMediaType {
    pub schema: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawResponse {
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<IndexMap<String, RawMediaType>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawComponents {
    #[serde(default)]
    pub security_schemes: IndexMap<String, RawSecurityScheme>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSecurityScheme {
    #[serde(rename = "type")]
    pub scheme_type: String,
    pub name: Option<String>,
    #[serde(rename = "in")]
    pub location: Option<String>,
    pub scheme: Option<String>,
    pub bearer_format: Option<String>,
    pub openid_connect_url: Option<String>,
}
