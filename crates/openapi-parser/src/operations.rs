//! Operation extraction from resolved specs

use crate::error::ParseResult;
use crate::types::*;
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use tracing::warn;

/// Extracts operations from raw spec structures
pub struct OperationExtractor;

impl OperationExtractor {
    /// Extract all operations, path by path, in document order
    pub fn extract(spec: &RawSpec, dialect: Dialect) -> ParseResult<Vec<ApiOperation>> {
        let mut operations = Vec::new();

        for (path, item) in &spec.paths {
            if path.starts_with("x-") || !item.is_object() {
                continue;
            }
            let path_item: RawPathItem = serde_json::from_value(item.clone())?;

            let path_params: Vec<OperationParameter> = path_item
                .parameters
                .iter()
                .filter_map(Self::convert_parameter)
                .collect();

            for (key, raw_op) in &path_item.entries {
                let Some(method) = HttpMethod::from_key(key) else {
                    continue;
                };
                if !raw_op.is_object() {
                    warn!("Skipping {} {}: operation is not an object", method, path);
                    continue;
                }
                let op: RawOperation = serde_json::from_value(raw_op.clone())?;
                operations.push(Self::extract_operation(
                    path,
                    method,
                    &op,
                    raw_op,
                    &path_params,
                    spec,
                    dialect,
                )?);
            }
        }

        Ok(operations)
    }

    /// Extract a single operation
    fn extract_operation(
        path: &str,
        method: HttpMethod,
        operation: &RawOperation,
        raw: &Value,
        path_params: &[OperationParameter],
        spec: &RawSpec,
        dialect: Dialect,
    ) -> ParseResult<ApiOperation> {
        let explicit_id = operation
            .operation_id
            .clone()
            .filter(|id| id.chars().any(|c| !c.is_whitespace()));

        let (operation_id, client_id) = match explicit_id {
            Some(id) => {
                let client_id = escape_identifier(&id);
                (id, client_id)
            }
            None => {
                let id = Self::generate_operation_id(path, method);
                (id.clone(), id)
            }
        };

        // Combine path-level and operation-level parameters
        let mut parameters = path_params.to_vec();
        for param in &operation.parameters {
            if let Some(p) = Self::convert_parameter(param) {
                parameters.retain(|existing| {
                    existing.name != p.name || existing.location != p.location
                });
                parameters.push(p);
            }
        }

        let request_body = match dialect {
            Dialect::OpenApi3 => operation
                .request_body
                .as_ref()
                .map(Self::extract_request_body),
            Dialect::SwaggerV2 => None,
        };

        let (consumes, produces) = match dialect {
            Dialect::SwaggerV2 => (
                operation.consumes.clone().unwrap_or_else(|| spec.consumes.clone()),
                operation.produces.clone().unwrap_or_else(|| spec.produces.clone()),
            ),
            Dialect::OpenApi3 => (
                request_body
                    .as_ref()
                    .map(|b| b.content_types.clone())
                    .unwrap_or_default(),
                Self::response_content_types(&operation.responses),
            ),
        };

        let security = Self::extract_security(operation.security.as_ref(), &spec.security);

        Ok(ApiOperation {
            operation_id,
            client_id,
            operation_name: operation.operation_name.clone(),
            method,
            path: path.to_string(),
            summary: operation.summary.clone(),
            description: operation.description.clone(),
            tags: operation.tags.clone(),
            deprecated: operation.deprecated,
            parameters,
            request_body,
            consumes,
            produces,
            security,
            raw: raw.clone(),
        })
    }

    /// Generate an operation ID from path and method: `GET /pet/{id}` -> `get_pet__id_`
    pub fn generate_operation_id(path: &str, method: HttpMethod) -> String {
        format!("{}{}", method.key(), escape_identifier(path))
    }

    /// Convert a raw parameter to our parameter type
    fn convert_parameter(param: &RawParameter) -> Option<OperationParameter> {
        // Circular references are left unresolved by the dereferencer
        if param.reference.is_some() {
            return None;
        }

        let location = ParameterLocation::parse(&param.location)?;

        let schema = param.schema.clone().or_else(|| Self::inline_schema(param));

        let collection_format = match param.collection_format.as_deref() {
            Some("multi") => CollectionFormat::Multi,
            Some("ssv") => CollectionFormat::Ssv,
            Some("tsv") => CollectionFormat::Tsv,
            Some("pipes") => CollectionFormat::Pipes,
            Some(_) => CollectionFormat::Csv,
            None => Self::style_collection_format(param, location),
        };

        Some(OperationParameter {
            name: param.name.clone(),
            location,
            required: param.required || location == ParameterLocation::Path,
            description: param.description.clone(),
            schema,
            collection_format,
        })
    }

    /// OpenAPI 3.x `style`/`explode` mapped onto the Swagger 2.0 vocabulary
    fn style_collection_format(param: &RawParameter, location: ParameterLocation) -> CollectionFormat {
        if param.collection_format.is_none() && param.param_type.is_some() {
            // Swagger 2.0 default
            return CollectionFormat::Csv;
        }
        match param.style.as_deref() {
            Some("spaceDelimited") => CollectionFormat::Ssv,
            Some("pipeDelimited") => CollectionFormat::Pipes,
            _ => {
                let form_style = matches!(
                    location,
                    ParameterLocation::Query | ParameterLocation::Cookie
                ) && matches!(param.style.as_deref(), None | Some("form"));
                if param.explode.unwrap_or(form_style) {
                    CollectionFormat::Multi
                } else {
                    CollectionFormat::Csv
                }
            }
        }
    }

    /// Swagger 2.0 non-body parameters carry their schema inline
    fn inline_schema(param: &RawParameter) -> Option<Value> {
        let param_type = param.param_type.as_ref()?;
        let mut schema = Map::new();
        schema.insert("type".to_string(), json!(param_type));
        if let Some(format) = &param.format {
            schema.insert("format".to_string(), json!(format));
        }
        if let Some(items) = &param.items {
            schema.insert("items".to_string(), items.clone());
        }
        if let Some(values) = &param.enum_values {
            schema.insert("enum".to_string(), json!(values));
        }
        if let Some(default) = &param.default {
            schema.insert("default".to_string(), default.clone());
        }
        Some(Value::Object(schema))
    }

    /// Extract request body information
    fn extract_request_body(body: &RawRequestBody) -> RequestBody {
        let content_types: Vec<String> = body.content.keys().cloned().collect();

        // Prefer JSON content type
        let schema = body
            .content
            .iter()
            .find(|(ct, _)| ct.contains("json"))
            .or_else(|| body.content.first())
            .and_then(|(_, media)| media.schema.clone());

        RequestBody {
            required: body.required,
            content_types,
            schema,
            description: body.description.clone(),
        }
    }

    /// Content types of the first successful response that declares any
    fn response_content_types(responses: &IndexMap<String, Value>) -> Vec<String> {
        responses
            .iter()
            .filter(|(status, _)| status.starts_with('2') || status.as_str() == "default")
            .filter_map(|(_, response)| {
                serde_json::from_value::<RawResponse>(response.clone()).ok()
            })
            .find_map(|response| {
                response
                    .content
                    .filter(|content| !content.is_empty())
                    .map(|content| content.keys().cloned().collect())
            })
            .unwrap_or_default()
    }

    /// Extract security requirements
    fn extract_security(
        operation_security: Option<&Vec<IndexMap<String, Vec<String>>>>,
        global_security: &[IndexMap<String, Vec<String>>],
    ) -> Vec<SecurityRequirement> {
        let security: &[IndexMap<String, Vec<String>>] = operation_security
            .map(|v| v.as_slice())
            .unwrap_or(global_security);

        security
            .iter()
            .flat_map(|req| {
                req.iter().map(|(name, scopes)| SecurityRequirement {
                    scheme_name: name.clone(),
                    scopes: scopes.clone(),
                })
            })
            .collect()
    }
}

/// Replace every non-word character with `_`
pub fn escape_identifier(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(document: Value) -> Vec<ApiOperation> {
        let dialect = Dialect::detect(&document).unwrap();
        let raw: RawSpec = serde_json::from_value(document).unwrap();
        OperationExtractor::extract(&raw, dialect).unwrap()
    }

    #[test]
    fn test_generate_operation_id() {
        assert_eq!(
            OperationExtractor::generate_operation_id("/ping", HttpMethod::Get),
            "get_ping"
        );
        assert_eq!(
            OperationExtractor::generate_operation_id("/users/{id}/posts", HttpMethod::Get),
            "get_users__id__posts"
        );
    }

    #[test]
    fn test_escape_identifier() {
        assert_eq!(escape_identifier("PingController.ping"), "PingController_ping");
        assert_eq!(escape_identifier("find-pets"), "find_pets");
    }

    #[test]
    fn test_swagger2_body_and_consumes() {
        let ops = extract(json!({
            "swagger": "2.0",
            "info": {"title": "t", "version": "1"},
            "consumes": ["application/xml"],
            "paths": {
                "/pet/{petId}": {
                    "parameters": [{"name": "petId", "in": "path", "type": "integer"}],
                    "post": {
                        "operationId": "updatePet",
                        "consumes": ["application/json"],
                        "parameters": [
                            {"name": "pet", "in": "body", "schema": {"type": "object"}},
                            {"name": "dryRun", "in": "query", "type": "boolean"}
                        ],
                        "responses": {"200": {"description": "ok"}}
                    },
                    "get": {
                        "responses": {"200": {"description": "ok"}}
                    }
                },
                "x-internal": true
            }
        }));

        assert_eq!(ops.len(), 2);
        let update = ops.iter().find(|o| o.operation_id == "updatePet").unwrap();
        let names: Vec<_> = update.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["petId", "pet", "dryRun"]);
        assert_eq!(update.body_parameter().unwrap().name, "pet");
        assert_eq!(update.consumes, vec!["application/json"]);
        assert!(update.parameters[0].required);
        assert_eq!(update.parameters[0].schema.as_ref().unwrap()["type"], "integer");

        let get = ops.iter().find(|o| o.method == HttpMethod::Get).unwrap();
        assert_eq!(get.operation_id, "get_pet__petId_");
        assert_eq!(get.consumes, vec!["application/xml"]);
    }

    #[test]
    fn test_openapi3_request_body_and_operation_name() {
        let ops = extract(json!({
            "openapi": "3.0.0",
            "info": {"title": "t", "version": "1"},
            "paths": {
                "/greet": {
                    "post": {
                        "operationId": "GreetController.greet",
                        "x-operation-name": "greet",
                        "tags": ["GreetController"],
                        "parameters": [
                            {"name": "name", "in": "query", "schema": {"type": "string"}},
                            {"name": "ids", "in": "query", "schema": {"type": "array"}, "explode": false}
                        ],
                        "requestBody": {
                            "content": {
                                "text/plain": {"schema": {"type": "string"}},
                                "application/json": {"schema": {"type": "object"}}
                            }
                        },
                        "responses": {
                            "200": {"content": {"application/json": {}}}
                        }
                    }
                }
            }
        }));

        let greet = &ops[0];
        assert_eq!(greet.operation_id, "GreetController.greet");
        assert_eq!(greet.client_id, "GreetController_greet");
        assert_eq!(greet.operation_name.as_deref(), Some("greet"));
        assert_eq!(greet.consumes, vec!["text/plain", "application/json"]);
        assert_eq!(greet.produces, vec!["application/json"]);
        let body = greet.request_body.as_ref().unwrap();
        assert_eq!(body.schema.as_ref().unwrap()["type"], "object");
        assert_eq!(greet.parameters[0].collection_format, CollectionFormat::Multi);
        assert_eq!(greet.parameters[1].collection_format, CollectionFormat::Csv);
        assert_eq!(greet.raw["x-operation-name"], "greet");
    }
}
