//! Swagger 2.0 to OpenAPI 3.0 document conversion

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::{ParseResult, SpecError};
use crate::types::{Dialect, HttpMethod};

const SCHEMA_KEYS: &[&str] = &[
    "type",
    "format",
    "items",
    "enum",
    "default",
    "maximum",
    "minimum",
    "exclusiveMaximum",
    "exclusiveMinimum",
    "maxLength",
    "minLength",
    "pattern",
    "maxItems",
    "minItems",
    "uniqueItems",
    "multipleOf",
];

const REF_PREFIXES: &[(&str, &str)] = &[
    ("#/definitions/", "#/components/schemas/"),
    ("#/parameters/", "#/components/parameters/"),
    ("#/responses/", "#/components/responses/"),
];

/// Convert a Swagger 2.0 document to OpenAPI 3.0.
///
/// OpenAPI 3.x input is returned unchanged.
pub fn upgrade_to_openapi3(document: &Value) -> ParseResult<Value> {
    let root = document.as_object().ok_or_else(|| {
        SpecError::InvalidSpecType("specification document must be an object".to_string())
    })?;

    if Dialect::detect(document)? == Dialect::OpenApi3 {
        return Ok(document.clone());
    }

    let global_consumes = string_list(root.get("consumes"));
    let global_produces = string_list(root.get("produces"));

    let mut upgraded = Map::new();
    upgraded.insert("openapi".to_string(), json!("3.0.0"));
    upgraded.insert(
        "info".to_string(),
        root.get("info").cloned().unwrap_or_else(|| json!({"title": "", "version": ""})),
    );

    let servers = servers(root);
    if !servers.is_empty() {
        upgraded.insert("servers".to_string(), Value::Array(servers));
    }

    for (key, value) in root {
        let carried = matches!(key.as_str(), "tags" | "externalDocs" | "security") || key.starts_with("x-");
        if carried {
            upgraded.insert(key.clone(), value.clone());
        }
    }

    let mut paths = Map::new();
    if let Some(source) = root.get("paths").and_then(Value::as_object) {
        for (path, item) in source {
            let converted = match item.as_object() {
                Some(item) => Value::Object(upgrade_path_item(item, &global_consumes, &global_produces)),
                None => item.clone(),
            };
            paths.insert(path.clone(), converted);
        }
    }
    upgraded.insert("paths".to_string(), Value::Object(paths));

    let components = components(root, &global_produces);
    if !components.is_empty() {
        upgraded.insert("components".to_string(), Value::Object(components));
    }

    let mut upgraded = Value::Object(upgraded);
    rewrite_refs(&mut upgraded);

    debug!("Upgraded Swagger 2.0 document to OpenAPI 3.0");
    Ok(upgraded)
}

fn servers(root: &Map<String, Value>) -> Vec<Value> {
    let base_path = root.get("basePath").and_then(Value::as_str).unwrap_or("");
    let schemes = string_list(root.get("schemes"));

    match root.get("host").and_then(Value::as_str) {
        Some(host) if schemes.is_empty() => vec![json!({"url": format!("//{}{}", host, base_path)})],
        Some(host) => schemes
            .iter()
            .map(|scheme| json!({"url": format!("{}://{}{}", scheme, host, base_path)}))
            .collect(),
        None if base_path.is_empty() => Vec::new(),
        None => vec![json!({ "url": base_path })],
    }
}

fn upgrade_path_item(
    item: &Map<String, Value>,
    global_consumes: &[String],
    global_produces: &[String],
) -> Map<String, Value> {
    let path_params = item.get("parameters").and_then(Value::as_array).cloned().unwrap_or_default();
    let (path_bodies, path_plain): (Vec<Value>, Vec<Value>) =
        path_params.into_iter().partition(is_body_like);

    let mut upgraded = Map::new();
    if !path_plain.is_empty() {
        upgraded.insert(
            "parameters".to_string(),
            Value::Array(path_plain.iter().map(upgrade_parameter).collect()),
        );
    }

    for (key, value) in item {
        if key == "parameters" {
            continue;
        }
        let converted = match (HttpMethod::from_key(key), value.as_object()) {
            (Some(_), Some(operation)) => Value::Object(upgrade_operation(
                operation,
                &path_bodies,
                global_consumes,
                global_produces,
            )),
            _ => value.clone(),
        };
        upgraded.insert(key.clone(), converted);
    }

    upgraded
}

fn upgrade_operation(
    operation: &Map<String, Value>,
    path_bodies: &[Value],
    global_consumes: &[String],
    global_produces: &[String],
) -> Map<String, Value> {
    let consumes = operation
        .get("consumes")
        .map(|c| string_list(Some(c)))
        .unwrap_or_else(|| global_consumes.to_vec());
    let produces = operation
        .get("produces")
        .map(|p| string_list(Some(p)))
        .unwrap_or_else(|| global_produces.to_vec());

    let mut parameters = Vec::new();
    let mut bodies: Vec<Value> = path_bodies.to_vec();
    for param in operation.get("parameters").and_then(Value::as_array).into_iter().flatten() {
        if is_body_like(param) {
            bodies.retain(|b| b.get("name") != param.get("name") || b.get("in") != param.get("in"));
            bodies.push(param.clone());
        } else {
            parameters.push(upgrade_parameter(param));
        }
    }

    let mut upgraded = Map::new();
    for (key, value) in operation {
        match key.as_str() {
            "consumes" | "produces" | "schemes" | "parameters" => {}
            "responses" => {
                upgraded.insert(key.clone(), upgrade_responses(value, &produces));
            }
            _ => {
                upgraded.insert(key.clone(), value.clone());
            }
        }
    }

    if !parameters.is_empty() {
        upgraded.insert("parameters".to_string(), Value::Array(parameters));
    }

    if let Some(body) = bodies.iter().find(|p| location(p) == Some("body")) {
        upgraded.insert("requestBody".to_string(), body_request(body, &consumes));
        if let Some(name) = body.get("name") {
            upgraded.insert("x-codegen-request-body-name".to_string(), name.clone());
        }
    } else if !bodies.is_empty() {
        upgraded.insert("requestBody".to_string(), form_request(&bodies, &consumes));
    }

    upgraded
}

fn body_request(param: &Value, consumes: &[String]) -> Value {
    let schema = param.get("schema").cloned().unwrap_or_else(|| json!({}));
    let content_types = if consumes.is_empty() {
        vec!["application/json".to_string()]
    } else {
        consumes.to_vec()
    };

    let content: Map<String, Value> = content_types
        .into_iter()
        .map(|ct| (ct, json!({ "schema": schema.clone() })))
        .collect();

    let mut body = Map::new();
    body.insert("content".to_string(), Value::Object(content));
    if let Some(description) = param.get("description") {
        body.insert("description".to_string(), description.clone());
    }
    if param.get("required").and_then(Value::as_bool) == Some(true) {
        body.insert("required".to_string(), json!(true));
    }
    Value::Object(body)
}

fn form_request(params: &[Value], consumes: &[String]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    let mut has_file = false;

    for param in params {
        let Some(name) = param.get("name").and_then(Value::as_str) else {
            continue;
        };
        let mut schema = schema_of(param);
        if schema.get("type").and_then(Value::as_str) == Some("file") {
            has_file = true;
            schema = json!({"type": "string", "format": "binary"});
        }
        if let (Some(description), Some(obj)) = (param.get("description"), schema.as_object_mut()) {
            obj.insert("description".to_string(), description.clone());
        }
        properties.insert(name.to_string(), schema);
        if param.get("required").and_then(Value::as_bool) == Some(true) {
            required.push(json!(name));
        }
    }

    let mut schema = json!({"type": "object", "properties": properties});
    if !required.is_empty() {
        schema["required"] = Value::Array(required);
    }

    let content_types: Vec<String> = match consumes
        .iter()
        .filter(|ct| ct.contains("form"))
        .cloned()
        .collect::<Vec<_>>()
    {
        found if !found.is_empty() => found,
        _ if has_file => vec!["multipart/form-data".to_string()],
        _ => vec!["application/x-www-form-urlencoded".to_string()],
    };

    let content: Map<String, Value> = content_types
        .into_iter()
        .map(|ct| (ct, json!({ "schema": schema.clone() })))
        .collect();
    json!({ "content": content })
}

fn upgrade_parameter(param: &Value) -> Value {
    let Some(source) = param.as_object() else {
        return param.clone();
    };
    if source.contains_key("$ref") {
        return param.clone();
    }

    let mut upgraded = Map::new();
    for (key, value) in source {
        if SCHEMA_KEYS.contains(&key.as_str()) || key == "collectionFormat" {
            continue;
        }
        upgraded.insert(key.clone(), value.clone());
    }
    upgraded.insert("schema".to_string(), schema_of(param));

    let location = location(param).unwrap_or("query");
    match source.get("collectionFormat").and_then(Value::as_str) {
        Some("multi") => {
            upgraded.insert("style".to_string(), json!("form"));
            upgraded.insert("explode".to_string(), json!(true));
        }
        Some("ssv") => {
            upgraded.insert("style".to_string(), json!("spaceDelimited"));
            upgraded.insert("explode".to_string(), json!(false));
        }
        Some("pipes") => {
            upgraded.insert("style".to_string(), json!("pipeDelimited"));
            upgraded.insert("explode".to_string(), json!(false));
        }
        Some(_) => {
            let style = if matches!(location, "query" | "cookie") { "form" } else { "simple" };
            upgraded.insert("style".to_string(), json!(style));
            upgraded.insert("explode".to_string(), json!(false));
        }
        // csv is the 2.0 default for arrays
        None if source.get("type").and_then(Value::as_str) == Some("array") => {
            upgraded.insert("explode".to_string(), json!(false));
        }
        None => {}
    }

    Value::Object(upgraded)
}

fn schema_of(param: &Value) -> Value {
    if let Some(schema) = param.get("schema") {
        return schema.clone();
    }
    let mut schema = Map::new();
    for key in SCHEMA_KEYS {
        if let Some(value) = param.get(*key) {
            let value = match (*key, value) {
                ("items", Value::Object(items)) => {
                    let mut items = items.clone();
                    items.remove("collectionFormat");
                    Value::Object(items)
                }
                _ => value.clone(),
            };
            schema.insert(key.to_string(), value);
        }
    }
    Value::Object(schema)
}

fn upgrade_responses(responses: &Value, produces: &[String]) -> Value {
    let Some(responses) = responses.as_object() else {
        return responses.clone();
    };
    Value::Object(
        responses
            .iter()
            .map(|(status, response)| (status.clone(), upgrade_response(response, produces)))
            .collect(),
    )
}

fn upgrade_response(response: &Value, produces: &[String]) -> Value {
    let Some(source) = response.as_object() else {
        return response.clone();
    };
    if source.contains_key("$ref") {
        return response.clone();
    }

    let mut upgraded = Map::new();
    upgraded.insert(
        "description".to_string(),
        source.get("description").cloned().unwrap_or_else(|| json!("")),
    );

    for (key, value) in source {
        match key.as_str() {
            "description" | "examples" => {}
            "schema" => {
                let content_types = if produces.is_empty() {
                    vec!["application/json".to_string()]
                } else {
                    produces.to_vec()
                };
                let content: Map<String, Value> = content_types
                    .into_iter()
                    .map(|ct| {
                        let mut media = json!({ "schema": value.clone() });
                        if let Some(example) = source.get("examples").and_then(|e| e.get(&ct)) {
                            media["example"] = example.clone();
                        }
                        (ct, media)
                    })
                    .collect();
                upgraded.insert("content".to_string(), Value::Object(content));
            }
            "headers" => {
                let headers = value
                    .as_object()
                    .map(|headers| {
                        headers
                            .iter()
                            .map(|(name, header)| {
                                let mut converted = json!({ "schema": schema_of(header) });
                                if let Some(description) = header.get("description") {
                                    converted["description"] = description.clone();
                                }
                                (name.clone(), converted)
                            })
                            .collect::<Map<String, Value>>()
                    })
                    .unwrap_or_default();
                upgraded.insert(key.clone(), Value::Object(headers));
            }
            _ => {
                upgraded.insert(key.clone(), value.clone());
            }
        }
    }

    Value::Object(upgraded)
}

fn components(root: &Map<String, Value>, global_produces: &[String]) -> Map<String, Value> {
    let mut components = Map::new();

    if let Some(definitions) = root.get("definitions") {
        components.insert("schemas".to_string(), definitions.clone());
    }

    if let Some(parameters) = root.get("parameters").and_then(Value::as_object) {
        let mut plain = Map::new();
        let mut bodies = Map::new();
        for (name, param) in parameters {
            if location(param) == Some("body") {
                bodies.insert(name.clone(), body_request(param, &[]));
            } else {
                plain.insert(name.clone(), upgrade_parameter(param));
            }
        }
        if !plain.is_empty() {
            components.insert("parameters".to_string(), Value::Object(plain));
        }
        if !bodies.is_empty() {
            components.insert("requestBodies".to_string(), Value::Object(bodies));
        }
    }

    if let Some(responses) = root.get("responses") {
        components.insert("responses".to_string(), upgrade_responses(responses, global_produces));
    }

    if let Some(definitions) = root.get("securityDefinitions").and_then(Value::as_object) {
        let schemes: Map<String, Value> = definitions
            .iter()
            .map(|(name, scheme)| (name.clone(), upgrade_security_scheme(scheme)))
            .collect();
        components.insert("securitySchemes".to_string(), Value::Object(schemes));
    }

    components
}

fn upgrade_security_scheme(scheme: &Value) -> Value {
    match scheme.get("type").and_then(Value::as_str) {
        Some("basic") => {
            let mut upgraded = json!({"type": "http", "scheme": "basic"});
            if let Some(description) = scheme.get("description") {
                upgraded["description"] = description.clone();
            }
            upgraded
        }
        Some("oauth2") => {
            let flow_name = match scheme.get("flow").and_then(Value::as_str) {
                Some("implicit") => "implicit",
                Some("password") => "password",
                Some("application") => "clientCredentials",
                _ => "authorizationCode",
            };
            let mut flow = Map::new();
            for key in ["authorizationUrl", "tokenUrl"] {
                if let Some(value) = scheme.get(key) {
                    flow.insert(key.to_string(), value.clone());
                }
            }
            flow.insert(
                "scopes".to_string(),
                scheme.get("scopes").cloned().unwrap_or_else(|| json!({})),
            );

            let mut upgraded = json!({"type": "oauth2", "flows": { flow_name: flow }});
            if let Some(description) = scheme.get("description") {
                upgraded["description"] = description.clone();
            }
            upgraded
        }
        _ => scheme.clone(),
    }
}

fn rewrite_refs(value: &mut Value) {
    match value {
        Value::Object(obj) => {
            if let Some(Value::String(reference)) = obj.get_mut("$ref") {
                for (from, to) in REF_PREFIXES {
                    if let Some(rest) = reference.strip_prefix(from) {
                        *reference = format!("{}{}", to, rest);
                        break;
                    }
                }
            }
            for item in obj.values_mut() {
                rewrite_refs(item);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(rewrite_refs),
        _ => {}
    }
}

fn is_body_like(param: &Value) -> bool {
    matches!(location(param), Some("body") | Some("formData"))
}

fn location(param: &Value) -> Option<&str> {
    param.get("in").and_then(Value::as_str)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn petstore() -> Value {
        json!({
            "swagger": "2.0",
            "info": {"title": "Petstore", "version": "1.0.0"},
            "host": "petstore.swagger.io",
            "basePath": "/v2",
            "schemes": ["https"],
            "consumes": ["application/json"],
            "produces": ["application/json"],
            "paths": {
                "/pet": {
                    "post": {
                        "operationId": "addPet",
                        "parameters": [
                            {"name": "pet", "in": "body", "required": true, "schema": {"$ref": "#/definitions/Pet"}}
                        ],
                        "responses": {"200": {"description": "ok", "schema": {"$ref": "#/definitions/Pet"}}}
                    }
                },
                "/pet/findByStatus": {
                    "get": {
                        "operationId": "findPetsByStatus",
                        "parameters": [
                            {"name": "status", "in": "query", "type": "array", "items": {"type": "string"}, "collectionFormat": "multi"}
                        ],
                        "responses": {"200": {"description": "ok"}}
                    }
                },
                "/pet/{petId}": {
                    "parameters": [{"name": "petId", "in": "path", "required": true, "type": "integer"}],
                    "post": {
                        "operationId": "updatePetWithForm",
                        "consumes": ["application/x-www-form-urlencoded"],
                        "parameters": [
                            {"name": "name", "in": "formData", "type": "string", "required": true},
                            {"name": "status", "in": "formData", "type": "string"}
                        ],
                        "responses": {"405": {"description": "invalid"}}
                    }
                }
            },
            "definitions": {"Pet": {"type": "object"}},
            "securityDefinitions": {
                "basicAuth": {"type": "basic"},
                "petstore_auth": {
                    "type": "oauth2",
                    "flow": "implicit",
                    "authorizationUrl": "http://petstore.swagger.io/oauth/dialog",
                    "scopes": {"write:pets": "modify pets"}
                }
            }
        })
    }

    #[test]
    fn test_upgrade_servers_and_components() {
        let upgraded = upgrade_to_openapi3(&petstore()).unwrap();

        assert_eq!(upgraded["openapi"], "3.0.0");
        assert_eq!(upgraded["servers"][0]["url"], "https://petstore.swagger.io/v2");
        assert_eq!(upgraded["components"]["schemas"]["Pet"]["type"], "object");
        assert_eq!(upgraded["components"]["securitySchemes"]["basicAuth"]["scheme"], "basic");
        assert_eq!(
            upgraded["components"]["securitySchemes"]["petstore_auth"]["flows"]["implicit"]["scopes"]["write:pets"],
            "modify pets"
        );
    }

    #[test]
    fn test_upgrade_body_parameter() {
        let upgraded = upgrade_to_openapi3(&petstore()).unwrap();
        let add_pet = &upgraded["paths"]["/pet"]["post"];

        assert!(add_pet.get("parameters").is_none());
        assert_eq!(add_pet["x-codegen-request-body-name"], "pet");
        assert_eq!(add_pet["requestBody"]["required"], true);
        assert_eq!(
            add_pet["requestBody"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/Pet"
        );
        assert_eq!(
            add_pet["responses"]["200"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/Pet"
        );
    }

    #[test]
    fn test_upgrade_form_and_query_parameters() {
        let upgraded = upgrade_to_openapi3(&petstore()).unwrap();

        let find = &upgraded["paths"]["/pet/findByStatus"]["get"]["parameters"][0];
        assert_eq!(find["schema"]["type"], "array");
        assert_eq!(find["explode"], true);
        assert!(find.get("collectionFormat").is_none());

        let item = &upgraded["paths"]["/pet/{petId}"];
        assert_eq!(item["parameters"][0]["schema"]["type"], "integer");
        let form = &item["post"]["requestBody"]["content"]["application/x-www-form-urlencoded"]["schema"];
        assert_eq!(form["properties"]["name"]["type"], "string");
        assert_eq!(form["required"], json!(["name"]));
    }

    #[test]
    fn test_openapi3_is_unchanged() {
        let doc = json!({"openapi": "3.0.1", "info": {"title": "t", "version": "1"}, "paths": {}});
        assert_eq!(upgrade_to_openapi3(&doc).unwrap(), doc);
    }
}
