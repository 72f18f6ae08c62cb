//! Structural and semantic validation of specification documents

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::error::{ParseResult, SpecError};
use crate::types::HttpMethod;

static PATH_TEMPLATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]+)\}").expect("Regex pattern is hardcoded and valid"));

/// Which validation passes to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Document shape (the part a meta-schema would cover)
    pub schema: bool,
    /// Cross-field rules (unique ids, path parameters, body rules)
    pub spec: bool,
}

impl ValidateOptions {
    pub fn all() -> Self {
        Self {
            schema: true,
            spec: true,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.schema || self.spec
    }
}

/// Collected validation problems
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> ParseResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(SpecError::ValidationError(self.errors))
        }
    }
}

/// Validates Swagger 2.0 / OpenAPI 3.x documents
pub struct SpecValidator;

impl SpecValidator {
    pub fn new() -> Self {
        Self
    }

    /// Run the selected passes, failing with every problem found
    pub fn validate(&self, document: &Value, options: ValidateOptions) -> ParseResult<()> {
        self.report(document, options).into_result()
    }

    pub fn report(&self, document: &Value, options: ValidateOptions) -> ValidationReport {
        let mut report = ValidationReport::default();

        let Some(root) = document.as_object() else {
            report.add_error("specification must be an object");
            return report;
        };

        let swagger2 = root.get("swagger").is_some();

        if options.schema {
            Self::check_structure(root, swagger2, &mut report);
        }
        if options.spec {
            Self::check_semantics(root, swagger2, &mut report);
        }

        report
    }

    fn check_structure(root: &Map<String, Value>, swagger2: bool, report: &mut ValidationReport) {
        match (root.get("swagger"), root.get("openapi")) {
            (Some(Value::String(v)), _) if v == "2.0" => {}
            (None, Some(Value::String(v))) if v.starts_with("3.") => {}
            (Some(other), _) => report.add_error(format!("unsupported swagger version {}", other)),
            (None, Some(other)) => report.add_error(format!("unsupported openapi version {}", other)),
            (None, None) => report.add_error("missing `swagger` or `openapi` version field"),
        }

        match root.get("info").and_then(Value::as_object) {
            Some(info) => {
                if !info.get("title").is_some_and(Value::is_string) {
                    report.add_error("info.title must be a string");
                }
                if !info.get("version").is_some_and(Value::is_string) {
                    report.add_error("info.version must be a string");
                }
            }
            None => report.add_error("missing `info` object"),
        }

        let Some(paths) = root.get("paths").and_then(Value::as_object) else {
            report.add_error("missing `paths` object");
            return;
        };

        for (path, item) in paths {
            if path.starts_with("x-") {
                continue;
            }
            if !path.starts_with('/') {
                report.add_error(format!("path `{}` must start with `/`", path));
            }
            let Some(item) = item.as_object() else {
                report.add_error(format!("path item `{}` must be an object", path));
                continue;
            };

            Self::check_parameters(item.get("parameters"), path, swagger2, report);

            for (key, operation) in item {
                let Some(method) = HttpMethod::from_key(key) else {
                    continue;
                };
                let context = format!("{} {}", method, path);
                let Some(operation) = operation.as_object() else {
                    report.add_error(format!("{}: operation must be an object", context));
                    continue;
                };

                if !operation.get("responses").is_some_and(Value::is_object) {
                    report.add_error(format!("{}: missing `responses` object", context));
                }
                Self::check_parameters(operation.get("parameters"), &context, swagger2, report);

                if let Some(body) = operation.get("requestBody") {
                    if swagger2 {
                        report.add_error(format!("{}: `requestBody` is not valid in Swagger 2.0", context));
                    } else if !is_reference(body) && !body.get("content").is_some_and(Value::is_object) {
                        report.add_error(format!("{}: requestBody must declare `content`", context));
                    }
                }
            }
        }
    }

    fn check_parameters(
        parameters: Option<&Value>,
        context: &str,
        swagger2: bool,
        report: &mut ValidationReport,
    ) {
        let Some(parameters) = parameters else {
            return;
        };
        let Some(parameters) = parameters.as_array() else {
            report.add_error(format!("{}: `parameters` must be an array", context));
            return;
        };

        let allowed: &[&str] = if swagger2 {
            &["query", "header", "path", "formData", "body"]
        } else {
            &["query", "header", "path", "cookie"]
        };

        for param in parameters.iter().filter(|p| !is_reference(p)) {
            let name = param.get("name").and_then(Value::as_str);
            let location = param.get("in").and_then(Value::as_str);
            match (name, location) {
                (Some(name), Some(location)) if allowed.contains(&location) => {
                    if swagger2 && location == "body" && param.get("schema").is_none() {
                        report.add_error(format!("{}: body parameter `{}` needs a schema", context, name));
                    }
                    if swagger2 && location != "body" && param.get("type").is_none() {
                        report.add_error(format!("{}: parameter `{}` needs a type", context, name));
                    }
                }
                (Some(name), Some(location)) => report.add_error(format!(
                    "{}: parameter `{}` has invalid location `{}`",
                    context, name, location
                )),
                _ => report.add_error(format!("{}: parameters need `name` and `in`", context)),
            }
        }
    }

    fn check_semantics(root: &Map<String, Value>, swagger2: bool, report: &mut ValidationReport) {
        let Some(paths) = root.get("paths").and_then(Value::as_object) else {
            return;
        };

        let mut operation_ids = HashSet::new();

        for (path, item) in paths {
            let Some(item) = item.as_object() else {
                continue;
            };
            let templated: Vec<&str> = PATH_TEMPLATE
                .captures_iter(path)
                .filter_map(|c| c.get(1).map(|m| m.as_str()))
                .collect();
            let path_level = parameter_list(item.get("parameters"));

            for (key, operation) in item {
                let Some(method) = HttpMethod::from_key(key) else {
                    continue;
                };
                let context = format!("{} {}", method, path);

                if let Some(id) = operation.get("operationId").and_then(Value::as_str) {
                    if !operation_ids.insert(id.to_string()) {
                        report.add_error(format!("{}: duplicate operationId `{}`", context, id));
                    }
                }

                // Operation-level parameters override path-level ones
                let mut parameters: Vec<&Map<String, Value>> = Vec::new();
                for param in parameter_list(operation.get("parameters")) {
                    let duplicate = parameters.iter().any(|p| same_parameter(p, param));
                    if duplicate {
                        report.add_error(format!(
                            "{}: duplicate parameter `{}`",
                            context,
                            param.get("name").and_then(Value::as_str).unwrap_or_default()
                        ));
                    } else {
                        parameters.push(param);
                    }
                }
                for param in &path_level {
                    if !parameters.iter().any(|p| same_parameter(p, param)) {
                        parameters.push(param);
                    }
                }

                let path_params: Vec<&Map<String, Value>> = parameters
                    .iter()
                    .copied()
                    .filter(|p| p.get("in").and_then(Value::as_str) == Some("path"))
                    .collect();

                for name in &templated {
                    let declared = path_params
                        .iter()
                        .any(|p| p.get("name").and_then(Value::as_str) == Some(*name));
                    if !declared {
                        report.add_error(format!("{}: path parameter `{}` is not declared", context, name));
                    }
                }
                for param in &path_params {
                    let name = param.get("name").and_then(Value::as_str).unwrap_or_default();
                    if !templated.contains(&name) {
                        report.add_error(format!("{}: path parameter `{}` is not in the path", context, name));
                    }
                    if param.get("required").and_then(Value::as_bool) != Some(true) {
                        report.add_error(format!("{}: path parameter `{}` must be required", context, name));
                    }
                }

                if swagger2 {
                    let count = |location: &str| {
                        parameters
                            .iter()
                            .filter(|p| p.get("in").and_then(Value::as_str) == Some(location))
                            .count()
                    };
                    let bodies = count("body");
                    if bodies > 1 {
                        report.add_error(format!("{}: more than one body parameter", context));
                    }
                    if bodies > 0 && count("formData") > 0 {
                        report.add_error(format!("{}: body and formData parameters are exclusive", context));
                    }
                }
            }
        }
    }
}

impl Default for SpecValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn is_reference(value: &Value) -> bool {
    value.get("$ref").is_some()
}

fn parameter_list(parameters: Option<&Value>) -> Vec<&Map<String, Value>> {
    parameters
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter(|p| !is_reference(p))
                .filter_map(Value::as_object)
                .collect()
        })
        .unwrap_or_default()
}

fn same_parameter(a: &Map<String, Value>, b: &Map<String, Value>) -> bool {
    a.get("name") == b.get("name") && a.get("in") == b.get("in")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn petstore() -> Value {
        json!({
            "swagger": "2.0",
            "info": {"title": "Petstore", "version": "1.0.0"},
            "paths": {
                "/pet/{petId}": {
                    "get": {
                        "operationId": "getPetById",
                        "parameters": [
                            {"name": "petId", "in": "path", "required": true, "type": "integer"}
                        ],
                        "responses": {"200": {"description": "ok"}}
                    }
                }
            }
        })
    }

    #[test]
    fn test_valid_document() {
        assert!(SpecValidator::new().validate(&petstore(), ValidateOptions::all()).is_ok());
    }

    #[test]
    fn test_not_a_spec() {
        let result = SpecValidator::new().validate(&json!({"this": "that"}), ValidateOptions::all());
        match result {
            Err(SpecError::ValidationError(errors)) => {
                assert!(errors.iter().any(|e| e.contains("version")));
                assert!(errors.iter().any(|e| e.contains("info")));
                assert!(errors.iter().any(|e| e.contains("paths")));
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_semantic_errors() {
        let mut spec = petstore();
        spec["paths"]["/pet/{petId}"]["post"] = json!({
            "operationId": "getPetById",
            "parameters": [
                {"name": "a", "in": "body", "schema": {}},
                {"name": "b", "in": "body", "schema": {}}
            ],
            "responses": {}
        });

        let report = SpecValidator::new().report(&spec, ValidateOptions { schema: false, spec: true });
        assert!(report.errors.iter().any(|e| e.contains("duplicate operationId")));
        assert!(report.errors.iter().any(|e| e.contains("`petId` is not declared")));
        assert!(report.errors.iter().any(|e| e.contains("more than one body")));
    }

    #[test]
    fn test_passes_are_independent() {
        let spec = json!({"openapi": "3.0.0"});
        let validator = SpecValidator::new();

        assert!(validator.validate(&spec, ValidateOptions::default()).is_ok());
        assert!(validator.validate(&spec, ValidateOptions { schema: false, spec: true }).is_ok());
        assert!(validator.validate(&spec, ValidateOptions { schema: true, spec: false }).is_err());
    }
}
