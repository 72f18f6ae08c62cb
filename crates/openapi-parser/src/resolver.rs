//! Loading, dereferencing and validating specifications

use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{ParseResult, SpecError};
use crate::parser::OpenApiParser;
use crate::refs::{external_locations, RefResolver};
use crate::source::{is_url, SpecFormat, SpecSource};
use crate::types::{Dialect, ParsedSpec};
use crate::upgrade::upgrade_to_openapi3;
use crate::validator::{SpecValidator, ValidateOptions};

/// Options for [`SpecResolver::resolve`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    pub validate: ValidateOptions,
}

/// A loaded and fully dereferenced specification
#[derive(Debug, Clone)]
pub struct ResolvedSpec {
    /// Dereferenced document; circular `$ref` objects are left in place
    pub document: Value,
    pub dialect: Dialect,
    /// Where the document was loaded from, if not supplied in memory
    pub location: Option<String>,
}

impl ResolvedSpec {
    /// Parse the operation view of the document
    pub fn parse(&self) -> ParseResult<ParsedSpec> {
        OpenApiParser::convert(&self.document, self.dialect)
    }

    pub fn title(&self) -> Option<&str> {
        self.document.pointer("/info/title").and_then(Value::as_str)
    }

    /// Convert a Swagger 2.0 document to OpenAPI 3.0; 3.x documents are
    /// returned unchanged
    pub fn into_openapi3(self) -> ParseResult<Self> {
        if self.dialect == Dialect::OpenApi3 {
            return Ok(self);
        }
        let document = upgrade_to_openapi3(&self.document)?;
        Ok(Self {
            document,
            dialect: Dialect::OpenApi3,
            location: self.location,
        })
    }
}

/// Loads specifications from URLs, files or in-memory documents
pub struct SpecResolver {
    client: reqwest::Client,
}

impl SpecResolver {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Use a preconfigured HTTP client for fetching remote documents
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Load, dereference and (optionally) validate a specification
    pub async fn resolve(&self, source: &SpecSource, options: &ResolveOptions) -> ParseResult<ResolvedSpec> {
        info!("Resolving spec from {}", source);

        let (document, location) = match source {
            SpecSource::Url(url) => (self.fetch(url).await?, Some(url.clone())),
            SpecSource::File(path) => (
                Self::read_file(path).await?,
                Some(path.to_string_lossy().into_owned()),
            ),
            SpecSource::Document(document) => (document.clone(), None),
        };

        if !document.is_object() {
            return Err(SpecError::InvalidSpecType(
                "specification document must be an object".to_string(),
            ));
        }

        let documents = self.load_external(&document, location.as_deref()).await?;
        let document = RefResolver::new(&document, location.as_deref(), &documents).resolve()?;

        if options.validate.is_enabled() {
            SpecValidator::new().validate(&document, options.validate)?;
        }

        let dialect = Dialect::detect(&document)?;
        debug!("Resolved {:?} spec with {} external documents", dialect, documents.len());

        Ok(ResolvedSpec {
            document,
            dialect,
            location,
        })
    }

    /// Strict validation: both structural and semantic passes
    pub fn validate(&self, document: &Value) -> ParseResult<()> {
        SpecValidator::new().validate(document, ValidateOptions::all())
    }

    /// Load every external document reachable from `root`, each once
    async fn load_external(
        &self,
        root: &Value,
        location: Option<&str>,
    ) -> ParseResult<HashMap<String, Value>> {
        let mut documents: HashMap<String, Value> = HashMap::new();
        let mut pending = external_locations(root, location)?;

        while let Some(next) = pending.pop() {
            if documents.contains_key(&next) || Some(next.as_str()) == location {
                continue;
            }
            debug!("Loading referenced document {}", next);
            let document = self.load(&next).await?;
            for found in external_locations(&document, Some(&next))? {
                if !documents.contains_key(&found) {
                    pending.push(found);
                }
            }
            documents.insert(next, document);
        }

        Ok(documents)
    }

    async fn load(&self, location: &str) -> ParseResult<Value> {
        if is_url(location) {
            self.fetch(location).await
        } else {
            Self::read_file(Path::new(location)).await
        }
    }

    async fn read_file(path: &Path) -> ParseResult<Value> {
        let format = SpecFormat::from_path(path)?;
        let content = tokio::fs::read_to_string(path).await?;
        match format {
            SpecFormat::Json => OpenApiParser::parse_json(&content),
            SpecFormat::Yaml => OpenApiParser::parse_yaml(&content),
        }
    }

    async fn fetch(&self, url: &str) -> ParseResult<Value> {
        info!("Fetching spec from: {}", url);

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json, application/yaml, text/yaml")
            .send()
            .await
            .map_err(|e| SpecError::FetchError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SpecError::FetchError(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_default();

        let content = response
            .text()
            .await
            .map_err(|e| SpecError::FetchError(e.to_string()))?;

        if content_type.contains("yaml") || url.ends_with(".yaml") || url.ends_with(".yml") {
            OpenApiParser::parse_yaml(&content)
        } else if content_type.contains("json") || url.ends_with(".json") {
            OpenApiParser::parse_json(&content)
        } else {
            OpenApiParser::parse_document(&content)
        }
    }
}

impl Default for SpecResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn petstore() -> Value {
        json!({
            "swagger": "2.0",
            "info": {"title": "Petstore", "version": "1.0.0"},
            "paths": {
                "/pet": {
                    "post": {
                        "operationId": "addPet",
                        "parameters": [
                            {"name": "pet", "in": "body", "schema": {"$ref": "#/definitions/Pet"}}
                        ],
                        "responses": {"200": {"description": "ok"}}
                    }
                }
            },
            "definitions": {
                "Pet": {"type": "object", "properties": {"name": {"type": "string"}}}
            }
        })
    }

    #[tokio::test]
    async fn test_resolve_in_memory_document() {
        let resolved = SpecResolver::new()
            .resolve(&SpecSource::Document(petstore()), &ResolveOptions::default())
            .await
            .unwrap();

        assert_eq!(resolved.dialect, Dialect::SwaggerV2);
        assert_eq!(resolved.title(), Some("Petstore"));
        assert_eq!(
            resolved.document["paths"]["/pet"]["post"]["parameters"][0]["schema"]["type"],
            "object"
        );
        assert!(resolved.location.is_none());
    }

    #[tokio::test]
    async fn test_resolve_without_validation_accepts_malformed() {
        let resolved = SpecResolver::new()
            .resolve(&SpecSource::Document(json!({"swagger": "2.0"})), &ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(resolved.dialect, Dialect::SwaggerV2);
    }

    #[tokio::test]
    async fn test_resolve_with_validation_rejects_malformed() {
        let options = ResolveOptions {
            validate: ValidateOptions::all(),
        };
        let result = SpecResolver::new()
            .resolve(&SpecSource::Document(json!({"swagger": "2.0"})), &options)
            .await;
        assert!(matches!(result, Err(SpecError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_resolve_yaml_file_with_external_ref() {
        let dir = tempfile::tempdir().unwrap();
        let defs = dir.path().join("defs.json");
        std::fs::write(&defs, r#"{"Pet": {"type": "object", "required": ["name"]}}"#).unwrap();

        let spec_path = dir.path().join("api.yaml");
        let mut file = std::fs::File::create(&spec_path).unwrap();
        writeln!(
            file,
            r#"openapi: "3.0.0"
info:
  title: Files
  version: "1"
paths:
  /pets:
    get:
      responses:
        200:
          description: ok
          content:
            application/json:
              schema:
                $ref: "./defs.json#/Pet""#
        )
        .unwrap();

        let resolved = SpecResolver::new()
            .resolve(&SpecSource::File(spec_path), &ResolveOptions::default())
            .await
            .unwrap();

        assert_eq!(resolved.dialect, Dialect::OpenApi3);
        assert_eq!(
            resolved.document.pointer("/paths/~1pets/get/responses/200/content/application~1json/schema/required/0"),
            Some(&json!("name"))
        );
    }

    #[tokio::test]
    async fn test_resolve_files_concurrently() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.json");
        let second = dir.path().join("second.json");
        for (path, title) in [(&first, "First"), (&second, "Second")] {
            let document = json!({"openapi": "3.0.0", "info": {"title": title, "version": "1"}, "paths": {}});
            std::fs::write(path, document.to_string()).unwrap();
        }

        let resolver = SpecResolver::new();
        let options = ResolveOptions::default();
        let first_source = SpecSource::File(first);
        let second_source = SpecSource::File(second);
        let missing_source = SpecSource::File(dir.path().join("missing.json"));
        let (first, second, missing) = tokio::join!(
            resolver.resolve(&first_source, &options),
            resolver.resolve(&second_source, &options),
            resolver.resolve(&missing_source, &options),
        );

        assert_eq!(first.unwrap().title(), Some("First"));
        assert_eq!(second.unwrap().title(), Some("Second"));
        assert!(matches!(missing, Err(SpecError::IoError(_))));
    }

    #[tokio::test]
    async fn test_resolve_unsupported_file_format() {
        let result = SpecResolver::new()
            .resolve(&SpecSource::File("api.txt".into()), &ResolveOptions::default())
            .await;
        assert!(matches!(result, Err(SpecError::UnsupportedFormat(_))));
    }

    #[tokio::test]
    async fn test_resolve_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/swagger.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(petstore()))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/swagger.json", server.uri());
        let resolved = SpecResolver::new()
            .resolve(&SpecSource::Url(url.clone()), &ResolveOptions::default())
            .await
            .unwrap();

        assert_eq!(resolved.location.as_deref(), Some(url.as_str()));
        assert_eq!(resolved.parse().unwrap().operations.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = SpecResolver::new()
            .resolve(
                &SpecSource::Url(format!("{}/missing.json", server.uri())),
                &ResolveOptions::default(),
            )
            .await;
        assert!(matches!(result, Err(SpecError::FetchError(_))));
    }

    #[test]
    fn test_strict_validate() {
        let resolver = SpecResolver::new();
        assert!(resolver.validate(&petstore()).is_ok());
        assert!(resolver.validate(&json!({"swagger": "2.0"})).is_err());
    }

    #[tokio::test]
    async fn test_into_openapi3() {
        let resolved = SpecResolver::new()
            .resolve(&SpecSource::Document(petstore()), &ResolveOptions::default())
            .await
            .unwrap()
            .into_openapi3()
            .unwrap();

        assert_eq!(resolved.dialect, Dialect::OpenApi3);
        let parsed = resolved.parse().unwrap();
        assert!(parsed.operations[0].request_body.is_some());
    }
}
