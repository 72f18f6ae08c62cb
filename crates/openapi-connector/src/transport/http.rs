//! Default transport on top of reqwest

use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use tracing::{debug, error};

use connector_core::{ConnectorError, HttpClientOptions, HttpRequest, HttpResponse, Result};
use openapi_parser::HttpMethod;

use super::HttpTransport;

/// [`HttpTransport`] backed by a shared `reqwest::Client`
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a client with the configured timeout and default headers
    pub fn new(options: &HttpClientOptions) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ConnectorError::Config(format!("invalid header name {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ConnectorError::Config(format!("invalid header value: {}", e)))?;
            default_headers.insert(name, value);
        }

        let mut builder = Client::builder().default_headers(default_headers);
        if let Some(timeout) = options.timeout() {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| ConnectorError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Use a preconfigured client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
        HttpMethod::Trace => reqwest::Method::TRACE,
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        debug!("Sending {} {}", request.method, request.url);

        let response = builder.send().await.map_err(|e| {
            error!("HTTP request failed: {}", e);
            ConnectorError::Transport(format!("HTTP request failed: {}", e))
        })?;

        let status = response.status();
        let url = response.url().to_string();
        let headers: IndexMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let text = response
            .text()
            .await
            .map_err(|e| ConnectorError::Transport(format!("Failed to read response: {}", e)))?;

        debug!("Response status: {}", status);

        Ok(HttpResponse::new(
            url,
            status.as_u16(),
            status.canonical_reason().unwrap_or_default(),
            headers,
            text,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_send_with_default_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pets"))
            .and(header("x-tenant", "acme"))
            .and(body_string(r#"{"name":"rex"}"#))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let mut options = HttpClientOptions::default();
        options.headers.insert("x-tenant".to_string(), "acme".to_string());
        let transport = ReqwestTransport::new(&options).unwrap();

        let mut request = HttpRequest::new(HttpMethod::Post, format!("{}/pets", server.uri()));
        request.set_header("Content-Type", "application/json");
        request.body = Some(r#"{"name":"rex"}"#.to_string());

        let response = transport.send(request).await.unwrap();
        assert_eq!(response.status, 201);
        assert_eq!(response.status_text, "Created");
        assert_eq!(response.body, json!({"id": 1}));
    }

    #[tokio::test]
    async fn test_error_status_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(&HttpClientOptions::default()).unwrap();
        let response = transport
            .send(HttpRequest::new(HttpMethod::Get, format!("{}/nope", server.uri())))
            .await
            .unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.status_text, "Not Found");
        assert_eq!(response.text, "missing");
    }

    #[test]
    fn test_invalid_default_header() {
        let mut options = HttpClientOptions::default();
        options.headers.insert("bad header".to_string(), "x".to_string());
        assert!(matches!(
            ReqwestTransport::new(&options),
            Err(ConnectorError::Config(_))
        ));
    }
}
