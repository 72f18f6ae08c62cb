//! OpenAPI 3.0 ping app served by axum

use axum::extract::Query;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::FutureExt;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use openapi_connector::{
    CallArgs, CallOptions, ConnectorError, ConnectorSettings, ExecuteContext, ExecuteEvent,
    HttpResponse, MethodOutput, OpenApiConnector, Positional, SpecSource,
};

fn ping_spec() -> Value {
    json!({
        "openapi": "3.0.0",
        "info": {"title": "ping-app", "version": "1.0.0"},
        "servers": [{"url": "/"}],
        "paths": {
            "/ping": {
                "get": {
                    "responses": {
                        "200": {
                            "description": "Ping Response",
                            "content": {
                                "application/json": {"schema": {"$ref": "#/components/schemas/PingResponse"}}
                            }
                        }
                    }
                }
            },
            "/greet": {
                "post": {
                    "parameters": [
                        {"name": "name", "in": "query", "required": true, "schema": {"type": "string"}}
                    ],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {"type": "object", "properties": {"requestId": {"type": "string"}}}
                            }
                        }
                    },
                    "responses": {"200": {"description": "Greeting"}}
                }
            }
        },
        "components": {
            "schemas": {
                "PingResponse": {
                    "type": "object",
                    "properties": {
                        "greeting": {"type": "string"},
                        "url": {"type": "string"},
                        "headers": {"type": "object"}
                    }
                }
            }
        }
    })
}

async fn ping(headers: HeaderMap) -> Json<Value> {
    let headers: Map<String, Value> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), json!(v)))
        })
        .collect();
    Json(json!({"greeting": "Hello from the ping app", "url": "/ping", "headers": headers}))
}

#[derive(Deserialize)]
struct GreetQuery {
    name: String,
}

async fn greet(Query(query): Query<GreetQuery>, Json(body): Json<Value>) -> Json<Value> {
    Json(json!({"hello": query.name, "requestId": body["requestId"]}))
}

/// Start the ping app on a free port; returns the spec URL
async fn start_ping_app() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new()
        .route("/openapi.json", get(|| async { Json(ping_spec()) }))
        .route("/ping", get(ping))
        .route("/greet", post(greet));

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/openapi.json", addr)
}

async fn connect(settings: ConnectorSettings) -> Arc<openapi_connector::MethodTable> {
    OpenApiConnector::new(settings)
        .unwrap()
        .connect()
        .await
        .unwrap()
}

fn response(output: MethodOutput) -> HttpResponse {
    output.into_response().unwrap()
}

#[tokio::test]
async fn test_generates_client_from_spec_url() {
    let spec_url = start_ping_app().await;
    let table = connect(ConnectorSettings::with_spec(spec_url.as_str())).await;

    assert!(table.method("get_ping").is_some());
    assert!(table.method("getPing").is_some());
    assert!(table.method("post_greet").is_some());
    assert!(table.api("default", "get_ping").is_some());
}

#[tokio::test]
async fn test_generates_client_from_files_and_objects() {
    let yaml = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/ping.yaml");
    let table = connect(ConnectorSettings::with_spec(SpecSource::File(yaml))).await;
    assert!(table.method("get_ping").is_some());

    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("ping.json");
    std::fs::write(&json_path, ping_spec().to_string()).unwrap();
    let table = connect(ConnectorSettings::with_spec(SpecSource::File(json_path))).await;
    assert!(table.method("post_greet").is_some());

    let table = connect(ConnectorSettings::with_spec(ping_spec())).await;
    assert!(table.method("get_ping").is_some());
}

#[tokio::test]
async fn test_invalid_spec_with_validation() {
    let mut settings = ConnectorSettings::with_spec(json!({"openapi": "3.0.0"}));
    settings.validate = true;
    let result = OpenApiConnector::new(settings).unwrap().connect().await;
    assert!(matches!(result, Err(ConnectorError::Validation(_))));
}

#[tokio::test]
async fn test_invokes_ping() {
    let spec_url = start_ping_app().await;
    let table = connect(ConnectorSettings::with_spec(spec_url.as_str())).await;

    let res = response(table.invoke("get_ping", CallArgs::default()).await.unwrap());

    assert_eq!(res.status, 200);
    assert_eq!(res.body["greeting"], "Hello from the ping app");
    assert_eq!(res.body["url"], "/ping");
    assert_eq!(
        res.body["headers"]["user-agent"],
        json!(format!("openapi-connector/{}", env!("CARGO_PKG_VERSION")))
    );
}

#[tokio::test]
async fn test_invokes_greet_with_request_body() {
    let spec_url = start_ping_app().await;
    let table = connect(ConnectorSettings::with_spec(spec_url.as_str())).await;

    let options = CallOptions {
        request_body: Some(json!({"requestId": "001"})),
        ..CallOptions::default()
    };
    let res = response(
        table
            .invoke("post_greet", CallArgs::named_with(json!({"name": "John"}), options))
            .await
            .unwrap(),
    );

    assert_eq!(res.status, 200);
    assert_eq!(res.body, json!({"hello": "John", "requestId": "001"}));
}

#[tokio::test]
async fn test_positional_request_body_last() {
    let spec_url = start_ping_app().await;
    let mut settings = ConnectorSettings::with_spec(spec_url.as_str());
    settings.positional = Positional::On;
    let table = connect(settings).await;

    let method = table.method("post_greet").unwrap();
    assert_eq!(method.arg_names(), ["name", "requestBody"]);

    let res = response(
        method
            .call(CallArgs::positional(vec![json!("John"), json!({"requestId": "001"})]))
            .await
            .unwrap(),
    );
    assert_eq!(res.body, json!({"hello": "John", "requestId": "001"}));
}

#[tokio::test]
async fn test_connector_hooks() {
    let spec_url = start_ping_app().await;
    let connector = OpenApiConnector::new(ConnectorSettings::with_spec(spec_url.as_str())).unwrap();
    let events = Arc::new(Mutex::new(Vec::new()));

    let log = events.clone();
    connector.observe_async(ExecuteEvent::BeforeExecute, move |ctx: &mut ExecuteContext| {
        let log = log.clone();
        async move {
            assert!(ctx.req.url.ends_with("/ping"));
            log.lock().unwrap().push("before execute");
            Ok::<(), ConnectorError>(())
        }
        .boxed()
    });

    let log = events.clone();
    connector.observe_fn(ExecuteEvent::AfterExecute, move |ctx: &mut ExecuteContext| {
        assert_eq!(ctx.res.as_ref().map(|r| r.status), Some(200));
        log.lock().unwrap().push("after execute");
        Ok(())
    });

    connector
        .connect()
        .await
        .unwrap()
        .invoke("get_ping", CallArgs::default())
        .await
        .unwrap();

    assert_eq!(*events.lock().unwrap(), vec!["before execute", "after execute"]);
}

#[tokio::test]
async fn test_model_binding() {
    let spec_url = start_ping_app().await;
    let connector = OpenApiConnector::new(ConnectorSettings::with_spec(spec_url.as_str())).unwrap();
    connector.define("PingService");

    let ping_service = connector.model("PingService").await.unwrap();
    assert_eq!(ping_service.name(), "PingService");

    let (tx, rx) = tokio::sync::oneshot::channel();
    ping_service
        .method("get_ping")
        .unwrap()
        .call_with_callback(CallArgs::default(), move |result| {
            let _ = tx.send(result);
        });

    let res = response(rx.await.unwrap().unwrap());
    assert_eq!(res.status, 200);
}
