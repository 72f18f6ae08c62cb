//! Connector façade: resolves the spec once and exposes the method table

use indexmap::IndexMap;
use serde_json::Value;
use std::ops::Deref;
use std::sync::{Arc, RwLock};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use connector_core::{ConnectorError, ConnectorSettings, HttpResponse, ModelRegistry, Result};
use openapi_parser::{
    ApiOperation, Dialect, OperationIndexer, ResolveOptions, SpecError, SpecResolver,
    SpecSource, ValidateOptions,
};

use crate::binder::{ArgumentBinder, BoundCall, CallArgs, CallOptions};
use crate::invocation::{MethodOutput, OperationMethod, Runtime};
use crate::pipeline::{
    AsyncFnObserver, ExecuteContext, ExecuteEvent, ExecuteObserver, FnObserver,
    InterceptorPipeline, ObserverRegistry, ResponseCache,
};
use crate::transport::{HttpTransport, ReqwestTransport};

/// Generated methods of one connection, immutable once built
pub struct MethodTable {
    methods: IndexMap<String, OperationMethod>,
    apis: IndexMap<String, IndexMap<String, OperationMethod>>,
    runtime: Arc<Runtime>,
}

impl MethodTable {
    fn build(runtime: Arc<Runtime>, indexer: &OperationIndexer) -> Self {
        let operations = &runtime.spec.operations;
        let generated: Vec<OperationMethod> = operations
            .iter()
            .map(|op| OperationMethod::new(op.clone(), runtime.clone()))
            .collect();

        let mut methods: IndexMap<String, OperationMethod> = IndexMap::new();
        let mut apis: IndexMap<String, IndexMap<String, OperationMethod>> = IndexMap::new();

        for entry in indexer.index(operations) {
            let method = &generated[entry.operation];
            for name in entry.names {
                methods.entry(name).or_insert_with(|| method.clone());
            }
            let api = apis.entry(entry.tag).or_default();
            for name in entry.names_within_tag {
                api.entry(name).or_insert_with(|| method.clone());
            }
        }

        Self {
            methods,
            apis,
            runtime,
        }
    }

    pub fn method(&self, name: &str) -> Option<&OperationMethod> {
        self.methods.get(name)
    }

    /// Method `name` within tag group `tag`
    pub fn api(&self, tag: &str, name: &str) -> Option<&OperationMethod> {
        self.apis.get(tag).and_then(|api| api.get(name))
    }

    pub fn apis(&self) -> impl Iterator<Item = (&str, &IndexMap<String, OperationMethod>)> {
        self.apis.iter().map(|(tag, api)| (tag.as_str(), api))
    }

    /// Method names in registration order
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn operations(&self) -> &[ApiOperation] {
        &self.runtime.spec.operations
    }

    pub fn dialect(&self) -> Dialect {
        self.runtime.spec.dialect
    }

    /// Call a generated method by name
    pub async fn invoke(&self, name: &str, args: CallArgs) -> Result<MethodOutput> {
        let method = self
            .method(name)
            .ok_or_else(|| ConnectorError::OperationNotFound(name.to_string()))?;
        method.call(args).await
    }

    /// Run an operation by id with named parameters.
    ///
    /// Goes through the interceptor pipeline but skips the response
    /// transform.
    pub async fn execute(
        &self,
        operation_id: &str,
        params: Value,
        options: CallOptions,
    ) -> Result<HttpResponse> {
        let operation = self
            .runtime
            .spec
            .find_operation(operation_id)
            .ok_or_else(|| ConnectorError::OperationNotFound(operation_id.to_string()))?;

        let binder = ArgumentBinder::new(operation, self.runtime.spec.dialect, Default::default());
        let call: BoundCall = binder.bind(CallArgs::named_with(params, options))?;
        self.runtime.execute(operation, call).await
    }
}

impl std::fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodTable")
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("apis", &self.apis.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A model attached to a connector; shares the connector's method table
#[derive(Debug, Clone)]
pub struct ModelBinding {
    name: String,
    table: Arc<MethodTable>,
}

impl ModelBinding {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &Arc<MethodTable> {
        &self.table
    }
}

impl Deref for ModelBinding {
    type Target = MethodTable;

    fn deref(&self) -> &MethodTable {
        &self.table
    }
}

/// OpenAPI connector
pub struct OpenApiConnector {
    settings: ConnectorSettings,
    observers: ObserverRegistry,
    registry: ModelRegistry,
    resolver: SpecResolver,
    transport: Option<Arc<dyn HttpTransport>>,
    table: OnceCell<Arc<MethodTable>>,
    models: RwLock<Vec<String>>,
}

impl OpenApiConnector {
    pub fn new(settings: ConnectorSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            observers: ObserverRegistry::new(),
            registry: ModelRegistry::new(),
            resolver: SpecResolver::new(),
            transport: None,
            table: OnceCell::new(),
            models: RwLock::new(Vec::new()),
        })
    }

    /// Send requests through `transport` instead of the default reqwest one
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Look named cache models up in `registry`
    pub fn with_registry(mut self, registry: ModelRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &ConnectorSettings {
        &self.settings
    }

    /// Register an observer for `event`; applies to calls made after this
    pub fn observe(&self, event: ExecuteEvent, observer: Arc<dyn ExecuteObserver>) {
        self.observers.observe(event, observer);
    }

    pub fn observe_fn<F>(&self, event: ExecuteEvent, f: F)
    where
        F: Fn(&mut ExecuteContext) -> Result<()> + Send + Sync + 'static,
    {
        self.observe(event, Arc::new(FnObserver::new(f)));
    }

    pub fn observe_async<F>(&self, event: ExecuteEvent, f: F)
    where
        F: for<'a> Fn(&'a mut ExecuteContext) -> futures::future::BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        self.observe(event, Arc::new(AsyncFnObserver::new(f)));
    }

    pub fn is_connected(&self) -> bool {
        self.table.initialized()
    }

    /// Resolve the spec and build the method table.
    ///
    /// Runs once; concurrent and later callers get the same table.
    pub async fn connect(&self) -> Result<Arc<MethodTable>> {
        self.table
            .get_or_try_init(|| self.build_table())
            .await
            .cloned()
    }

    async fn build_table(&self) -> Result<Arc<MethodTable>> {
        let settings = &self.settings;
        let source = settings.spec.as_ref().ok_or(ConnectorError::NoSpecProvided)?;

        let options = ResolveOptions {
            validate: ValidateOptions {
                schema: settings.validate,
                spec: settings.validate,
            },
        };
        let mut resolved = self
            .resolver
            .resolve(source, &options)
            .await
            .map_err(|e| match e {
                SpecError::ValidationError(errors) => ConnectorError::Validation(errors.join("; ")),
                other => ConnectorError::SpecResolution(other),
            })?;

        if settings.force_open_api30 && resolved.dialect == Dialect::SwaggerV2 {
            debug!("Converting Swagger 2.0 spec to OpenAPI 3.0");
            resolved = resolved.into_openapi3()?;
        }

        let spec = resolved.parse()?;

        let transport: Arc<dyn HttpTransport> = match &self.transport {
            Some(transport) => transport.clone(),
            None => Arc::new(ReqwestTransport::new(&settings.http_client_options)?),
        };

        let label = format!(
            "\"{}\" ({})",
            spec.title,
            settings
                .url
                .clone()
                .or_else(|| resolved.location.clone())
                .unwrap_or_default()
        );
        let cache = settings
            .cache
            .clone()
            .map(|cache| ResponseCache::new(cache, self.registry.clone(), label));

        let pipeline = InterceptorPipeline::new(
            self.observers.clone(),
            cache,
            transport,
            settings.user_agent(),
        );

        // Relative servers resolve against the spec URL, or the `url`
        // setting when the spec did not come from a URL
        let location = match source {
            SpecSource::Url(_) => resolved.location.clone(),
            _ => settings.url.clone(),
        };

        let operation_count = spec.operations.len();
        let title = spec.title.clone();
        let runtime = Arc::new(Runtime {
            spec,
            location,
            authorizations: settings.authorizations.clone(),
            positional: settings.positional,
            pipeline,
            transform: settings.transform_response.clone(),
        });

        let indexer = match &settings.map_to_methods {
            Some(policy) => OperationIndexer::with_policy(policy.clone()),
            None => OperationIndexer::new(),
        };
        let table = MethodTable::build(runtime, &indexer);

        info!(
            "Connected to {}: {} operations, {} methods, {} tags",
            title,
            operation_count,
            table.methods.len(),
            table.apis.len()
        );

        Ok(Arc::new(table))
    }

    /// Record a model to be bound to this connector
    pub fn define(&self, model: impl Into<String>) {
        let model = model.into();
        let mut models = self.models.write().unwrap_or_else(|p| p.into_inner());
        if !models.contains(&model) {
            debug!("Defined model {}", model);
            models.push(model);
        }
    }

    /// A defined model, bound to the (connected) method table
    pub async fn model(&self, name: &str) -> Result<ModelBinding> {
        let defined = self
            .models
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .any(|m| m == name);
        if !defined {
            return Err(ConnectorError::Config(format!("model {} is not defined", name)));
        }

        Ok(ModelBinding {
            name: name.to_string(),
            table: self.connect().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use connector_core::{HttpRequest, TransformResponse};
    use openapi_parser::{MapToMethods, MethodNames};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HttpTransport for EchoTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut headers = IndexMap::new();
            headers.insert("content-type".to_string(), "application/json".to_string());
            let body = json!({"method": request.method.as_str(), "url": request.url});
            Ok(HttpResponse::new(request.url, 200, "OK", headers, body.to_string()))
        }
    }

    fn spec() -> Value {
        json!({
            "openapi": "3.0.0",
            "info": {"title": "Store", "version": "1"},
            "servers": [{"url": "http://store.local"}],
            "paths": {
                "/orders": {
                    "get": {
                        "operationId": "list_orders",
                        "tags": ["orders"],
                        "responses": {"200": {"description": "ok"}}
                    }
                },
                "/orders/{id}": {
                    "get": {
                        "operationId": "getOrder",
                        "tags": ["orders", "admin"],
                        "parameters": [{"name": "id", "in": "path", "required": true, "schema": {"type": "string"}}],
                        "responses": {"200": {"description": "ok"}}
                    }
                },
                "/ping": {
                    "get": {"responses": {"200": {"description": "ok"}}}
                }
            }
        })
    }

    fn connector(settings: ConnectorSettings) -> (OpenApiConnector, Arc<EchoTransport>) {
        let transport = Arc::new(EchoTransport {
            calls: AtomicUsize::new(0),
        });
        let connector = OpenApiConnector::new(settings)
            .unwrap()
            .with_transport(transport.clone());
        (connector, transport)
    }

    #[tokio::test]
    async fn test_connect_builds_method_table() {
        let (connector, _) = connector(ConnectorSettings::with_spec(spec()));
        assert!(!connector.is_connected());

        let table = connector.connect().await.unwrap();
        assert!(connector.is_connected());
        assert!(Arc::ptr_eq(&table, &connector.connect().await.unwrap()));

        let names: Vec<&str> = table.method_names().collect();
        assert_eq!(
            names,
            vec![
                "list_orders",
                "listOrders",
                "orders_list_orders",
                "getOrder",
                "orders_getOrder",
                "admin_getOrder",
                "get_ping",
                "getPing",
                "default_get_ping",
            ]
        );
        assert!(table.api("orders", "getOrder").is_some());
        assert!(table.api("admin", "getOrder").is_some());
        assert!(table.api("default", "get_ping").is_some());
        assert_eq!(table.apis().count(), 3);
    }

    #[tokio::test]
    async fn test_no_spec_provided() {
        let (connector, _) = connector(ConnectorSettings::new());
        let err = connector.connect().await.unwrap_err();
        assert!(matches!(err, ConnectorError::NoSpecProvided));
        assert_eq!(err.to_string(), "No swagger specification provided");
    }

    #[tokio::test]
    async fn test_validation_error_surfaces() {
        let mut settings = ConnectorSettings::with_spec(json!({"openapi": "3.0.0"}));
        settings.validate = true;
        let (connector, _) = connector(settings);
        assert!(matches!(
            connector.connect().await,
            Err(ConnectorError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_invoke_and_execute_agree() {
        let (connector, transport) = connector(ConnectorSettings::with_spec(spec()));
        let table = connector.connect().await.unwrap();

        let via_method = table
            .invoke("getOrder", CallArgs::named(json!({"id": "7"})))
            .await
            .unwrap()
            .into_response()
            .unwrap();
        let via_execute = table
            .execute("getOrder", json!({"id": "7"}), CallOptions::default())
            .await
            .unwrap();

        assert_eq!(via_method, via_execute);
        assert_eq!(via_execute.body["url"], "http://store.local/orders/7");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);

        assert!(matches!(
            table.execute("nope", json!({}), CallOptions::default()).await,
            Err(ConnectorError::OperationNotFound(_))
        ));
        assert!(matches!(
            table.invoke("nope", CallArgs::default()).await,
            Err(ConnectorError::OperationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_execute_skips_transform() {
        let mut settings = ConnectorSettings::with_spec(spec());
        settings.transform_response = TransformResponse::Default;
        let (connector, _) = connector(settings);
        let table = connector.connect().await.unwrap();

        let output = table.invoke("get_ping", CallArgs::default()).await.unwrap();
        assert!(matches!(output, MethodOutput::Body(_)));

        let response = table
            .execute("get_ping", json!({}), CallOptions::default())
            .await
            .unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_custom_naming_policy() {
        let mut settings = ConnectorSettings::with_spec(spec());
        let policy: MapToMethods = Arc::new(
            |tag: Option<&str>, op: &ApiOperation, _existing: Option<&mut Vec<String>>| match tag {
                Some("admin") => MethodNames::Skip,
                _ => MethodNames::One(format!("op_{}", op.client_id)),
            },
        );
        settings.map_to_methods = Some(policy);
        let (connector, _) = connector(settings);
        let table = connector.connect().await.unwrap();

        assert!(table.method("op_getOrder").is_some());
        assert!(table.method("getOrder").is_none());
        assert!(table.api("admin", "op_getOrder").is_some());
    }

    #[tokio::test]
    async fn test_models_share_the_table() {
        let (connector, _) = connector(ConnectorSettings::with_spec(spec()));
        connector.define("Order");
        connector.define("Ping");

        let order = connector.model("Order").await.unwrap();
        let ping = connector.model("Ping").await.unwrap();
        assert_eq!(order.name(), "Order");
        assert!(Arc::ptr_eq(order.table(), ping.table()));
        assert!(order.method("getOrder").is_some());

        assert!(matches!(
            connector.model("Unknown").await,
            Err(ConnectorError::Config(_))
        ));
    }
}
