//! Generated operation methods

use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use connector_core::{ConnectorError, HttpResponse, Positional, Result, TransformResponse};
use openapi_parser::{ApiOperation, Authorization, ParsedSpec};

use crate::binder::{ArgumentBinder, BoundCall, CallArgs};
use crate::pipeline::InterceptorPipeline;
use crate::request::RequestBuilder;

/// What a generated method resolves to
#[derive(Debug, Clone, PartialEq)]
pub enum MethodOutput {
    /// The full response, when no transform is configured
    Response(HttpResponse),
    /// The transformed result
    Body(Value),
}

impl MethodOutput {
    /// The response body, whichever variant this is
    pub fn body(&self) -> &Value {
        match self {
            MethodOutput::Response(response) => &response.body,
            MethodOutput::Body(body) => body,
        }
    }

    pub fn into_response(self) -> Option<HttpResponse> {
        match self {
            MethodOutput::Response(response) => Some(response),
            MethodOutput::Body(_) => None,
        }
    }
}

/// Body for status < 400, an HTTP error carrying the response otherwise
pub fn default_transform(response: HttpResponse) -> Result<Value> {
    if response.status < 400 {
        return Ok(response.body);
    }
    Err(ConnectorError::Http {
        message: format!("{} {}", response.status, response.status_text),
        details: Box::new(response),
    })
}

/// State shared by every method of one connection
pub(crate) struct Runtime {
    pub(crate) spec: ParsedSpec,
    /// Base for relative server URLs
    pub(crate) location: Option<String>,
    pub(crate) authorizations: IndexMap<String, Authorization>,
    pub(crate) positional: Positional,
    pub(crate) pipeline: InterceptorPipeline,
    pub(crate) transform: TransformResponse,
}

impl Runtime {
    /// Build the request and run it through the pipeline, untransformed
    pub(crate) async fn execute(&self, operation: &ApiOperation, call: BoundCall) -> Result<HttpResponse> {
        let request = RequestBuilder::new(
            &self.spec,
            self.location.as_deref(),
            &self.authorizations,
        )
        .build(operation, &call)?;

        debug!("Invoking {} ({} {})", operation.operation_id, request.method, request.url);
        self.pipeline.execute(request).await
    }

    fn transform(&self, response: HttpResponse, operation: &ApiOperation) -> Result<MethodOutput> {
        match &self.transform {
            TransformResponse::None => Ok(MethodOutput::Response(response)),
            TransformResponse::Default => default_transform(response).map(MethodOutput::Body),
            TransformResponse::Custom(transform) => transform(response, operation).map(MethodOutput::Body),
        }
    }
}

struct MethodInner {
    operation: ApiOperation,
    binder: ArgumentBinder,
    runtime: Arc<Runtime>,
}

/// A callable bound to one operation.
///
/// Cloning is cheap; clones share the operation and the connection.
#[derive(Clone)]
pub struct OperationMethod {
    inner: Arc<MethodInner>,
}

impl OperationMethod {
    pub(crate) fn new(operation: ApiOperation, runtime: Arc<Runtime>) -> Self {
        let binder = ArgumentBinder::new(&operation, runtime.spec.dialect, runtime.positional);
        Self {
            inner: Arc::new(MethodInner {
                operation,
                binder,
                runtime,
            }),
        }
    }

    pub fn operation(&self) -> &ApiOperation {
        &self.inner.operation
    }

    /// Argument order for positional calls
    pub fn arg_names(&self) -> &[String] {
        self.inner.binder.arg_names()
    }

    /// Invoke and await the (possibly transformed) result
    pub async fn call(&self, args: CallArgs) -> Result<MethodOutput> {
        let response = self.send(args).await?;
        self.inner.runtime.transform(response, &self.inner.operation)
    }

    /// Invoke on a spawned task and hand the result to `callback`.
    ///
    /// A failing response transform does not fail the call here: the
    /// untransformed response is delivered instead.
    pub fn call_with_callback<F>(&self, args: CallArgs, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<MethodOutput>) + Send + 'static,
    {
        let method = self.clone();
        tokio::spawn(async move {
            let result = match method.send(args).await {
                Ok(response) => {
                    let inner = &method.inner;
                    match inner.runtime.transform(response.clone(), &inner.operation) {
                        Ok(output) => Ok(output),
                        Err(e) => {
                            warn!(
                                "Response transform failed for {}: {}",
                                inner.operation.operation_id, e
                            );
                            Ok(MethodOutput::Response(response))
                        }
                    }
                }
                Err(e) => Err(e),
            };
            callback(result);
        })
    }

    async fn send(&self, args: CallArgs) -> Result<HttpResponse> {
        let call = self.inner.binder.bind(args)?;
        self.inner.runtime.execute(&self.inner.operation, call).await
    }
}

impl std::fmt::Debug for OperationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationMethod")
            .field("operation_id", &self.inner.operation.operation_id)
            .field("arg_names", &self.arg_names())
            .finish()
    }
}
