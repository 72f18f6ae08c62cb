//! Before/after execute observers

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use connector_core::{ConnectorError, HttpRequest, HttpResponse, Result};

/// Points in an invocation where observers run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecuteEvent {
    BeforeExecute,
    AfterExecute,
}

impl ExecuteEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecuteEvent::BeforeExecute => "before execute",
            ExecuteEvent::AfterExecute => "after execute",
        }
    }
}

impl fmt::Display for ExecuteEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecuteEvent {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "before execute" => Ok(ExecuteEvent::BeforeExecute),
            "after execute" => Ok(ExecuteEvent::AfterExecute),
            other => Err(ConnectorError::Config(format!("unknown operation hook `{}`", other))),
        }
    }
}

/// What observers see: the request, and after execution the response
#[derive(Debug, Clone)]
pub struct ExecuteContext {
    pub req: HttpRequest,
    pub res: Option<HttpResponse>,
}

impl ExecuteContext {
    pub fn new(req: HttpRequest) -> Self {
        Self { req, res: None }
    }
}

/// An interceptor. Returning `Ok(())` lets the invocation proceed.
#[async_trait]
pub trait ExecuteObserver: Send + Sync {
    async fn notify(&self, ctx: &mut ExecuteContext) -> Result<()>;
}

/// Observer from a synchronous closure
pub struct FnObserver<F>(F);

impl<F> FnObserver<F>
where
    F: Fn(&mut ExecuteContext) -> Result<()> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> ExecuteObserver for FnObserver<F>
where
    F: Fn(&mut ExecuteContext) -> Result<()> + Send + Sync,
{
    async fn notify(&self, ctx: &mut ExecuteContext) -> Result<()> {
        (self.0)(ctx)
    }
}

/// Observer from a closure returning a boxed future
pub struct AsyncFnObserver<F>(F);

impl<F> AsyncFnObserver<F>
where
    F: for<'a> Fn(&'a mut ExecuteContext) -> BoxFuture<'a, Result<()>> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> ExecuteObserver for AsyncFnObserver<F>
where
    F: for<'a> Fn(&'a mut ExecuteContext) -> BoxFuture<'a, Result<()>> + Send + Sync,
{
    async fn notify(&self, ctx: &mut ExecuteContext) -> Result<()> {
        (self.0)(ctx).await
    }
}

type ObserverList = Vec<Arc<dyn ExecuteObserver>>;

/// Observers per event, in registration order
#[derive(Clone, Default)]
pub struct ObserverRegistry {
    observers: Arc<RwLock<HashMap<ExecuteEvent, ObserverList>>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, event: ExecuteEvent, observer: Arc<dyn ExecuteObserver>) {
        let mut observers = self
            .observers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        observers.entry(event).or_default().push(observer);
    }

    pub fn len(&self, event: ExecuteEvent) -> usize {
        self.snapshot(event).len()
    }

    /// Run every observer for `event` in turn; the first failure stops the chain
    pub async fn notify(&self, event: ExecuteEvent, ctx: &mut ExecuteContext) -> Result<()> {
        for observer in self.snapshot(event) {
            observer.notify(ctx).await?;
        }
        Ok(())
    }

    fn snapshot(&self, event: ExecuteEvent) -> ObserverList {
        let observers = self
            .observers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        observers.get(&event).cloned().unwrap_or_default()
    }
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("before_execute", &self.len(ExecuteEvent::BeforeExecute))
            .field("after_execute", &self.len(ExecuteEvent::AfterExecute))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use openapi_parser::HttpMethod;
    use std::sync::Mutex;

    #[test]
    fn test_event_names() {
        assert_eq!("before execute".parse::<ExecuteEvent>().unwrap(), ExecuteEvent::BeforeExecute);
        assert_eq!("after execute".parse::<ExecuteEvent>().unwrap(), ExecuteEvent::AfterExecute);
        assert!("after".parse::<ExecuteEvent>().is_err());
        assert_eq!(ExecuteEvent::AfterExecute.to_string(), "after execute");
    }

    #[tokio::test]
    async fn test_observers_run_in_order_and_stop_on_error() {
        let registry = ObserverRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let log = seen.clone();
        registry.observe(
            ExecuteEvent::BeforeExecute,
            Arc::new(FnObserver::new(move |ctx: &mut ExecuteContext| {
                log.lock().unwrap().push("A");
                ctx.req.set_header("x-a", "1");
                Ok(())
            })),
        );

        let log = seen.clone();
        registry.observe(
            ExecuteEvent::BeforeExecute,
            Arc::new(AsyncFnObserver::new(move |ctx: &mut ExecuteContext| {
                let log = log.clone();
                async move {
                    tokio::task::yield_now().await;
                    log.lock().unwrap().push("B");
                    assert_eq!(ctx.req.header("x-a"), Some("1"));
                    Err(ConnectorError::Observer("stop".to_string()))
                }
                .boxed()
            })),
        );

        let log = seen.clone();
        registry.observe(
            ExecuteEvent::BeforeExecute,
            Arc::new(FnObserver::new(move |_: &mut ExecuteContext| {
                log.lock().unwrap().push("never");
                Ok(())
            })),
        );

        let mut ctx = ExecuteContext::new(HttpRequest::new(HttpMethod::Get, "http://localhost/"));
        let result = registry.notify(ExecuteEvent::BeforeExecute, &mut ctx).await;

        assert!(matches!(result, Err(ConnectorError::Observer(_))));
        assert_eq!(*seen.lock().unwrap(), vec!["A", "B"]);
        assert_eq!(registry.len(ExecuteEvent::BeforeExecute), 3);
        assert_eq!(registry.len(ExecuteEvent::AfterExecute), 0);
    }
}
