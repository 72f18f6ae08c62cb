//! Interceptor pipeline wrapped around every transport round trip
//!
//! Order per invocation:
//! 1. `User-Agent` is set, then `before execute` observers run
//! 2. GET requests are looked up in the response cache
//! 3. On a miss the transport sends the request
//! 4. `after execute` observers run
//! 5. GET responses are written back to the cache

mod cache;
mod hooks;

pub use cache::{cache_key, ResponseCache};
pub use hooks::{
    AsyncFnObserver, ExecuteContext, ExecuteEvent, ExecuteObserver, FnObserver, ObserverRegistry,
};

use std::sync::Arc;
use tracing::debug;

use connector_core::{ConnectorError, HttpRequest, HttpResponse, Result};

use crate::transport::HttpTransport;

pub struct InterceptorPipeline {
    observers: ObserverRegistry,
    cache: Option<ResponseCache>,
    transport: Arc<dyn HttpTransport>,
    user_agent: String,
}

impl InterceptorPipeline {
    pub fn new(
        observers: ObserverRegistry,
        cache: Option<ResponseCache>,
        transport: Arc<dyn HttpTransport>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            observers,
            cache,
            transport,
            user_agent: user_agent.into(),
        }
    }

    pub async fn execute(&self, req: HttpRequest) -> Result<HttpResponse> {
        let mut ctx = ExecuteContext::new(req);
        ctx.req.set_header("User-Agent", self.user_agent.clone());

        self.observers
            .notify(ExecuteEvent::BeforeExecute, &mut ctx)
            .await?;

        let key = match &self.cache {
            Some(_) => cache_key(&ctx.req),
            None => None,
        };

        let cached = match (&self.cache, &key) {
            (Some(cache), Some(key)) => cache.lookup(key).await?,
            _ => None,
        };

        let response = match cached {
            Some(response) => response,
            None => self.transport.send(ctx.req.clone()).await?,
        };
        ctx.res = Some(response);

        self.observers
            .notify(ExecuteEvent::AfterExecute, &mut ctx)
            .await?;

        let response = ctx.res.take().ok_or_else(|| {
            ConnectorError::Observer("an after execute observer removed the response".to_string())
        })?;

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            debug!("Caching response for {}", key);
            cache.update(key, &response).await?;
        }

        Ok(response)
    }
}
