//! Layers that run around route dispatch.
//!
//! The router turns its layers into a chain of [`MiddlewareHandler`]s and puts
//! the matched handler last. Each layer gets a [`Next`] and decides whether to
//! call it; [`CacheMiddleware`](crate::cache::CacheMiddleware) and
//! [`SiteCache`](crate::cache::SiteCache) are the cache's own layers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::info;

use crate::context::Context;
use crate::http::{Response, StatusCode};

/// The future every handler and layer hands back.
pub type BoxResponse = Pin<Box<dyn Future<Output = Response> + Send>>;

/// One link of a chain, erased so layers and the final handler share a type.
pub type MiddlewareHandler = Arc<dyn Fn(Context, Next) -> BoxResponse + Send + Sync>;

/// A layer around the rest of the chain.
///
/// ```rust,no_run
/// use pagecache::context::Context;
/// use pagecache::middleware::{BoxResponse, Middleware, Next};
///
/// struct PoweredBy;
///
/// impl Middleware for PoweredBy {
///     fn handle(&self, ctx: Context, next: Next) -> BoxResponse {
///         Box::pin(async move {
///             let mut response = next.run(ctx).await;
///             response.add_header("X-Powered-By", "pagecache");
///             response
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: Context, next: Next) -> BoxResponse;
}

pub fn from_middleware<M: Middleware + 'static>(middleware: Arc<M>) -> MiddlewareHandler {
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

/// The part of the chain after the current layer.
pub struct Next {
    chain: Arc<[MiddlewareHandler]>,
    position: usize,
}

impl Next {
    pub fn new(chain: Vec<MiddlewareHandler>) -> Self {
        Self {
            chain: chain.into(),
            position: 0,
        }
    }

    /// Calls the next link. Running off the end of a chain is a wiring error
    /// and answers 500.
    pub async fn run(self, ctx: Context) -> Response {
        let Some(link) = self.chain.get(self.position).cloned() else {
            return Response::new(StatusCode::InternalServerError)
                .body("middleware chain ended without a response");
        };
        let rest = Self {
            chain: self.chain,
            position: self.position + 1,
        };
        link(ctx, rest).await
    }
}

/// Logs one structured line per request once the response is known.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> BoxResponse {
        Box::pin(async move {
            let started = Instant::now();
            let method = ctx.request().method().to_string();
            let target = ctx.request().target();

            let response = next.run(ctx).await;
            info!(
                method = %method,
                target = %target,
                status = response.status().as_u16(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "request served"
            );
            response
        })
    }
}
