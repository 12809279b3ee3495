//! Method and path dispatch.
//!
//! Patterns are `/`-separated literals with optional `:name` captures, so
//! `/users/:id` matches `/users/42` with `id = "42"`. Empty segments are
//! ignored on both sides, which makes `/users/` and `/users` the same path.
//! Routes are tried in registration order and the first match wins.

use std::future::Future;
use std::sync::Arc;

use crate::context::{Context, PathParams};
use crate::middleware::{BoxResponse, Middleware, MiddlewareHandler, Next, from_middleware};
use crate::{Method, Request, Response, StatusCode};

/// Anything the router can call with a [`Context`].
///
/// Implemented for every `Fn(Context) -> impl Future<Output = Response>`, and
/// returned by the cache wrappers so a cached handler registers like any other.
pub trait IntoHandler: Send + Sync + 'static {
    fn call(&self, ctx: Context) -> BoxResponse;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> BoxResponse {
        Box::pin(self(ctx))
    }
}

enum Segment {
    Literal(String),
    Capture(String),
}

struct Route {
    method: Method,
    segments: Vec<Segment>,
    handler: Arc<dyn IntoHandler>,
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

impl Route {
    fn new(method: Method, pattern: &str, handler: Arc<dyn IntoHandler>) -> Self {
        let segments = segments(pattern)
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) => Segment::Capture(name.to_owned()),
                None => Segment::Literal(segment.to_owned()),
            })
            .collect();
        Self {
            method,
            segments,
            handler,
        }
    }

    fn captures(&self, method: &Method, path: &str) -> Option<PathParams> {
        if self.method != *method {
            return None;
        }
        let mut parts = segments(path);
        let mut captured = Vec::new();
        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(literal) if literal != part => return None,
                Segment::Literal(_) => {}
                Segment::Capture(name) => captured.push((name.clone(), part.to_owned())),
            }
        }
        match parts.next() {
            Some(_) => None,
            None => Some(captured.into_iter().collect()),
        }
    }
}

/// Routes plus the layers that wrap every dispatch.
///
/// ```rust
/// use pagecache::context::Context;
/// use pagecache::{Response, Router, StatusCode};
///
/// let mut router = Router::new();
/// router.get("/users/:id", |ctx: Context| async move {
///     let id = ctx.params().get("id").unwrap_or_default().to_owned();
///     Response::new(StatusCode::Ok).body(id)
/// });
/// assert_eq!(router.len(), 1);
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
    layers: Vec<MiddlewareHandler>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a layer around every dispatch, matched or not. The first layer
    /// added is the outermost.
    pub fn layer<M: Middleware + 'static>(&mut self, middleware: Arc<M>) {
        self.layers.push(from_middleware(middleware));
    }

    pub fn get(&mut self, pattern: &str, handler: impl IntoHandler) {
        self.add(Method::Get, pattern, handler);
    }

    pub fn post(&mut self, pattern: &str, handler: impl IntoHandler) {
        self.add(Method::Post, pattern, handler);
    }

    fn add(&mut self, method: Method, pattern: &str, handler: impl IntoHandler) {
        self.routes.push(Route::new(method, pattern, Arc::new(handler)));
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Runs `request` through the layers into the first matching route, or
    /// into a 404 when nothing matches.
    pub async fn route(&self, request: Request) -> Response {
        let matched = self.routes.iter().find_map(|route| {
            let params = route.captures(request.method(), request.path())?;
            Some((Arc::clone(&route.handler), params))
        });
        let (ctx, handler) = match matched {
            Some((handler, params)) => (Context::with_params(request, params), Some(handler)),
            None => (Context::new(request), None),
        };

        let endpoint: MiddlewareHandler =
            Arc::new(move |ctx: Context, _next: Next| -> BoxResponse {
                match &handler {
                    Some(handler) => handler.call(ctx),
                    None => Box::pin(async { Response::new(StatusCode::NotFound) }),
                }
            });

        let mut chain = self.layers.clone();
        chain.push(endpoint);
        Next::new(chain).run(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: &str, target: &str) -> Request {
        let raw = format!("{method} {target} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        Request::parse(raw.as_bytes()).unwrap().0
    }

    fn text(response: &Response) -> &str {
        std::str::from_utf8(response.body_ref()).unwrap()
    }

    fn reply(body: &'static str) -> impl IntoHandler {
        move |_ctx: Context| async move { Response::new(StatusCode::Ok).body(body) }
    }

    #[tokio::test]
    async fn literal_paths_ignore_trailing_slashes() {
        let mut router = Router::new();
        router.get("/", reply("root"));
        router.get("/users/", reply("users"));

        assert_eq!(text(&router.route(request("GET", "/")).await), "root");
        assert_eq!(text(&router.route(request("GET", "/users")).await), "users");
        assert_eq!(text(&router.route(request("GET", "/users/")).await), "users");
        assert_eq!(
            router.route(request("GET", "/users/7")).await.status(),
            StatusCode::NotFound
        );
    }

    #[tokio::test]
    async fn captures_fill_path_params() {
        let mut router = Router::new();
        router.get("/orgs/:org/repos/:repo", |ctx: Context| async move {
            let org = ctx.params().get("org").unwrap_or_default();
            let repo = ctx.params().get("repo").unwrap_or_default();
            Response::new(StatusCode::Ok).body(format!("{org}/{repo}"))
        });

        let response = router.route(request("GET", "/orgs/acme/repos/cache?tab=1")).await;
        assert_eq!(text(&response), "acme/cache");
        assert_eq!(
            router.route(request("GET", "/orgs/acme/repos")).await.status(),
            StatusCode::NotFound
        );
        assert_eq!(
            router.route(request("GET", "/orgs/acme/issues/cache")).await.status(),
            StatusCode::NotFound
        );
    }

    #[tokio::test]
    async fn method_must_match() {
        let mut router = Router::new();
        router.get("/note", reply("read"));
        router.post("/note", reply("written"));

        assert_eq!(text(&router.route(request("GET", "/note")).await), "read");
        assert_eq!(text(&router.route(request("POST", "/note")).await), "written");
        assert_eq!(
            router.route(request("DELETE", "/note")).await.status(),
            StatusCode::NotFound
        );
        assert_eq!(router.len(), 2);
    }

    #[tokio::test]
    async fn first_registered_route_wins() {
        let mut router = Router::new();
        router.get("/items/:id", reply("capture"));
        router.get("/items/new", reply("literal"));
        assert_eq!(text(&router.route(request("GET", "/items/new")).await), "capture");
    }

    struct Tag(&'static str);

    impl Middleware for Tag {
        fn handle(&self, ctx: Context, next: Next) -> BoxResponse {
            let name = self.0;
            Box::pin(async move {
                let mut response = next.run(ctx).await;
                response.add_header("X-Layer", name);
                response
            })
        }
    }

    #[tokio::test]
    async fn layers_wrap_matched_and_unmatched_routes() {
        let mut router = Router::new();
        router.layer(Arc::new(Tag("outer")));
        router.layer(Arc::new(Tag("inner")));
        router.get("/ping", reply("pong"));

        for (target, status) in [("/ping", StatusCode::Ok), ("/nope", StatusCode::NotFound)] {
            let response = router.route(request("GET", target)).await;
            assert_eq!(response.status(), status);
            let layers: Vec<_> = response.headers().get_all("x-layer").collect();
            assert_eq!(layers, ["inner", "outer"]);
        }
    }
}
