//! A small server with cached and uncached routes.
//!
//! ```text
//! RUST_LOG=pagecache=debug cargo run --example cached_server
//! curl -i localhost:8080/ping          # X-Cache-Status: MISS, then HIT for 5s
//! curl -i 'localhost:8080/search?q=a'  # query-insensitive cache
//! curl -i -X POST localhost:8080/purge # flushes the store
//! ```

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use pagecache::cache::{
    CacheHandle, CacheMiddleware, CachePage, CacheStore, MemoryStore, cache_page,
    cache_page_atomic,
};
use pagecache::context::Context;
use pagecache::middleware::LoggerMiddleware;
use pagecache::{Response, Router, Server, StatusCode};
use tracing_subscriber::EnvFilter;

fn now_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new(Duration::from_secs(60)));

    let mut router = Router::new();
    router.layer(Arc::new(LoggerMiddleware));
    router.layer(Arc::new(CacheMiddleware::new(store.clone())));

    router.get(
        "/ping",
        cache_page(store.clone(), Duration::from_secs(5), |_ctx: Context| async {
            Response::new(StatusCode::Ok).body(format!("pong {}", now_nanos()))
        }),
    );

    router.get(
        "/search",
        CachePage::new(store.clone(), Duration::from_secs(30))
            .without_query()
            .wrap(|ctx: Context| async move {
                let q = ctx.request().query_param("q").unwrap_or("").to_owned();
                let body = serde_json::json!({ "q": q, "at": now_nanos() as u64 });
                Response::json(StatusCode::Ok, &body)
                    .unwrap_or_else(|_| Response::new(StatusCode::InternalServerError))
            }),
    );

    router.get(
        "/report",
        cache_page_atomic(store.clone(), Duration::from_secs(10), |_ctx: Context| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Response::new(StatusCode::Ok).body(format!("report {}", now_nanos()))
        }),
    );

    router.post("/purge", |ctx: Context| async move {
        match ctx.extensions().get::<CacheHandle>().map(|cache| cache.store().flush()) {
            Some(Ok(())) => Response::new(StatusCode::NoContent),
            _ => Response::new(StatusCode::InternalServerError),
        }
    });

    let server = Server::bind("127.0.0.1:8080").await?;
    tracing::info!(address = %server.local_addr()?, "cached_server ready");
    server.serve(router).await?;
    Ok(())
}
