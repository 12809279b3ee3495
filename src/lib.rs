//! # pagecache
//!
//! Response caching for an async HTTP/1.1 server: the first request to a cached
//! route runs its handler and stores the response, later requests are answered
//! from the store until the entry expires.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use pagecache::cache::{MemoryStore, cache_page};
//! use pagecache::context::Context;
//! use pagecache::{Response, Router, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new(Duration::from_secs(60)));
//!
//!     let mut router = Router::new();
//!     router.get(
//!         "/ping",
//!         cache_page(store, Duration::from_secs(3), |_ctx: Context| async {
//!             Response::new(StatusCode::Ok).body("pong")
//!         }),
//!     );
//!
//!     Server::bind("127.0.0.1:8080").await?.serve(router).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod context;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;

pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
