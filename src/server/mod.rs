//! The TCP front end: one Tokio task per connection, requests read and
//! answered in order until either side ends the connection.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::http::request::RequestError;
use crate::{Request, Response, Router, StatusCode};

/// Requests larger than this are refused with 413.
const MAX_REQUEST_BYTES: usize = 8 * 1024 * 1024;
const READ_CHUNK: usize = 4096;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct Server {
    listener: TcpListener,
}

impl Server {
    /// # Errors
    ///
    /// [`ServerError::Bind`] when the address is unusable.
    pub async fn bind(addr: &str) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| ServerError::Bind {
            addr: addr.to_owned(),
            source,
        })?;
        Ok(Self { listener })
    }

    /// # Errors
    ///
    /// Whatever the OS reports for the bound socket.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections forever, dispatching each request through `router`.
    /// Failed accepts are logged and skipped.
    ///
    /// # Errors
    ///
    /// Only when the listener's own address cannot be read at startup.
    pub async fn serve(self, router: Router) -> Result<(), ServerError> {
        let router = Arc::new(router);
        info!(addr = %self.local_addr()?, "listening");

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "accept failed");
                    continue;
                }
            };
            let router = Arc::clone(&router);
            tokio::spawn(async move {
                if let Err(e) = connection(stream, peer, &router).await {
                    warn!(%peer, error = %e, "connection dropped");
                }
            });
        }
    }
}

async fn connection(mut stream: TcpStream, peer: SocketAddr, router: &Router) -> std::io::Result<()> {
    debug!(%peer, "connection opened");
    let mut buf = BytesMut::with_capacity(READ_CHUNK);

    loop {
        let (request, used) = match Request::parse(&buf) {
            Ok(parsed) => parsed,
            Err(RequestError::Incomplete) if buf.len() > MAX_REQUEST_BYTES => {
                warn!(%peer, buffered = buf.len(), "request too large");
                let refusal = Response::new(StatusCode::PayloadTooLarge).keep_alive(false);
                return stream.write_all(&refusal.into_bytes()).await;
            }
            Err(RequestError::Incomplete) => {
                if stream.read_buf(&mut buf).await? == 0 {
                    debug!(%peer, "connection closed by peer");
                    return Ok(());
                }
                continue;
            }
            Err(e) => {
                warn!(%peer, error = %e, "malformed request");
                let refusal = Response::new(StatusCode::BadRequest)
                    .body(e.to_string())
                    .keep_alive(false);
                return stream.write_all(&refusal.into_bytes()).await;
            }
        };
        let _ = buf.split_to(used);

        debug!(%peer, method = %request.method(), target = %request.target(), "request");
        let client_keeps = request.is_keep_alive();
        let response = router.route(request).await;
        let keep_alive = client_keeps && response.is_keep_alive();

        stream.write_all(&response.keep_alive(keep_alive).into_bytes()).await?;
        if !keep_alive {
            return stream.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cache::{MemoryStore, cache_page};
    use crate::context::Context;

    async fn start(router: Router) -> SocketAddr {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.serve(router));
        addr
    }

    async fn exchange(addr: SocketAddr, raw: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await.unwrap();
        String::from_utf8(reply).unwrap()
    }

    fn get(target: &str) -> String {
        format!("GET {target} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
    }

    #[tokio::test]
    async fn serves_cached_pages_over_tcp() {
        let store = Arc::new(MemoryStore::new(Duration::from_secs(60)));
        let mut router = Router::new();
        router.get(
            "/ping",
            cache_page(store, Duration::from_secs(3), |_ctx: Context| async {
                Response::new(StatusCode::Ok).body("pong")
            }),
        );
        let addr = start(router).await;

        let first = exchange(addr, &get("/ping")).await;
        assert!(first.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(first.contains("X-Cache-Status: MISS\r\n"));
        assert!(first.contains("Connection: close\r\n"));
        assert!(first.ends_with("\r\n\r\npong"));

        let second = exchange(addr, &get("/ping")).await;
        assert!(second.contains("X-Cache-Status: HIT\r\n"));
        assert!(second.ends_with("\r\n\r\npong"));
    }

    #[tokio::test]
    async fn pipelined_requests_are_answered_in_order() {
        let mut router = Router::new();
        router.post("/echo", |ctx: Context| async move {
            Response::new(StatusCode::Ok).body_bytes(ctx.request().body().to_vec())
        });
        let addr = start(router).await;

        let raw = "POST /echo HTTP/1.1\r\nContent-Length: 3\r\n\r\none\
                   POST /echo HTTP/1.1\r\nContent-Length: 3\r\nConnection: close\r\n\r\ntwo";
        let replies = exchange(addr, raw).await;
        let one = replies.find("\r\n\r\none").unwrap();
        let two = replies.find("\r\n\r\ntwo").unwrap();
        assert!(one < two);
        assert_eq!(replies.matches("HTTP/1.1 200 OK").count(), 2);
    }

    #[tokio::test]
    async fn malformed_request_gets_400_and_close() {
        let addr = start(Router::new()).await;
        let reply = exchange(addr, "GET /\u{1} HTTP/1.1\r\n\r\n").await;
        assert!(reply.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(reply.contains("Connection: close\r\n"));
    }
}
