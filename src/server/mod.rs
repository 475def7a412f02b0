//! Async TCP server using Tokio.
//!
//! Accepts connections and dispatches HTTP/1.1 requests to a handler function,
//! keeping connections alive between requests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::http::{
    StatusCode,
    request::{Request, RequestError},
    response::Response,
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Default cap on a buffered request, headers plus body (8 MiB).
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 8 * 1024 * 1024;

const INITIAL_BUF_SIZE: usize = 4096;

/// The proxy's HTTP listener.
///
/// ```rust,no_run
/// use dataproxy::server::Server;
/// use dataproxy::http::{Response, StatusCode};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = Server::bind("127.0.0.1:3000").await?;
///     server
///         .run_until(
///             |_req| async { Response::new(StatusCode::NoContent) },
///             async { let _ = tokio::signal::ctrl_c().await; },
///         )
///         .await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    max_request_bytes: usize,
}

impl Server {
    /// Binds a listener to `addr`.
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_owned(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        })
    }

    /// Requests larger than `limit` bytes are answered with 413 and the
    /// connection is closed.
    #[must_use]
    pub fn max_request_bytes(mut self, limit: usize) -> Self {
        self.max_request_bytes = limit.max(1);
        self
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves until the listener fails.
    pub async fn run<H, F>(self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.run_until(handler, std::future::pending()).await
    }

    /// Serves until `shutdown` resolves. Connections already accepted keep
    /// running on their own tasks.
    pub async fn run_until<H, F, S>(self, handler: H, shutdown: S) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
        S: Future<Output = ()> + Send,
    {
        let handler = Arc::new(handler);
        let limit = self.max_request_bytes;
        info!(address = %self.local_addr, max_request_bytes = limit, "proxy listening");

        tokio::pin!(shutdown);
        loop {
            let accepted = tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, no longer accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => accepted,
            };

            let (stream, peer_addr) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, handler, limit).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

async fn handle_connection<H, F>(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<H>,
    max_request_bytes: usize,
) -> Result<(), std::io::Error>
where
    H: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        // Drain every complete request already buffered before reading again.
        let parsed = match Request::parse(&buf) {
            Ok((request, body_offset)) => {
                let needed = body_offset.saturating_add(request.content_length().unwrap_or(0));
                if needed > max_request_bytes {
                    warn!(peer = %peer_addr, size = needed, "request too large, sending 413");
                    stream.write_all(&payload_too_large().into_bytes()).await?;
                    break;
                }
                (buf.len() >= needed).then_some((request, needed))
            }
            Err(RequestError::Incomplete) => None,
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "malformed request, sending 400");
                let response = Response::error(StatusCode::BadRequest, e.to_string()).keep_alive(false);
                stream.write_all(&response.into_bytes()).await?;
                break;
            }
        };

        let Some((request, consumed)) = parsed else {
            if buf.len() > max_request_bytes {
                warn!(peer = %peer_addr, buffered = buf.len(), "request too large, sending 413");
                stream.write_all(&payload_too_large().into_bytes()).await?;
                break;
            }
            if stream.read_buf(&mut buf).await? == 0 {
                debug!(peer = %peer_addr, "connection closed by peer");
                break;
            }
            continue;
        };

        let keep_alive = request.is_keep_alive();
        debug!(
            peer = %peer_addr,
            method = %request.method(),
            path = %request.path(),
            "dispatching request"
        );

        let response = handler(request).await.keep_alive(keep_alive);
        stream.write_all(&response.into_bytes()).await?;
        stream.flush().await?;

        let _ = buf.split_to(consumed);

        if !keep_alive {
            break;
        }
    }

    Ok(())
}

fn payload_too_large() -> Response {
    Response::error(StatusCode::PayloadTooLarge, "request entity too large").keep_alive(false)
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    use super::*;

    async fn start(limit: usize) -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
        let server = Server::bind("127.0.0.1:0").await.unwrap().max_request_bytes(limit);
        let addr = server.local_addr();
        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            server
                .run_until(
                    |req: Request| async move {
                        Response::new(StatusCode::Ok).body_bytes(req.body().to_vec())
                    },
                    async {
                        let _ = rx.await;
                    },
                )
                .await
                .unwrap();
        });
        (addr, tx, task)
    }

    async fn exchange(addr: SocketAddr, raw: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw).await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn echoes_body() {
        let (addr, stop, task) = start(DEFAULT_MAX_REQUEST_BYTES).await;
        let out = exchange(
            addr,
            b"POST /v1/x/graphql HTTP/1.1\r\nConnection: close\r\nContent-Length: 2\r\n\r\n{}",
        )
        .await;
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.ends_with("\r\n\r\n{}"));

        stop.send(()).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn pipelined_requests_are_answered_in_order() {
        let (addr, _stop, _task) = start(DEFAULT_MAX_REQUEST_BYTES).await;
        let out = exchange(
            addr,
            b"POST / HTTP/1.1\r\nContent-Length: 1\r\n\r\nA\
              POST / HTTP/1.1\r\nContent-Length: 1\r\nConnection: close\r\n\r\nB",
        )
        .await;
        assert_eq!(out.matches("HTTP/1.1 200 OK").count(), 2);
        let first = out.find("\r\n\r\nA").unwrap();
        let second = out.find("\r\n\r\nB").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn oversized_request_is_413() {
        let (addr, _stop, _task) = start(64).await;
        let body = "x".repeat(200);
        let raw = format!("POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n{body}", body.len());
        let out = exchange(addr, raw.as_bytes()).await;
        assert!(out.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
    }

    #[tokio::test]
    async fn overflowing_content_length_is_413() {
        let (addr, _stop, _task) = start(DEFAULT_MAX_REQUEST_BYTES).await;
        let out = exchange(
            addr,
            b"POST / HTTP/1.1\r\nContent-Length: 18446744073709551615\r\n\r\n",
        )
        .await;
        assert!(out.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
    }

    #[tokio::test]
    async fn garbage_is_400() {
        let (addr, _stop, _task) = start(DEFAULT_MAX_REQUEST_BYTES).await;
        let out = exchange(addr, b"\x01\x02 nonsense\r\n\r\n").await;
        assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }
}
