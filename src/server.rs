//! HTTP server and graceful shutdown.
//!
//! On SIGTERM or Ctrl-C the server:
//! 1. Immediately stops `listener.accept()`; no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns from [`Server::serve`], which lets `main` exit cleanly.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::failure::Failure;
use crate::request::Request;

/// Default cap on a request body, in bytes.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
    body_limit: usize,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    pub fn bind(addr: SocketAddr) -> Self {
        Self { addr, body_limit: DEFAULT_BODY_LIMIT }
    }

    /// Largest accepted request body. Bigger bodies are answered with 413.
    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Starts accepting connections and feeding them to `dispatcher`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, dispatcher: Dispatcher) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let dispatcher = Arc::new(dispatcher);
        let body_limit = self.body_limit;

        info!(addr = %self.addr, "tollgate listening");

        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a SIGTERM stops accepting at once,
                // even if more connections are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let dispatcher = Arc::clone(&dispatcher);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let dispatcher = Arc::clone(&dispatcher);
                            async move { serve_one(&dispatcher, req, body_limit).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("tollgate stopped");
        Ok(())
    }
}

// ── Request conversion ────────────────────────────────────────────────────────

/// Reads one hyper request and answers it. Never errors: every problem ends
/// up as an error envelope.
async fn serve_one<B>(
    dispatcher: &Dispatcher,
    req: http::Request<B>,
    body_limit: usize,
) -> Result<http::Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = req.into_parts();
    let target = parts.uri.path_and_query().map_or("/", |pq| pq.as_str()).to_owned();

    let response = match Limited::new(body, body_limit).collect().await {
        Err(e) if e.is::<LengthLimitError>() => {
            dispatcher.reject(&Failure::payload_too_large(), &target)
        }
        Err(e) => dispatcher.reject(&Failure::validation(format!("unreadable body: {e}")), &target),
        Ok(collected) => match Request::from_http(&parts, &collected.to_bytes()) {
            Ok(request) => dispatcher.dispatch(request).await,
            Err(failure) => dispatcher.reject(&failure, &target),
        },
    };

    Ok(response.into_http())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C). On Windows only Ctrl-C
/// is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::handler::Args;
    use crate::pipe::Binding;
    use crate::router::{Route, Router};

    fn echo() -> Arc<Dispatcher> {
        let router = Router::new().route(
            Route::post("/echo", |mut args: Args| async move { args.take::<Value>("body") })
                .bind(Binding::body()),
        );
        Arc::new(Dispatcher::builder(router).build())
    }

    fn request(method: &str, body: &'static str) -> http::Request<Full<Bytes>> {
        http::Request::builder()
            .method(method)
            .uri("/echo")
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap()
    }

    /// Runs `serve_one` on a spawned task, as the connection loop does.
    async fn send(req: http::Request<Full<Bytes>>, body_limit: usize) -> (u16, Value) {
        let dispatcher = echo();
        let res = tokio::spawn(async move { serve_one(&dispatcher, req, body_limit).await })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(res.headers()[http::header::CONTENT_TYPE], "application/json; charset=utf-8");
        let status = res.status().as_u16();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn json_bodies_reach_the_handler() {
        let (status, body) = send(request("POST", r#"{"a":1}"#), DEFAULT_BODY_LIMIT).await;
        assert_eq!(status, 201);
        assert_eq!(body, json!({"a": 1}));
    }

    #[tokio::test]
    async fn malformed_json_and_unknown_methods_get_envelopes() {
        let (status, body) = send(request("POST", "{nope"), DEFAULT_BODY_LIMIT).await;
        assert_eq!(status, 400);
        assert_eq!(body["path"], json!("/echo"));

        let (status, body) = send(request("OPTIONS", ""), DEFAULT_BODY_LIMIT).await;
        assert_eq!(status, 404);
        assert_eq!(body["message"], json!("Cannot OPTIONS /echo"));
    }

    #[tokio::test]
    async fn oversized_bodies_are_rejected_with_413() {
        let (status, body) = send(request("POST", r#"{"a":"0123456789"}"#), 8).await;
        assert_eq!(status, 413);
        assert_eq!(body["message"], json!("Payload Too Large"));

        let (status, _) = send(request("POST", r#"{"a":1}"#), 7).await;
        assert_eq!(status, 201);
    }
}
