//! # HTTP Server
//!
//! Thin hyper adapter in front of [`Application`].
//!
//! The accept loop handles each connection on its own task, logs the
//! request line, and drains active connections on ctrl-c before returning.
//! Dispatch itself is synchronous; the only async work is reading the
//! request off the wire.

use crate::application::Application;
use crate::error::{Error, Result};
use crate::request::Request;
use crate::response::Response;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::StatusCode;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub address: SocketAddr,
    /// Enable keep-alive connections
    pub keep_alive: bool,
    /// Shutdown timeout for graceful shutdown (default: 30 seconds)
    pub shutdown_timeout: Duration,
    /// Max request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 8000).into(),
            keep_alive: true,
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 1024 * 1024,
        }
    }
}

/// HTTP server serving one [`Application`]
pub struct Server {
    config: ServerConfig,
    app: Arc<Application>,
}

impl Server {
    /// Create a server over a configured application
    #[must_use]
    pub fn new(app: Application) -> Self {
        Self {
            config: ServerConfig::default(),
            app: Arc::new(app),
        }
    }

    /// Bind the server to an address
    #[must_use]
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.config.address = addr;
        self
    }

    /// Set max request body size
    pub fn set_max_body_size(&mut self, bytes: usize) {
        self.config.max_body_size = bytes;
    }

    /// Start the server with graceful shutdown
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bind`] when the address is unavailable, or an IO
    /// error from the socket setup.
    pub async fn serve(&self) -> Result<()> {
        let addr = self.config.address;

        let socket = tokio::net::TcpSocket::new_v4()?;
        socket.set_reuseaddr(true)?;
        #[cfg(not(windows))]
        {
            socket.set_reuseport(true)?;
        }
        socket.bind(addr).map_err(|source| Error::Bind {
            address: addr.to_string(),
            source,
        })?;
        let listener = socket.listen(1024)?;

        info!("Server listening on http://{}", addr);

        let active = Arc::new(AtomicUsize::new(0));
        let keep_alive = self.config.keep_alive;
        let max_body_size = self.config.max_body_size;

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, remote_addr) = accept_result?;
                    let io = TokioIo::new(stream);

                    let app = self.app.clone();
                    let active = active.clone();

                    tokio::task::spawn(async move {
                        active.fetch_add(1, Ordering::Relaxed);

                        if let Err(err) = http1::Builder::new()
                            .keep_alive(keep_alive)
                            .serve_connection(io, service_fn(move |req| {
                                let app = app.clone();
                                async move {
                                    handle_request(req, &app, remote_addr, max_body_size).await
                                }
                            }))
                            .await
                        {
                            error!("Error serving connection: {:?}", err);
                        }
                        active.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                _ = shutdown_signal() => {
                    info!("Shutdown signal received, stopping server...");
                    break;
                }
            }
        }

        let timeout = self.config.shutdown_timeout;
        let drain = async {
            loop {
                if active.load(Ordering::Relaxed) == 0 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        let _ = tokio::time::timeout(timeout, drain).await;
        Ok(())
    }

    /// Execute a test request directly without the network stack
    #[must_use]
    pub fn test_request(
        &self,
        method: crate::request::Method,
        path: String,
        headers: std::collections::HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Response {
        if let Some(b) = body.as_ref() {
            if b.len() > self.config.max_body_size {
                return payload_too_large();
            }
        }
        let req = Request::new(method, path, headers, body);
        self.app.handle(&req)
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
}

async fn handle_request(
    req: hyper::Request<hyper::body::Incoming>,
    app: &Application,
    remote_addr: SocketAddr,
    max_body_size: usize,
) -> std::result::Result<hyper::Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let version = format!("{:?}", req.version());

    let response = match Request::from_hyper_with_limit(req, max_body_size).await {
        Ok(request) => app.handle(&request),
        Err(Error::Payload { .. }) => payload_too_large(),
        Err(e) => {
            error!("Failed to parse request: {}", e);
            Response::json(&serde_json::json!({"message": "Bad Request"})).with_status(400)
        }
    };

    info!(
        "    {} - \"{} {} {}\" {}",
        remote_addr, method, path, version, response.status
    );
    Ok(into_hyper(response))
}

fn payload_too_large() -> Response {
    Response::json(&serde_json::json!({"message": "Payload Too Large"})).with_status(413)
}

/// Convert a framework response to the wire format
fn into_hyper(resp: Response) -> hyper::Response<Full<Bytes>> {
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = hyper::Response::builder()
        .status(status)
        .header("Content-Type", &resp.content_type);
    for (k, v) in &resp.headers {
        if !k.eq_ignore_ascii_case("content-type") {
            builder = builder.header(k.as_str(), v.as_str());
        }
    }

    builder
        .body(Full::new(Bytes::from(resp.body)))
        .unwrap_or_else(|_| {
            hyper::Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Full::new(Bytes::from("Internal Server Error")))
                .unwrap()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::pages::PageOutput;
    use crate::request::Method;
    use std::collections::HashMap;

    fn demo_app() -> Application {
        Application::configure(Config::new())
            .pages(|p| {
                p.register("home", |_req: &Request| {
                    Ok(PageOutput::Body("welcome".to_string()))
                });
            })
            .main("home")
            .build()
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.address.port(), 8000);
        assert!(config.keep_alive);
        assert_eq!(config.max_body_size, 1024 * 1024);
    }

    #[test]
    fn test_test_request_dispatches() {
        let server = Server::new(demo_app());
        let resp = server.test_request(Method::Get, "/".to_string(), HashMap::new(), None);

        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "welcome");
    }

    #[test]
    fn test_test_request_oversized_body() {
        let mut server = Server::new(demo_app());
        server.set_max_body_size(4);

        let resp = server.test_request(
            Method::Post,
            "/".to_string(),
            HashMap::new(),
            Some(Bytes::from_static(b"too large")),
        );
        assert_eq!(resp.status, 413);
    }

    #[test]
    fn test_into_hyper_preserves_status_and_headers() {
        let resp = Response::text("x")
            .with_status(418)
            .with_header("x-request-id", "1");
        let wire = into_hyper(resp);

        assert_eq!(wire.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(wire.headers().get("x-request-id").unwrap(), "1");
        assert_eq!(wire.headers().get("content-type").unwrap(), "text/plain");
    }
}
