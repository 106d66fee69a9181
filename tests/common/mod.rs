//! Shared utilities for integration tests.
//!
//! Backends and gateways bind to ephemeral ports so tests can run in parallel.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use gateway_dispatch::config::{ApiConfig, EndpointConfig, GatewayConfig};
use gateway_dispatch::http::HttpServer;
use gateway_dispatch::lifecycle::Shutdown;
use gateway_dispatch::observability::{ExchangeRecord, OutcomeSink};
use gateway_dispatch::routing::ApiRouter;

/// One request as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Requests received by a recording backend, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<Recorded>>>);

impl Recorder {
    pub fn requests(&self) -> Vec<Recorded> {
        self.0.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }
}

async fn record_request(State(recorder): State<Recorder>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();

    recorder.0.lock().unwrap().push(Recorded {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        headers: parts.headers.clone(),
        body: body.clone(),
    });

    next.run(Request::from_parts(parts, Body::from(body))).await
}

/// Serve `app` on an ephemeral port, recording every request it receives.
pub async fn spawn_backend(app: Router) -> (SocketAddr, Recorder) {
    let recorder = Recorder::default();
    let app = app.layer(middleware::from_fn_with_state(recorder.clone(), record_request));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, recorder)
}

/// Read one request head off a raw socket.
pub async fn read_request_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

/// A backend that answers every connection with the same raw bytes.
pub async fn spawn_raw_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_request_head(&mut socket).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// A backend that writes `head` and then goes quiet, holding the socket open.
pub async fn spawn_stalling_backend(head: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_request_head(&mut socket).await;
                let _ = socket.write_all(head.as_bytes()).await;
                tokio::time::sleep(Duration::from_secs(30)).await;
                drop(socket);
            });
        }
    });

    addr
}

/// A backend that streams a chunked body forever, one chunk every 20ms.
pub async fn spawn_endless_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_request_head(&mut socket).await;
                let head = "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n";
                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                loop {
                    if socket.write_all(b"5\r\ntick\n\r\n").await.is_err() {
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
            });
        }
    });

    addr
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// API definition with one endpoint per `(id, url)` pair.
pub fn api(name: &str, context_path: &str, endpoints: &[(&str, String)]) -> ApiConfig {
    ApiConfig {
        name: name.into(),
        context_path: context_path.into(),
        endpoints: endpoints
            .iter()
            .map(|(id, url)| EndpointConfig::new(*id, url.clone()))
            .collect(),
        ..ApiConfig::default()
    }
}

/// Sink that keeps every record.
#[derive(Debug, Default)]
pub struct RecordingSink(Mutex<Vec<ExchangeRecord>>);

impl OutcomeSink for RecordingSink {
    fn record(&self, record: &ExchangeRecord) {
        self.0.lock().unwrap().push(record.clone());
    }
}

impl RecordingSink {
    pub fn records(&self) -> Vec<ExchangeRecord> {
        self.0.lock().unwrap().clone()
    }

    /// Wait until at least `n` records arrived; body relays finish after the
    /// caller has already seen the response head.
    pub async fn wait_for(&self, n: usize) -> Vec<ExchangeRecord> {
        for _ in 0..250 {
            let records = self.records();
            if records.len() >= n {
                return records;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("expected {n} exchange records, got {:?}", self.records());
    }
}

/// A running gateway.
pub struct Gateway {
    pub addr: SocketAddr,
    pub apis: Arc<ArcSwap<ApiRouter>>,
    pub config_tx: mpsc::UnboundedSender<GatewayConfig>,
    pub shutdown: Shutdown,
}

impl Gateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub async fn spawn_gateway(apis: Vec<ApiConfig>, sink: Arc<dyn OutcomeSink>) -> Gateway {
    let config = GatewayConfig {
        apis,
        ..GatewayConfig::default()
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_tx, config_updates) = mpsc::unbounded_channel();
    let server = HttpServer::with_sink(config, sink);
    let apis = server.apis();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    Gateway {
        addr,
        apis,
        config_tx,
        shutdown,
    }
}

/// Caller-side client: no proxy, no pooling, redirects left to the gateway.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}
