//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, Method, Request, Response, Uri},
    Router,
};
use tokio::net::TcpListener;

use gitlab_proxy::config::{ProxyConfig, UpstreamConfig};
use gitlab_proxy::{Forwarder, HttpServer, Shutdown};

/// One request as seen by the mock upstream.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Handle to a running mock upstream.
pub struct MockUpstream {
    pub addr: SocketAddr,
    hits: Arc<Mutex<Vec<Recorded>>>,
}

impl MockUpstream {
    /// Base URL in the shape of a GitLab API root.
    pub fn base_url(&self) -> String {
        format!("http://{}/api/v4", self.addr)
    }

    /// Everything received so far, in arrival order.
    pub fn hits(&self) -> Vec<Recorded> {
        self.hits.lock().unwrap().clone()
    }
}

/// Start a programmable mock upstream on an ephemeral port.
///
/// `respond` maps each received request to a status code and JSON body.
pub async fn start_programmable_upstream<F>(respond: F) -> MockUpstream
where
    F: Fn(&Recorded) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(Mutex::new(Vec::new()));
    let respond = Arc::new(respond);

    let recorder = hits.clone();
    let app = Router::new().fallback(move |request: Request<Body>| {
        let hits = recorder.clone();
        let respond = respond.clone();
        async move {
            let (parts, body) = request.into_parts();
            let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
            let recorded = Recorded {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                body,
            };

            let (status, body) = respond(&recorded);
            hits.lock().unwrap().push(recorded);

            Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap()
        }
    });

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockUpstream { addr, hits }
}

/// Start a mock upstream that always returns the same status and body.
pub async fn start_mock_upstream(status: u16, body: &'static str) -> MockUpstream {
    start_programmable_upstream(move |_| (status, body.to_string())).await
}

/// A base URL nothing is listening on.
pub async fn refused_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/api/v4", addr)
}

/// Upstream settings for tests.
pub fn upstream_config(base_url: &str) -> UpstreamConfig {
    UpstreamConfig {
        base_url: base_url.to_string(),
        access_token: "glpat-test-token".to_string(),
        ..UpstreamConfig::default()
    }
}

/// A forwarder that bypasses any system proxy settings.
pub fn test_forwarder(base_url: &str) -> Forwarder {
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    Forwarder::with_client(&upstream_config(base_url), client).unwrap()
}

/// Client for talking to the gateway under test.
pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Gateway config pointed at `base_url`.
pub fn gateway_config(base_url: &str) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.host = "127.0.0.1".to_string();
    config.listener.port = 0;
    config.upstream = upstream_config(base_url);
    config
}

/// Start the full gateway on an ephemeral port.
pub async fn start_gateway(config: ProxyConfig) -> (SocketAddr, Shutdown) {
    let forwarder = test_forwarder(&config.upstream.base_url);
    let server = HttpServer::with_forwarder(config, forwarder);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}
