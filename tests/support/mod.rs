//! Shared fixtures for integration tests
//!
//! [`MockServer`] is a loopback HTTP server with a scripted route table that
//! records every request it receives.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use catalog_loader::app::{ClientConfig, HttpHandler};

/// A request as seen by the mock server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub authorization: Option<String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    /// Body parsed as JSON
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
struct Route {
    method: Method,
    path: String,
    query: Option<(String, String)>,
    status: StatusCode,
    body: String,
    delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct ServerState {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Loopback HTTP server answering from a route table
pub struct MockServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(ServerState::default());

        let app = Router::new()
            .fallback(handle)
            .with_state(Arc::clone(&state));
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state, task }
    }

    /// Absolute URL for `path` on this server
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Base URL with a trailing slash
    pub fn base_url(&self) -> String {
        self.url("/")
    }

    fn add(&self, route: Route) {
        self.state.routes.lock().unwrap().push(route);
    }

    /// Answer `method path` with `status` and `body`; later routes win
    pub fn route(&self, method: Method, path: &str, status: u16, body: impl Into<String>) {
        self.add(Route {
            method,
            path: path.to_string(),
            query: None,
            status: StatusCode::from_u16(status).unwrap(),
            body: body.into(),
            delay: None,
        });
    }

    /// Like [`MockServer::route`] but only when the query has `key=value`
    pub fn route_with_query(
        &self,
        method: Method,
        path: &str,
        (key, value): (&str, &str),
        status: u16,
        body: impl Into<String>,
    ) {
        self.add(Route {
            method,
            path: path.to_string(),
            query: Some((key.to_string(), value.to_string())),
            status: StatusCode::from_u16(status).unwrap(),
            body: body.into(),
            delay: None,
        });
    }

    pub fn get(&self, path: &str, status: u16, body: impl Into<String>) {
        self.route(Method::GET, path, status, body);
    }

    pub fn get_json(&self, path: &str, body: &Value) {
        self.get(path, 200, body.to_string());
    }

    /// GET route that waits `delay` before answering
    pub fn get_delayed(&self, path: &str, delay: Duration, body: impl Into<String>) {
        self.add(Route {
            method: Method::GET,
            path: path.to_string(),
            query: None,
            status: StatusCode::OK,
            body: body.into(),
            delay: Some(delay),
        });
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle(
    State(state): State<Arc<ServerState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let query: Vec<(String, String)> = uri
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.clone(),
        path: uri.path().to_string(),
        query: query.clone(),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: body.to_vec(),
    });

    let route = state
        .routes
        .lock()
        .unwrap()
        .iter()
        .rev()
        .find(|r| {
            r.method == method
                && r.path == uri.path()
                && r.query
                    .as_ref()
                    .map_or(true, |(k, v)| query.iter().any(|(qk, qv)| qk == k && qv == v))
        })
        .cloned();

    match route {
        Some(route) => {
            if let Some(delay) = route.delay {
                tokio::time::sleep(delay).await;
            }
            (
                route.status,
                [(header::CONTENT_TYPE, "application/json")],
                route.body,
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "no route").into_response(),
    }
}

/// Transport without retries, so failures surface immediately
pub fn http_handler() -> Arc<HttpHandler> {
    let config = ClientConfig {
        max_retries: 0,
        rate_limit_rps: 1000,
        request_timeout: Duration::from_secs(10),
        connect_timeout: Duration::from_secs(2),
        ..Default::default()
    };
    Arc::new(HttpHandler::from_config(&config).unwrap())
}

/// A URL on a loopback port nothing listens on
pub async fn dead_url(path: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}{}", addr, path)
}

/// NDJSON body of `{"id": "<prefix>-<n>"}` records
pub fn ndjson(prefix: &str, count: usize) -> String {
    (1..=count)
        .map(|n| format!("{{\"id\": \"{prefix}-{n}\", \"schema\": \"Thing\"}}\n"))
        .collect()
}
