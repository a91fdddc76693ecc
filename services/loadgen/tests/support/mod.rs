//! Mock target service for integration tests
//!
//! Serves `/health`, `/api/expense` and `/api/payment` on an ephemeral port,
//! records every POST it receives and answers with a scripted status.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
    routing::{get, post},
};
use common::config::TargetConfig;
use serde_json::Value;
use tokio::net::TcpListener;

/// One request as the mock saw it
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub path: String,
    pub content_type: Option<String>,
    pub request_id: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    delay: Duration,
    ready_at: Instant,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

/// Handle on a running mock target
#[derive(Clone)]
pub struct MockTarget {
    pub base_url: String,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl MockTarget {
    /// Start a mock answering every POST with `status`
    pub async fn spawn(status: StatusCode) -> Self {
        Self::spawn_with_delay(status, Duration::ZERO).await
    }

    /// Start a mock that holds every POST for `delay` before answering
    pub async fn spawn_with_delay(status: StatusCode, delay: Duration) -> Self {
        Self::start(status, delay, Duration::ZERO).await
    }

    /// Start a mock whose `/health` answers 503 until `warmup` has passed
    pub async fn spawn_ready_after(warmup: Duration) -> Self {
        Self::start(StatusCode::OK, Duration::ZERO, warmup).await
    }

    async fn start(status: StatusCode, delay: Duration, warmup: Duration) -> Self {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            status,
            delay,
            ready_at: Instant::now() + warmup,
            captured: captured.clone(),
        };

        let app = Router::new()
            .route("/health", get(health))
            .route("/api/expense", post(capture))
            .route("/api/payment", post(capture))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            captured,
        }
    }

    /// Target configuration pointing at this mock
    pub fn target(&self) -> TargetConfig {
        TargetConfig {
            base_url: self.base_url.clone(),
            timeout_ms: 5_000,
            health_timeout_secs: 5,
            ..TargetConfig::default()
        }
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.captured.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<CapturedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.path == path)
            .collect()
    }
}

async fn health(State(state): State<MockState>) -> StatusCode {
    if Instant::now() >= state.ready_at {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn capture(
    State(state): State<MockState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };

    let request = CapturedRequest {
        path: uri.path().to_string(),
        content_type: header("content-type"),
        request_id: header("x-request-id"),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    };
    state.captured.lock().unwrap().push(request);

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    state.status
}

/// A local port with nothing listening on it
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}
