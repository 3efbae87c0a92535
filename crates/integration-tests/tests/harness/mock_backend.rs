//! Mock generation backend for integration tests
//!
//! Serves `POST /generate` with a canned SSE body of cumulative text
//! fragments followed by `[DONE]`.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use tokio_util::sync::CancellationToken;

/// Mock backend that replays a scripted reply
pub struct MockBackend {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

struct MockState {
    /// Cumulative text snapshots, one per SSE event
    snapshots: Vec<String>,
    /// Status to answer with instead of streaming
    failure: Option<StatusCode>,
    requests: Mutex<Vec<serde_json::Value>>,
    request_ids: Mutex<Vec<String>>,
}

impl MockBackend {
    /// Start a backend that streams `reply` one word at a time
    pub async fn start(reply: &str) -> anyhow::Result<Self> {
        let mut snapshots = Vec::new();
        let mut text = String::new();
        for word in reply.split_inclusive(' ') {
            text.push_str(word);
            snapshots.push(text.clone());
        }
        Self::start_inner(snapshots, None).await
    }

    /// Start a backend that answers every request with `status`
    pub async fn start_failing(status: StatusCode) -> anyhow::Result<Self> {
        Self::start_inner(Vec::new(), Some(status)).await
    }

    async fn start_inner(snapshots: Vec<String>, failure: Option<StatusCode>) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            snapshots,
            failure,
            requests: Mutex::new(Vec::new()),
            request_ids: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/generate", routing::post(handle_generate))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for the `[backend]` section
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Bodies of every generation request received so far
    pub fn requests(&self) -> Vec<serde_json::Value> {
        self.state.requests.lock().expect("lock").clone()
    }

    /// Request ids forwarded with each generation request
    pub fn request_ids(&self) -> Vec<String> {
        self.state.request_ids.lock().expect("lock").clone()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_generate(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    state.requests.lock().expect("lock").push(body);
    if let Some(id) = headers.get("x-request-id").and_then(|v| v.to_str().ok()) {
        state.request_ids.lock().expect("lock").push(id.to_owned());
    }

    if let Some(status) = state.failure {
        return (status, "mock backend intentional failure").into_response();
    }

    let mut body = String::new();
    let last = state.snapshots.len().saturating_sub(1);
    for (i, content) in state.snapshots.iter().enumerate() {
        let event = serde_json::json!({ "content": content, "finished": i == last });
        body.push_str(&format!("data: {event}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");

    (StatusCode::OK, [(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}
