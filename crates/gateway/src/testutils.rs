use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use session_auth::CredentialPair;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use crate::coordinator::RenewalCoordinator;
use crate::renewer::Renewer;

/// Renewer that answers from a script, optionally holding each call until
/// the test releases it.
pub struct ScriptedRenewer {
    script: std::sync::Mutex<VecDeque<session_auth::Result<CredentialPair>>>,
    presented: std::sync::Mutex<Vec<String>>,
    calls: AtomicUsize,
    gate: Option<Notify>,
}

impl ScriptedRenewer {
    pub fn new(script: Vec<session_auth::Result<CredentialPair>>) -> Self {
        Self {
            script: std::sync::Mutex::new(script.into()),
            presented: std::sync::Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn gated(script: Vec<session_auth::Result<CredentialPair>>) -> Self {
        Self {
            gate: Some(Notify::new()),
            ..Self::new(script)
        }
    }

    /// Let one held renewal call complete.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Renewal credentials presented, in call order.
    pub fn presented(&self) -> Vec<String> {
        self.presented.lock().unwrap().clone()
    }
}

impl Renewer for ScriptedRenewer {
    fn renew<'a>(
        &'a self,
        renewal: &'a str,
    ) -> Pin<Box<dyn Future<Output = session_auth::Result<CredentialPair>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.presented.lock().unwrap().push(renewal.to_string());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(session_auth::Error::Renewal("script exhausted".into())))
        })
    }
}

/// Wait until at least `n` requests are parked behind the current cycle.
pub async fn wait_for_queue(coord: &RenewalCoordinator, n: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while coord.queued().await < n {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("requests were not parked in time");
}

/// How the mock API answers `/auth/refresh`.
pub enum RefreshBehavior {
    /// Rotate to the given pair and accept it from then on
    Rotate { access: String, renewal: String },
    /// Hand out the given pair without ever accepting it
    Stale { access: String, renewal: String },
    /// Reject with 401 and `success: false`
    Reject,
}

/// One request as seen by the mock API.
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
}

pub struct MockState {
    valid_access: std::sync::Mutex<String>,
    behavior: RefreshBehavior,
    gate: Option<Notify>,
    refresh_calls: AtomicUsize,
    seen: std::sync::Mutex<Vec<Seen>>,
}

/// In-process monitoring API: resource paths answer 200 only for the
/// currently valid access credential and 401 otherwise.
pub struct MockApi {
    pub url: String,
    pub state: Arc<MockState>,
    _server: tokio::task::JoinHandle<()>,
}

impl MockApi {
    pub async fn start(valid_access: &str, behavior: RefreshBehavior) -> Self {
        Self::spawn(valid_access, behavior, None).await
    }

    /// Like `start`, but `/auth/refresh` waits for `release()` before answering.
    pub async fn start_gated(valid_access: &str, behavior: RefreshBehavior) -> Self {
        Self::spawn(valid_access, behavior, Some(Notify::new())).await
    }

    async fn spawn(valid_access: &str, behavior: RefreshBehavior, gate: Option<Notify>) -> Self {
        let state = Arc::new(MockState {
            valid_access: std::sync::Mutex::new(valid_access.to_string()),
            behavior,
            gate,
            refresh_calls: AtomicUsize::new(0),
            seen: std::sync::Mutex::new(Vec::new()),
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let app = axum::Router::new()
            .route("/auth/refresh", axum::routing::post(refresh_handler))
            .route("/auth/login", axum::routing::post(login_handler))
            .fallback(resource_handler)
            .with_state(state.clone());
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url,
            state,
            _server: server,
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.state.gate {
            gate.notify_one();
        }
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.state.seen.lock().unwrap().clone()
    }

    /// Requests to `path` that carried `Bearer <access>`.
    pub fn hits_with(&self, path: &str, access: &str) -> usize {
        let expected = format!("Bearer {access}");
        self.seen()
            .iter()
            .filter(|s| s.path == path && s.authorization.as_deref() == Some(expected.as_str()))
            .count()
    }
}

fn record(state: &MockState, request: &Request<Body>) -> Seen {
    let seen = Seen {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        authorization: request
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
    };
    state.seen.lock().unwrap().push(seen.clone());
    seen
}

fn expired() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        axum::Json(serde_json::json!({ "success": false, "message": "access token expired" })),
    )
        .into_response()
}

async fn resource_handler(State(state): State<Arc<MockState>>, request: Request<Body>) -> Response {
    let seen = record(&state, &request);
    let valid = format!("Bearer {}", state.valid_access.lock().unwrap());
    if seen.authorization.as_deref() != Some(valid.as_str()) {
        return expired();
    }
    if seen.path == "/missing" {
        return (StatusCode::NOT_FOUND, "no such resource").into_response();
    }
    axum::Json(serde_json::json!({
        "success": true,
        "data": { "method": seen.method, "path": seen.path }
    }))
    .into_response()
}

async fn refresh_handler(State(state): State<Arc<MockState>>, request: Request<Body>) -> Response {
    record(&state, &request);
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(gate) = &state.gate {
        gate.notified().await;
    }
    match &state.behavior {
        RefreshBehavior::Rotate { access, renewal } => {
            *state.valid_access.lock().unwrap() = access.clone();
            axum::Json(serde_json::json!({
                "success": true,
                "data": { "accessToken": access, "refreshToken": renewal }
            }))
            .into_response()
        }
        RefreshBehavior::Stale { access, renewal } => axum::Json(serde_json::json!({
            "success": true,
            "data": { "accessToken": access, "refreshToken": renewal }
        }))
        .into_response(),
        RefreshBehavior::Reject => (
            StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({ "success": false, "message": "refresh token expired" })),
        )
            .into_response(),
    }
}

async fn login_handler(State(state): State<Arc<MockState>>, request: Request<Body>) -> Response {
    record(&state, &request);
    expired()
}
