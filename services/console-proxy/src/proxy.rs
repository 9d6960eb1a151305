//! HTTP proxy logic
//!
//! Receives inbound requests from the dashboard, strips hop-by-hop headers,
//! and sends them through the gateway dispatcher. Upstream responses come back
//! verbatim, including error statuses. Only gateway errors are turned into
//! local JSON error responses.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gateway::{ApiRequest, Dispatcher};
use tracing::{error, instrument, warn};

use crate::metrics;
use crate::shell::ShellState;

/// Headers to strip before forwarding (hop-by-hop per RFC 2616 Section 13.5.1)
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Shared state passed to the proxy handler via axum State extractor
#[derive(Clone)]
pub struct ProxyState {
    pub dispatcher: Dispatcher,
    pub shell: ShellState,
    pub requests_total: Arc<AtomicU64>,
    pub errors_total: Arc<AtomicU64>,
    pub in_flight: Arc<AtomicU64>,
}

impl ProxyState {
    pub fn new(dispatcher: Dispatcher, shell: ShellState) -> Self {
        Self {
            dispatcher,
            shell,
            requests_total: Arc::new(AtomicU64::new(0)),
            errors_total: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Decrements the in-flight counter when the request finishes, however it ends.
struct InFlight(Arc<AtomicU64>);

impl InFlight {
    fn enter(counter: &Arc<AtomicU64>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// JSON error response: {"error":{"type":"...","message":"...","request_id":"req_..."}}
fn error_response(status: StatusCode, kind: &str, message: &str, request_id: &str) -> Response {
    let body = serde_json::json!({
        "error": {
            "type": kind,
            "message": message,
            "request_id": request_id,
        }
    });
    (
        status,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

/// 401 telling the dashboard the whole session is gone, not just this call.
fn session_ended_response(shell: &ShellState, request_id: &str) -> Response {
    let body = serde_json::json!({
        "error": {
            "type": "session_ended",
            "message": shell.message(),
            "login_url": shell.login_url(),
            "request_id": request_id,
        }
    });
    (
        StatusCode::UNAUTHORIZED,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

/// Forward one inbound request through the dispatcher.
#[instrument(skip_all, fields(request_id = %request_id, method = %request.method(), path = %request.uri().path()))]
pub async fn proxy_request(
    state: &ProxyState,
    request: axum::http::Request<axum::body::Body>,
    request_id: String,
) -> Response {
    state.requests_total.fetch_add(1, Ordering::Relaxed);
    let _in_flight = InFlight::enter(&state.in_flight);
    let started = Instant::now();

    let (parts, body) = request.into_parts();
    let method = parts.method.clone();
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    // Upstream host comes from the configured base URL
    let mut headers = reqwest::header::HeaderMap::new();
    for (name, value) in &parts.headers {
        if !is_hop_by_hop(name.as_str()) && *name != axum::http::header::HOST {
            headers.append(name.clone(), value.clone());
        }
    }

    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(b) => b,
        Err(e) => {
            state.errors_total.fetch_add(1, Ordering::Relaxed);
            error!(error = %e, "failed to read request body");
            let response = error_response(
                StatusCode::BAD_REQUEST,
                "proxy_error",
                &format!("invalid request body: {e}"),
                &request_id,
            );
            metrics::record_request(400, method.as_str(), started.elapsed().as_secs_f64());
            return response;
        }
    };

    let api_request = ApiRequest {
        method: method.clone(),
        path,
        headers,
        body,
    };

    let response = match state.dispatcher.send(api_request).await {
        Ok(upstream) => {
            let mut response = Response::builder().status(upstream.status);
            for (name, value) in &upstream.headers {
                if !is_hop_by_hop(name.as_str()) {
                    response = response.header(name, value);
                }
            }
            response
                .body(axum::body::Body::from(upstream.body))
                .unwrap_or_else(|e| {
                    error_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "proxy_error",
                        &format!("response build error: {e}"),
                        &request_id,
                    )
                })
        }
        Err(gateway::Error::SessionEnded) => {
            warn!("request rejected, session ended");
            session_ended_response(&state.shell, &request_id)
        }
        Err(e) => {
            state.errors_total.fetch_add(1, Ordering::Relaxed);
            let (status, error_type) = match &e {
                gateway::Error::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
                gateway::Error::Http(_) => (StatusCode::BAD_GATEWAY, "connection"),
                gateway::Error::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
                _ => (StatusCode::BAD_GATEWAY, "gateway"),
            };
            error!(error = %e, error_type, "upstream request failed");
            metrics::record_upstream_error(error_type);
            error_response(status, "proxy_error", &e.to_string(), &request_id)
        }
    };

    metrics::record_request(
        response.status().as_u16(),
        method.as_str(),
        started.elapsed().as_secs_f64(),
    );
    response
}

/// Check if a header is hop-by-hop (should be stripped before forwarding)
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}
