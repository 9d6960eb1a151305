//! Admin API for the console session
//!
//! Runs on a separate listener and is never proxied. Lets the login flow
//! hand over a credential pair and lets operators inspect or end the session.
//!
//! Endpoints:
//! - GET    /admin/session: session status (never exposes credentials)
//! - PUT    /admin/session: install a credential pair
//! - DELETE /admin/session: log out (revoke + clear)

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use gateway::Session;
use serde::Deserialize;
use session_auth::CredentialPair;
use tracing::{info, warn};

use crate::shell::ShellState;

/// Shared state for admin API handlers.
#[derive(Clone)]
pub struct AdminState {
    session: Session,
    shell: ShellState,
}

impl AdminState {
    pub fn new(session: Session, shell: ShellState) -> Self {
        Self { session, shell }
    }
}

/// Build the admin axum router.
pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route(
            "/admin/session",
            get(session_status).put(install_session).delete(end_session),
        )
        .with_state(state)
}

fn json(status: StatusCode, body: serde_json::Value) -> impl IntoResponse {
    (
        status,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// GET /admin/session
async fn session_status(State(state): State<AdminState>) -> impl IntoResponse {
    let status = state.session.status().await;
    json(
        StatusCode::OK,
        serde_json::json!({
            "authenticated": status.authenticated,
            "session_ended": state.shell.is_session_ended(),
            "renewing": status.renewing,
            "queued": status.queued,
            "renewal_cycles": status.cycles,
        }),
    )
}

/// Body for PUT /admin/session, in the API's login response shape.
#[derive(Deserialize)]
struct InstallRequest {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: String,
}

/// PUT /admin/session: install a pair obtained from the login flow.
async fn install_session(
    State(state): State<AdminState>,
    axum::Json(body): axum::Json<InstallRequest>,
) -> impl IntoResponse {
    if body.access_token.trim().is_empty() || body.refresh_token.trim().is_empty() {
        return json(
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "error": "accessToken and refreshToken are both required" }),
        );
    }

    let pair = CredentialPair::new(body.access_token, body.refresh_token);
    match state.session.install(pair).await {
        Ok(()) => {
            state.shell.reset();
            info!("session installed via admin API");
            json(StatusCode::OK, serde_json::json!({ "status": "installed" }))
        }
        Err(e) => {
            warn!(error = %e, "failed to install session");
            json(
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": e.to_string() }),
            )
        }
    }
}

/// DELETE /admin/session
async fn end_session(State(state): State<AdminState>) -> impl IntoResponse {
    match state.session.logout().await {
        Ok(()) => json(StatusCode::OK, serde_json::json!({ "status": "logged_out" })),
        Err(e) => {
            warn!(error = %e, "failed to end session");
            json(
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": e.to_string() }),
            )
        }
    }
}
