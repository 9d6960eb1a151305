//! Request dispatcher
//!
//! Sole entry point for outbound API calls. Attaches the current access
//! credential, sends, and hands 401s on resource paths to the coordinator.
//! Every other status comes back to the caller untouched.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use session_auth::renewal::endpoint_url;
use session_auth::{CredentialStore, DEFAULT_API_URL, is_auth_endpoint};
use tracing::{debug, instrument, warn};

use crate::coordinator::{RenewalCoordinator, ReplayFuture};
use crate::error::{Error, Result};
use crate::metrics;
use crate::request::{ApiRequest, ApiResponse};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of renewal cycles one request may open.
pub const DEFAULT_MAX_RENEWAL_ROUNDS: u32 = 2;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// How many times a single request may be parked for renewal. Once spent,
    /// a further 401 is returned to the caller as-is.
    pub max_renewal_rounds: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_renewal_rounds: DEFAULT_MAX_RENEWAL_ROUNDS,
        }
    }
}

/// Cheap to clone; clones share the client, store and coordinator.
#[derive(Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    store: Arc<CredentialStore>,
    coordinator: Arc<RenewalCoordinator>,
    config: Arc<DispatcherConfig>,
}

impl Dispatcher {
    pub fn new(
        client: reqwest::Client,
        store: Arc<CredentialStore>,
        coordinator: Arc<RenewalCoordinator>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            client,
            store,
            coordinator,
            config: Arc::new(config),
        }
    }

    pub fn coordinator(&self) -> &Arc<RenewalCoordinator> {
        &self.coordinator
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Send one request.
    ///
    /// Resolves with the upstream response, including non-2xx ones. Fails
    /// with `Error::SessionEnded` if the call hit an expired credential and
    /// renewal failed.
    #[instrument(skip_all, fields(request = %request.label()))]
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.clone().send_round(request, 0).await
    }

    /// One attempt at `request`, `round` being how many renewal cycles it has
    /// already been parked behind. Boxed because a replay re-enters here.
    fn send_round(self, request: ApiRequest, round: u32) -> ReplayFuture {
        Box::pin(async move {
            let response = self.issue(&request).await?;
            if !response.is_expired() {
                return Ok(response);
            }

            if is_auth_endpoint(request.path_only()) {
                debug!(request = %request.label(), "401 from auth endpoint, passing through");
                metrics::record_expired_passthrough("auth_endpoint");
                return Ok(response);
            }
            if round >= self.config.max_renewal_rounds {
                warn!(
                    request = %request.label(),
                    rounds = round,
                    "still unauthorized after renewal, returning 401"
                );
                metrics::record_expired_passthrough("round_budget");
                return Ok(response);
            }

            let label = request.label();
            let replay = self.clone();
            self.coordinator
                .enqueue(label, move || replay.send_round(request, round + 1))
                .await
        })
    }

    /// Put `request` on the wire with the credential stored right now.
    async fn issue(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = endpoint_url(&self.config.base_url, &request.path);

        let mut headers = request.headers.clone();
        headers.remove(AUTHORIZATION);

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(headers)
            .timeout(self.config.timeout);
        if let Some(pair) = self.store.get().await {
            builder = builder.bearer_auth(pair.access.expose());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(|e| classify(&url, e))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| classify(&url, e))?;
        debug!(%status, bytes = body.len(), "upstream responded");

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

fn classify(url: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(format!("{url}: {e}"))
    } else {
        Error::Http(format!("{url}: {e}"))
    }
}
