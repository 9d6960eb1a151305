//! Single-flight credential renewal
//!
//! Two states: Idle and Renewing. The first expiry seen while Idle flips the
//! flag and spawns one renewal cycle; every expiry seen while Renewing is
//! parked behind that same cycle. The flag check and flip happen under one
//! lock guard with no await in between, so two callers can never both open
//! a cycle.
//!
//! The cycle runs on its own task. A caller whose future is dropped only
//! loses its own reply; the cycle still settles everyone else and returns
//! the coordinator to Idle.
//!
//! Resolution:
//! - success: store the rotated pair, take the queue and go Idle in one step,
//!   then start every parked replay in the order they failed. Replays settle
//!   independently, so a slow one never holds up the callers behind it.
//! - failure: clear the store, take the queue and go Idle, reject every
//!   parked request with `Error::SessionEnded`, emit one `SessionEvent::Ended`
//!
//! A replay that hits 401 again is a fresh expiry and may open a new cycle;
//! the dispatcher bounds how many times one request can do that. Once a
//! cycle has ended the session, expiries that arrive while the store is
//! still empty are rejected straight away and never signal again.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use session_auth::{CredentialPair, CredentialStore};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::metrics;
use crate::renewer::Renewer;
use crate::request::ApiResponse;
use crate::signal::{SessionEvent, SessionSignal};

/// Default upper bound on a single renewal call.
pub const DEFAULT_RENEWAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Future produced by replaying a parked request.
pub type ReplayFuture = Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send>>;

type Retry = Box<dyn FnOnce() -> ReplayFuture + Send>;

/// A caller's request parked until the current cycle settles.
struct PendingRequest {
    label: String,
    retry: Retry,
    reply: oneshot::Sender<Result<ApiResponse>>,
}

#[derive(Default)]
struct CycleState {
    renewing: bool,
    queue: VecDeque<PendingRequest>,
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Renewal calls exceeding this count as failed. `None` waits forever.
    pub renewal_timeout: Option<Duration>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            renewal_timeout: Some(DEFAULT_RENEWAL_TIMEOUT),
        }
    }
}

/// Owns the renewal cycle state for one application session.
pub struct RenewalCoordinator {
    state: Mutex<CycleState>,
    store: Arc<CredentialStore>,
    renewer: Arc<dyn Renewer>,
    signal: SessionSignal,
    config: CoordinatorConfig,
    cycles: AtomicU64,
    /// Set once a failed cycle has signalled `Ended`.
    terminated: AtomicBool,
}

impl RenewalCoordinator {
    pub fn new(
        store: Arc<CredentialStore>,
        renewer: Arc<dyn Renewer>,
        signal: SessionSignal,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            state: Mutex::new(CycleState::default()),
            store,
            renewer,
            signal,
            config,
            cycles: AtomicU64::new(0),
            terminated: AtomicBool::new(false),
        }
    }

    /// Park a request that failed with credential expiry.
    ///
    /// Opens a renewal cycle if none is running. Resolves with the result of
    /// `retry` once renewal succeeds, or `Error::SessionEnded` if it fails.
    pub async fn enqueue<F>(self: &Arc<Self>, label: impl Into<String>, retry: F) -> Result<ApiResponse>
    where
        F: FnOnce() -> ReplayFuture + Send + 'static,
    {
        let label = label.into();
        if self.terminated.load(Ordering::Acquire) && !self.store.is_authenticated().await {
            debug!(request = %label, "session already ended, rejecting");
            return Err(Error::SessionEnded);
        }
        let (reply, settled) = oneshot::channel();

        let opens_cycle = {
            let mut state = self.state.lock().await;
            let opens_cycle = !state.renewing;
            state.renewing = true;
            state.queue.push_back(PendingRequest {
                label: label.clone(),
                retry: Box::new(retry),
                reply,
            });
            opens_cycle
        };

        if opens_cycle {
            let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
            info!(cycle, trigger = %label, "credential expired, starting renewal");
            let this = Arc::clone(self);
            tokio::spawn(async move { this.run_cycle(cycle).await });
        } else {
            debug!(request = %label, "renewal in flight, parking request");
        }

        settled.await.unwrap_or(Err(Error::CycleAbandoned))
    }

    /// Whether a renewal cycle is in flight.
    pub async fn is_renewing(&self) -> bool {
        self.state.lock().await.renewing
    }

    /// Number of requests parked behind the current cycle.
    pub async fn queued(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    /// Number of renewal cycles opened so far.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    async fn run_cycle(self: Arc<Self>, cycle: u64) {
        let current = self.store.get().await;
        let had_pair = current.is_some();
        let outcome = match current {
            Some(current) => self.renew(&current).await,
            None => {
                metrics::record_renewal("failure");
                Err("no renewal credential stored".to_string())
            }
        };

        match outcome {
            Ok(pair) => {
                if let Err(e) = self.store.set(pair).await {
                    // The in-memory pair is already replaced; only persistence failed
                    warn!(cycle, error = %e, "failed to persist renewed credentials");
                }
                let pending = self.drain().await;
                info!(cycle, replays = pending.len(), "credential renewed, replaying parked requests");

                for request in pending {
                    let this = Arc::clone(&self);
                    tokio::spawn(async move { this.replay(cycle, request).await });
                }
            }
            Err(reason) => {
                if let Err(e) = self.store.clear().await {
                    warn!(cycle, error = %e, "failed to persist cleared credentials");
                }
                let pending = self.drain().await;
                warn!(
                    cycle,
                    rejected = pending.len(),
                    reason = %reason,
                    "credential renewal failed, ending session"
                );

                for request in pending {
                    let _ = request.reply.send(Err(Error::SessionEnded));
                }

                let first = !self.terminated.swap(true, Ordering::AcqRel);
                if had_pair || first {
                    metrics::record_termination();
                    self.signal.emit(SessionEvent::Ended { reason });
                } else {
                    debug!(cycle, "session already ended, not signalling again");
                }
            }
        }
    }

    /// Run one parked request against the renewed credential and hand the
    /// result to its caller.
    async fn replay(&self, cycle: u64, request: PendingRequest) {
        if request.reply.is_closed() {
            debug!(cycle, request = %request.label, "caller went away, skipping replay");
            return;
        }
        // A later cycle may have ended the session before this replay started
        if !self.store.is_authenticated().await {
            debug!(cycle, request = %request.label, "session ended before replay");
            let _ = request.reply.send(Err(Error::SessionEnded));
            return;
        }
        metrics::record_replay();
        let result = (request.retry)().await;
        if request.reply.send(result).is_err() {
            debug!(cycle, request = %request.label, "caller went away during replay");
        }
    }

    /// Take every parked request and return to Idle in one step.
    async fn drain(&self) -> VecDeque<PendingRequest> {
        let mut state = self.state.lock().await;
        state.renewing = false;
        std::mem::take(&mut state.queue)
    }

    /// Issue the single renewal call for this cycle.
    async fn renew(&self, current: &CredentialPair) -> std::result::Result<CredentialPair, String> {
        let call = self.renewer.renew(current.renewal.expose());
        let result = match self.config.renewal_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => {
                    metrics::record_renewal("timeout");
                    return Err(format!("renewal timed out after {}ms", limit.as_millis()));
                }
            },
            None => call.await,
        };

        match result {
            Ok(pair) => {
                metrics::record_renewal("success");
                Ok(pair)
            }
            Err(e) => {
                metrics::record_renewal("failure");
                Err(e.to_string())
            }
        }
    }
}
