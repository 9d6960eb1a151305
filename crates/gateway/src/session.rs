//! One application session: store, coordinator and dispatcher wired together

use std::sync::Arc;

use session_auth::{CredentialPair, CredentialStore};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::coordinator::{CoordinatorConfig, RenewalCoordinator};
use crate::dispatcher::{Dispatcher, DispatcherConfig};
use crate::error::Result;
use crate::renewer::{HttpRenewer, Renewer};
use crate::signal::{SessionEvent, SessionSignal};

/// Point-in-time view for health reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub authenticated: bool,
    pub renewing: bool,
    pub queued: usize,
    pub cycles: u64,
}

/// Handle the shell holds for the lifetime of a session. Clones share state.
#[derive(Clone)]
pub struct Session {
    client: reqwest::Client,
    store: Arc<CredentialStore>,
    signal: SessionSignal,
    dispatcher: Dispatcher,
}

impl Session {
    /// Wire a session that renews against the API's own refresh endpoint.
    pub fn start(
        client: reqwest::Client,
        store: Arc<CredentialStore>,
        dispatcher: DispatcherConfig,
        coordinator: CoordinatorConfig,
    ) -> Self {
        let renewer = Arc::new(HttpRenewer::new(client.clone(), dispatcher.base_url.clone()));
        Self::with_renewer(client, store, renewer, dispatcher, coordinator)
    }

    pub fn with_renewer(
        client: reqwest::Client,
        store: Arc<CredentialStore>,
        renewer: Arc<dyn Renewer>,
        dispatcher: DispatcherConfig,
        coordinator: CoordinatorConfig,
    ) -> Self {
        let signal = SessionSignal::new();
        let coordinator = Arc::new(RenewalCoordinator::new(
            store.clone(),
            renewer,
            signal.clone(),
            coordinator,
        ));
        let dispatcher = Dispatcher::new(client.clone(), store.clone(), coordinator, dispatcher);
        Self {
            client,
            store,
            signal,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Import a pair obtained by the login flow.
    pub async fn install(&self, pair: CredentialPair) -> Result<()> {
        self.store.set(pair).await?;
        info!("credentials installed");
        Ok(())
    }

    /// End the session on request.
    ///
    /// Revocation is best-effort: the local pair is cleared even when the
    /// server cannot be reached.
    pub async fn logout(&self) -> Result<()> {
        if let Some(pair) = self.store.get().await {
            let revoked =
                session_auth::revoke(&self.client, self.dispatcher.base_url(), pair.renewal.expose())
                    .await;
            if let Err(e) = revoked {
                warn!(error = %e, "revoking renewal credential failed, clearing locally");
            }
        }
        self.store.clear().await?;
        self.signal.emit(SessionEvent::LoggedOut);
        info!("logged out");
        Ok(())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.store.is_authenticated().await
    }

    pub async fn status(&self) -> SessionStatus {
        let coordinator = self.dispatcher.coordinator();
        SessionStatus {
            authenticated: self.store.is_authenticated().await,
            renewing: coordinator.is_renewing().await,
            queued: coordinator.queued().await,
            cycles: coordinator.cycles(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.signal.subscribe()
    }
}
