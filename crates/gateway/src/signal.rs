//! Session lifecycle notifications for the application shell
//!
//! The shell subscribes once and reacts to `Ended` by telling the user their
//! session expired and sending them back to the login surface. How that is
//! rendered is the shell's business; the gateway only guarantees one `Ended`
//! per failed renewal cycle, never one per parked request.

use tokio::sync::broadcast;
use tracing::debug;

/// Capacity of the broadcast buffer. Events are rare; a lagging subscriber
/// only ever misses duplicates of the same condition.
const EVENT_BUFFER: usize = 16;

/// What happened to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Renewal failed and the stored credentials were cleared.
    Ended { reason: String },
    /// The user logged out explicitly.
    LoggedOut,
}

/// Broadcast handle; clones share one channel.
#[derive(Debug, Clone)]
pub struct SessionSignal {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionSignal {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        Self { tx }
    }

    /// Register a new listener. Only events emitted after this call are seen.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Broadcast an event. Having no subscribers is not an error.
    pub fn emit(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            debug!("session event emitted with no subscribers");
        }
    }
}

impl Default for SessionSignal {
    fn default() -> Self {
        Self::new()
    }
}
