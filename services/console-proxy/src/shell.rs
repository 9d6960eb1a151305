//! Session-termination handling
//!
//! Consumes the gateway's session events. When renewal fails the user is told,
//! in their locale, that the session expired and where to sign in again; the
//! health state flips to `session_ended` until a new pair is installed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use gateway::SessionEvent;
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ko,
}

impl Locale {
    pub fn session_expired(self) -> &'static str {
        match self {
            Locale::En => "Your session has expired. Please sign in again.",
            Locale::Ko => "세션이 만료되었습니다. 다시 로그인해주세요.",
        }
    }
}

/// Shell-side view of the session. Clones share the ended flag.
#[derive(Debug, Clone)]
pub struct ShellState {
    ended: Arc<AtomicBool>,
    locale: Locale,
    login_url: Arc<str>,
}

impl ShellState {
    pub fn new(locale: Locale, login_url: &str) -> Self {
        Self {
            ended: Arc::new(AtomicBool::new(false)),
            locale,
            login_url: Arc::from(login_url),
        }
    }

    pub fn is_session_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    /// Returns true if this call moved the session into the ended state.
    pub(crate) fn mark_ended(&self) -> bool {
        !self.ended.swap(true, Ordering::AcqRel)
    }

    /// A fresh pair was installed.
    pub fn reset(&self) {
        self.ended.store(false, Ordering::Release);
    }

    pub fn message(&self) -> &'static str {
        self.locale.session_expired()
    }

    pub fn login_url(&self) -> &str {
        &self.login_url
    }
}

/// Spawn the task that reacts to session events until the channel closes.
pub fn spawn_listener(
    shell: ShellState,
    mut events: broadcast::Receiver<SessionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Ended { reason }) => {
                    if shell.mark_ended() {
                        warn!(
                            reason = %reason,
                            login_url = %shell.login_url(),
                            message = shell.message(),
                            "session ended, sign-in required"
                        );
                    } else {
                        debug!(reason = %reason, "session already ended");
                    }
                }
                Ok(SessionEvent::LoggedOut) => {
                    info!(login_url = %shell.login_url(), "session logged out");
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "session listener lagged behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
