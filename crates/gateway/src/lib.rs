//! Authenticated request gateway for the monitoring console
//!
//! Every outbound API call goes through the `Dispatcher`, which attaches the
//! current bearer credential. A 401 from any resource endpoint is handed to
//! the `RenewalCoordinator`, which renews the credential pair at most once
//! however many calls fail together, then replays the parked calls in the
//! order they failed. If renewal fails, the stored pair is cleared, every
//! parked call is rejected with `Error::SessionEnded`, and a single
//! `SessionEvent::Ended` is broadcast to the application shell.
//!
//! Cycle lifecycle:
//! 1. First 401 while Idle → coordinator flips to Renewing and spawns the cycle
//! 2. Further 401s while Renewing → parked behind the same cycle
//! 3. Renewal succeeds → store updated, parked calls replayed FIFO, back to Idle
//! 4. Renewal fails → store cleared, parked calls rejected, shell signalled once

pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod renewer;
pub mod request;
pub mod session;
pub mod signal;

#[cfg(test)]
mod testutils;

pub use coordinator::{CoordinatorConfig, RenewalCoordinator};
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use error::{Error, Result};
pub use renewer::{HttpRenewer, Renewer};
pub use request::{ApiRequest, ApiResponse};
pub use session::{Session, SessionStatus};
pub use signal::{SessionEvent, SessionSignal};
