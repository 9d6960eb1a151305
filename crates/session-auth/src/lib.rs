//! Session credentials for the monitoring console API
//!
//! Holds the bearer credential pair the console uses against the remote
//! monitoring service, persists it across restarts, and talks to the two
//! auth endpoints the gateway needs at runtime:
//!
//! 1. Credential pair imported via `credentials::CredentialStore::set()`
//! 2. Every outbound call reads the access credential via `CredentialStore::get()`
//! 3. On expiry the gateway calls `renewal::renew()` with the renewal credential
//! 4. The rotated pair replaces the old one via `CredentialStore::set()`
//! 5. On renewal failure or logout the pair is dropped via `CredentialStore::clear()`
//!
//! Login/signup (credential issuance) is deliberately absent: the pair is
//! obtained by the surrounding application and handed to the store.

pub mod constants;
pub mod credentials;
pub mod error;
pub mod renewal;

pub use constants::*;
pub use credentials::{CredentialPair, CredentialStore};
pub use error::{Error, Result};
pub use renewal::{ApiEnvelope, renew, revoke};
