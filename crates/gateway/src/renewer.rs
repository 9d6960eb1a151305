//! Renewal strategy seam
//!
//! The coordinator only needs "trade this renewal credential for a new
//! pair". Keeping that behind a trait lets the coordinator be exercised with
//! scripted renewers, while production wires in `HttpRenewer`.

use std::future::Future;
use std::pin::Pin;

use session_auth::CredentialPair;

/// Obtains a rotated credential pair from a renewal credential.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Renewer>`).
pub trait Renewer: Send + Sync {
    fn renew<'a>(
        &'a self,
        renewal: &'a str,
    ) -> Pin<Box<dyn Future<Output = session_auth::Result<CredentialPair>> + Send + 'a>>;
}

/// Renews against the API's `/auth/refresh` endpoint.
///
/// Deliberately bypasses the dispatcher: the renewal call must never be
/// routed back into renewal.
pub struct HttpRenewer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRenewer {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

impl Renewer for HttpRenewer {
    fn renew<'a>(
        &'a self,
        renewal: &'a str,
    ) -> Pin<Box<dyn Future<Output = session_auth::Result<CredentialPair>> + Send + 'a>> {
        Box::pin(session_auth::renew(&self.client, &self.base_url, renewal))
    }
}
