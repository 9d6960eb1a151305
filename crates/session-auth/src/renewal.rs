//! Renewal and revocation calls against the auth endpoints
//!
//! Both POST a JSON body `{ "refreshToken": ... }` to a path under the API
//! base URL. Responses come wrapped in the service's standard envelope
//! `{ success, data?, message? }`; `success: false` is a failure even when
//! the HTTP status is 2xx.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{LOGOUT_PATH, REFRESH_PATH};
use crate::credentials::CredentialPair;
use crate::error::{Error, Result};

/// Standard response envelope of the monitoring API.
#[derive(Debug, Deserialize, Serialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

/// Body for both the renewal and logout endpoints.
#[derive(Debug, Serialize)]
struct RenewalRequest<'a> {
    #[serde(rename = "refreshToken")]
    refresh_token: &'a str,
}

/// Join a base URL and an absolute path without doubling the slash.
pub fn endpoint_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Trade a renewal credential for a rotated credential pair.
///
/// The returned pair replaces the stored one wholesale; the renewal
/// credential is rotated by the server, never reused.
pub async fn renew(
    client: &reqwest::Client,
    base_url: &str,
    renewal: &str,
) -> Result<CredentialPair> {
    let response = client
        .post(endpoint_url(base_url, REFRESH_PATH))
        .json(&RenewalRequest {
            refresh_token: renewal,
        })
        .send()
        .await
        .map_err(|e| Error::Http(format!("renewal request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        // 401/403 means the renewal credential is revoked or invalid
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::InvalidCredentials(format!(
                "renewal credential rejected ({status}): {body}"
            )));
        }

        return Err(Error::Renewal(format!(
            "renewal endpoint returned {status}: {body}"
        )));
    }

    let envelope = response
        .json::<ApiEnvelope<CredentialPair>>()
        .await
        .map_err(|e| Error::Renewal(format!("invalid renewal response: {e}")))?;

    unwrap_envelope(envelope)
}

/// Revoke a renewal credential server-side (logout).
pub async fn revoke(client: &reqwest::Client, base_url: &str, renewal: &str) -> Result<()> {
    let response = client
        .post(endpoint_url(base_url, LOGOUT_PATH))
        .json(&RenewalRequest {
            refresh_token: renewal,
        })
        .send()
        .await
        .map_err(|e| Error::Http(format!("logout request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Http(format!("logout endpoint returned {status}")));
    }
    debug!("renewal credential revoked");
    Ok(())
}

fn unwrap_envelope(envelope: ApiEnvelope<CredentialPair>) -> Result<CredentialPair> {
    match envelope {
        ApiEnvelope {
            success: true,
            data: Some(pair),
            ..
        } => Ok(pair),
        ApiEnvelope {
            success: true,
            data: None,
            ..
        } => Err(Error::Renewal("renewal response carried no credentials".into())),
        ApiEnvelope { message, .. } => Err(Error::Renewal(
            message.unwrap_or_else(|| "renewal rejected".into()),
        )),
    }
}
