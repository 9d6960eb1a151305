//! Auth endpoint paths of the monitoring API
//!
//! Paths are relative to the configured API base URL.

/// Default API base URL when nothing is configured
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Credential issuance endpoint. Never renewed against.
pub const LOGIN_PATH: &str = "/auth/login";

/// Renewal endpoint: trades a renewal credential for a rotated pair
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Revokes a renewal credential server-side
pub const LOGOUT_PATH: &str = "/auth/logout";

/// Whether a request path targets the login or renewal endpoint.
///
/// A 401 from these endpoints must reach the caller untouched; routing it
/// into renewal would make a failed renewal trigger another renewal.
pub fn is_auth_endpoint(path: &str) -> bool {
    path.contains(LOGIN_PATH) || path.contains(REFRESH_PATH)
}
