//! Error types for gateway operations

/// Errors a caller of the gateway can observe.
///
/// Non-2xx responses are not errors: they come back as `ApiResponse` values
/// untouched. Only transport problems and the end of the session surface here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Renewal failed; the whole session is gone, not just this call.
    #[error("session ended: credential renewal failed")]
    SessionEnded,

    #[error("upstream request failed: {0}")]
    Http(String),

    #[error("upstream request timed out: {0}")]
    Timeout(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The renewal cycle went away without settling this call.
    #[error("renewal cycle abandoned before settling the request")]
    CycleAbandoned,

    #[error("credential store error: {0}")]
    Credential(String),
}

impl Error {
    /// Whether this is the distinguished end-of-session error.
    pub fn is_session_ended(&self) -> bool {
        matches!(self, Error::SessionEnded)
    }
}

impl From<session_auth::Error> for Error {
    fn from(e: session_auth::Error) -> Self {
        Error::Credential(e.to_string())
    }
}

/// Result alias for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ended_is_distinguishable() {
        assert!(Error::SessionEnded.is_session_ended());
        assert!(!Error::Http("connection refused".into()).is_session_ended());
        assert!(!Error::CycleAbandoned.is_session_ended());
    }

    #[test]
    fn credential_errors_convert() {
        let err: Error = session_auth::Error::Io("disk full".into()).into();
        assert!(err.to_string().contains("disk full"), "got: {err}");
    }
}
