//! Error types for session credential operations

/// Errors from credential storage and auth endpoint calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("credential renewal failed: {0}")]
    Renewal(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for session credential operations.
pub type Result<T> = std::result::Result<T, Error>;
