//! Common error types

use std::path::PathBuf;

use thiserror::Error;

/// Failure loading or validating the console configuration
#[derive(Error, Debug)]
pub enum Error {
    /// A setting is present but unusable. `key` is the dotted TOML path.
    #[error("invalid console config `{key}`: {message}")]
    Config { key: &'static str, message: String },

    #[error("cannot read console config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed console config: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    pub fn config(key: &'static str, message: impl Into<String>) -> Self {
        Error::Config {
            key,
            message: message.into(),
        }
    }
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;
