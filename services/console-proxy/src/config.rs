//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Credentials never live in the TOML; they are kept in the session file
//! named by `session.credentials_path`.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gateway::{CoordinatorConfig, DispatcherConfig};

use crate::shell::Locale;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    pub proxy: ProxyConfig,
    pub session: SessionConfig,
}

/// Remote monitoring API settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// 0 disables the renewal timeout
    #[serde(default = "default_timeout")]
    pub renewal_timeout_secs: u64,
    #[serde(default = "default_max_renewal_rounds")]
    pub max_renewal_rounds: u32,
}

/// Local listener settings
#[derive(Debug, Deserialize)]
pub struct ProxyConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Admin API listener; disabled when absent
    #[serde(default)]
    pub admin_listen_addr: Option<SocketAddr>,
}

/// Session persistence and what the user sees when it ends
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    pub credentials_path: PathBuf,
    #[serde(default = "default_login_url")]
    pub login_url: String,
    #[serde(default)]
    pub locale: Locale,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            renewal_timeout_secs: default_timeout(),
            max_renewal_rounds: default_max_renewal_rounds(),
        }
    }
}

fn default_base_url() -> String {
    session_auth::DEFAULT_API_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_renewal_rounds() -> u32 {
    2
}

fn default_max_connections() -> usize {
    1000
}

fn default_login_url() -> String {
    "/login".to_string()
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// `CONSOLE_API_URL` overrides `api.base_url`.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| common::Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(url) = std::env::var("CONSOLE_API_URL") {
            config.api.base_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(common::Error::config(
                "api.base_url",
                format!("must start with http:// or https://, got: {}", self.api.base_url),
            ));
        }

        if self.api.timeout_secs == 0 {
            return Err(common::Error::config(
                "api.timeout_secs",
                "must be greater than 0",
            ));
        }

        if self.api.max_renewal_rounds == 0 {
            return Err(common::Error::config(
                "api.max_renewal_rounds",
                "must be at least 1",
            ));
        }

        if self.proxy.max_connections == 0 {
            return Err(common::Error::config(
                "proxy.max_connections",
                "must be greater than 0",
            ));
        }

        if self.proxy.admin_listen_addr == Some(self.proxy.listen_addr) {
            return Err(common::Error::config(
                "proxy.admin_listen_addr",
                "must differ from proxy.listen_addr",
            ));
        }

        Ok(())
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            base_url: self.api.base_url.clone(),
            timeout: Duration::from_secs(self.api.timeout_secs),
            max_renewal_rounds: self.api.max_renewal_rounds,
        }
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        let renewal_timeout = match self.api.renewal_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        CoordinatorConfig { renewal_timeout }
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("console-proxy.toml")
    }
}
