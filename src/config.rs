//! Adapter configuration.
//!
//! Every option can be given as a flag or through its `SCANNER_*`
//! environment variable, so the same binary works from a shell and from a
//! container environment.

use std::time::Duration;

use clap::Args;

use crate::{Error, Result};

#[derive(Debug, Clone, Default, Args)]
pub struct Config {
    #[command(flatten)]
    pub clair: ClairConfig,

    #[command(flatten)]
    pub registry: RegistryConfig,
}

/// Where Clair lives and how long to wait for it.
#[derive(Debug, Clone, Args)]
pub struct ClairConfig {
    /// Base URL of the Clair v2 API
    #[arg(
        id = "clair_url",
        long = "clair-url",
        env = "SCANNER_CLAIR_URL",
        default_value = "http://localhost:6060"
    )]
    pub url: String,

    /// Per-request timeout for Clair calls, in seconds
    #[arg(
        id = "clair_timeout_secs",
        long = "clair-timeout-secs",
        env = "SCANNER_CLAIR_TIMEOUT_SECS",
        default_value_t = 60
    )]
    pub timeout_secs: u64,

    /// Clair version reported in scanner metadata
    #[arg(
        id = "clair_version",
        long = "clair-version",
        env = "SCANNER_CLAIR_VERSION",
        default_value = "2.0.8"
    )]
    pub version: String,
}

impl Default for ClairConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6060".to_string(),
            timeout_secs: 60,
            version: "2.0.8".to_string(),
        }
    }
}

impl ClairConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// How manifests are fetched from the artifact's registry.
#[derive(Debug, Clone, Args)]
pub struct RegistryConfig {
    /// Per-request timeout for registry calls, in seconds
    #[arg(
        id = "registry_timeout_secs",
        long = "registry-timeout-secs",
        env = "SCANNER_REGISTRY_TIMEOUT_SECS",
        default_value_t = 30
    )]
    pub timeout_secs: u64,

    /// Accept invalid TLS certificates from the registry
    #[arg(
        id = "registry_insecure",
        long = "registry-insecure",
        env = "SCANNER_REGISTRY_INSECURE"
    )]
    pub insecure: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            insecure: false,
        }
    }
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let url = self.clair.url.trim();
        if url.is_empty() {
            return Err(Error::Config("Clair URL must not be empty".into()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "Clair URL '{}' must start with http:// or https://",
                url
            )));
        }
        if self.clair.timeout_secs == 0 {
            return Err(Error::Config("Clair timeout must be at least 1s".into()));
        }
        if self.registry.timeout_secs == 0 {
            return Err(Error::Config("registry timeout must be at least 1s".into()));
        }
        Ok(())
    }
}
