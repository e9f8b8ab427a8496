//! CLI configuration.
//!
//! Configuration is loaded from `~/.config/proxyauth/config.toml`. Every
//! section is optional; a missing file means defaults.
//!
//! ## Example Configuration
//!
//! ```toml
//! [proxy]
//! url = "http://proxy.example.com:8080"
//! bypass = ["localhost", ".internal.example.com"]
//!
//! [fetch]
//! timeout_seconds = 60
//! connect_timeout_seconds = 30
//!
//! [resolver]
//! allow_prompt = true
//! max_prompts = 3
//!
//! [identity]
//! username = "svc-build"
//! domain = "CORP"
//! password_env = "PROXYAUTH_PASSWORD"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use proxyauth::{FetchConfig, NetworkCredential, ProxySettings, ResolverConfig};

/// Configuration loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Proxy to route through. When no URL is set, the proxy environment
    /// variables are used instead.
    pub proxy: ProxySettings,

    pub fetch: FetchConfig,

    pub resolver: ResolverConfig,

    /// Ambient identity offered before any stored or prompted credential.
    pub identity: Option<IdentityConfig>,
}

/// The ambient identity. The secret is never kept in the file, only the name
/// of the environment variable that holds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub username: String,

    #[serde(default)]
    pub domain: Option<String>,

    pub password_env: String,
}

impl IdentityConfig {
    /// Builds the credential, reading the secret from `password_env`.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment variable is not set.
    pub fn credential(&self) -> Result<NetworkCredential> {
        let secret = std::env::var(&self.password_env).with_context(|| {
            format!(
                "Identity password variable '{}' is not set",
                self.password_env
            )
        })?;

        Ok(NetworkCredential::new(&self.username, secret)
            .with_domain(self.domain.clone().unwrap_or_default()))
    }
}

impl CliConfig {
    /// Loads configuration from the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined or the
    /// file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Loads configuration from `path`, or defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Returns the default configuration file path.
    ///
    /// Uses `XDG_CONFIG_HOME` if set, otherwise `~/.config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .context("Failed to determine config directory")?;

        Ok(config_dir.join("proxyauth").join("config.toml"))
    }

    /// The proxy settings to use: the file's proxy if it names one, otherwise
    /// the environment's, with the file's bypass entries added.
    pub fn proxy_settings(&self) -> ProxySettings {
        if self.proxy.url.is_some() {
            return self.proxy.clone();
        }

        let mut settings = ProxySettings::from_env();
        settings.bypass.extend(self.proxy.bypass.iter().cloned());
        settings
    }
}
