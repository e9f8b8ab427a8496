use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use url::Url;

/// Default total request timeout for one fetch attempt (60 seconds).
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

/// Default connection timeout (30 seconds).
pub const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 30;

/// Default number of times the user may be prompted within one fetch chain.
pub const DEFAULT_MAX_PROMPTS: u32 = 3;

/// Settings for a single HTTP GET.
///
/// # Examples
///
/// ```
/// use proxyauth_common::FetchConfig;
///
/// let config = FetchConfig::builder().timeout_seconds(10).build();
/// assert_eq!(config.timeout().as_secs(), 10);
/// assert_eq!(config.connect_timeout().as_secs(), 30);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(default)]
pub struct FetchConfig {
    /// Total timeout of one attempt, in seconds.
    #[builder(default = DEFAULT_TIMEOUT_SECONDS)]
    pub timeout_seconds: u64,
    /// Connection timeout, in seconds.
    #[builder(default = DEFAULT_CONNECT_TIMEOUT_SECONDS)]
    pub connect_timeout_seconds: u64,
    /// `User-Agent` header sent with every request.
    #[builder(default = default_user_agent(), setter(into))]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl FetchConfig {
    /// Total timeout of one attempt.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Connection timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

fn default_user_agent() -> String {
    format!("proxyauth/{}", env!("CARGO_PKG_VERSION"))
}

/// Proxy settings supplied by the host environment.
///
/// These are taken as given: there is no discovery, only a URL and a list of
/// hosts that bypass it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Proxy URL, e.g. `http://proxy.example.com:8080`. `None` means direct.
    pub url: Option<String>,
    /// Hosts that are fetched directly. An entry matches the host itself and,
    /// when it starts with `.`, any subdomain. `*` bypasses everything.
    pub bypass: Vec<String>,
}

impl ProxySettings {
    /// A proxy that applies to every host.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            bypass: Vec::new(),
        }
    }

    /// Reads `HTTPS_PROXY`, `HTTP_PROXY` and `NO_PROXY` (either case).
    ///
    /// `HTTPS_PROXY` wins when both are set.
    pub fn from_env() -> Self {
        let url = ["HTTPS_PROXY", "https_proxy", "HTTP_PROXY", "http_proxy"]
            .iter()
            .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()));

        let bypass = ["NO_PROXY", "no_proxy"]
            .iter()
            .find_map(|name| std::env::var(name).ok())
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Self { url, bypass }
    }

    /// Returns the proxy to use for `uri`, or `None` to go direct.
    ///
    /// A proxy URL that does not parse is logged and treated as no proxy.
    pub fn proxy_for(&self, uri: &Url) -> Option<Url> {
        let raw = self.url.as_deref()?;

        if let Some(host) = uri.host_str()
            && self.bypasses(host)
        {
            return None;
        }

        match Url::parse(raw) {
            Ok(url) if url.host_str().is_some() => Some(url),
            Ok(_) => {
                warn!("Proxy URL '{raw}' has no host, connecting directly");
                None
            }
            Err(e) => {
                warn!("Ignoring invalid proxy URL '{raw}': {e}");
                None
            }
        }
    }

    fn bypasses(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.bypass.iter().any(|entry| {
            if entry == "*" {
                return true;
            }
            let entry = entry.to_ascii_lowercase();
            match entry.strip_prefix('.') {
                Some(suffix) => host == suffix || host.ends_with(&entry),
                None => host == entry,
            }
        })
    }
}

/// Settings for the fetch-and-escalate loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(default)]
pub struct ResolverConfig {
    /// Whether the user may be prompted for credentials.
    #[builder(default = true)]
    pub allow_prompt: bool,
    /// How many prompts one fetch chain may show before it aborts.
    #[builder(default = DEFAULT_MAX_PROMPTS)]
    pub max_prompts: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
