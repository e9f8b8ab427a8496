use std::error::Error as StdError;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use log::{debug, warn};
use reqwest::{Client, ClientBuilder, Proxy, Response, StatusCode};
use secrecy::ExposeSecret;

use proxyauth_common::{FetchConfig, NetworkCredential, ProxyCredential, ProxyTarget};

use crate::error::FetchError;
use crate::stream::ResourceStream;
use crate::{FetchOutcome, ResourceFetcher};

/// Fetcher backed by reqwest.
///
/// The credential lives on the proxy, not on the request, so proxied
/// attempts use a client built for the target's proxy and credential. Those
/// clients are pooled per proxy and user name and rebuilt when the secret
/// changes. Direct attempts share one client.
///
/// The fetcher is cheaply cloneable and can be shared across tasks.
#[derive(Clone)]
pub struct HttpFetcher {
    config: Arc<FetchConfig>,
    default_identity: Option<Arc<NetworkCredential>>,
    direct: Client,
    proxied: Arc<DashMap<ClientKey, PooledClient>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    proxy: String,
    username: Option<String>,
}

struct PooledClient {
    credential: Option<Arc<NetworkCredential>>,
    client: Client,
}

impl PooledClient {
    fn serves(&self, credential: Option<&Arc<NetworkCredential>>) -> bool {
        match (&self.credential, credential) {
            (None, None) => true,
            (Some(pooled), Some(wanted)) => {
                Arc::ptr_eq(pooled, wanted)
                    || pooled.secret().expose_secret() == wanted.secret().expose_secret()
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("config", &self.config)
            .field("has_default_identity", &self.default_identity.is_some())
            .finish_non_exhaustive()
    }
}

impl HttpFetcher {
    /// Creates a fetcher with no ambient identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let direct = Self::client_builder(&config).no_proxy().build()?;

        Ok(Self {
            config: Arc::new(config),
            default_identity: None,
            direct,
            proxied: Arc::new(DashMap::new()),
        })
    }

    /// Sets the identity sent when a target carries
    /// [`ProxyCredential::DefaultIdentity`].
    #[must_use]
    pub fn with_default_identity(mut self, identity: NetworkCredential) -> Self {
        self.default_identity = Some(Arc::new(identity));
        self
    }

    /// The configuration this fetcher was built with.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn client_builder(config: &FetchConfig) -> ClientBuilder {
        Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.as_str())
    }

    fn client_for(&self, target: &ProxyTarget) -> Result<Client, FetchError> {
        let Some(proxy_url) = target.proxy() else {
            return Ok(self.direct.clone());
        };

        let credential = self.resolve_credential(target.credential());
        let key = ClientKey {
            proxy: proxy_url.to_string(),
            username: credential.map(|c| c.qualified_username()),
        };

        if let Some(pooled) = self.proxied.get(&key)
            && pooled.serves(credential)
        {
            return Ok(pooled.client.clone());
        }

        let mut proxy =
            Proxy::all(proxy_url.as_str()).map_err(|source| FetchError::InvalidProxy {
                proxy: proxy_url.to_string(),
                source,
            })?;

        if let Some(credential) = credential {
            proxy = proxy.basic_auth(
                &credential.qualified_username(),
                credential.secret().expose_secret(),
            );
        }

        let client = Self::client_builder(&self.config).proxy(proxy).build()?;
        debug!("Built client for proxy {proxy_url}");
        self.proxied.insert(
            key,
            PooledClient {
                credential: credential.cloned(),
                client: client.clone(),
            },
        );
        Ok(client)
    }

    fn resolve_credential<'a>(
        &'a self,
        attached: Option<&'a ProxyCredential>,
    ) -> Option<&'a Arc<NetworkCredential>> {
        match attached? {
            ProxyCredential::DefaultIdentity => {
                if self.default_identity.is_none() {
                    debug!("No ambient identity configured, sending no credential");
                }
                self.default_identity.as_ref()
            }
            ProxyCredential::Explicit(credential) => Some(credential),
        }
    }

    fn classify_response(response: Response) -> FetchOutcome {
        let status = response.status();

        if status == StatusCode::PROXY_AUTHENTICATION_REQUIRED {
            debug!("Proxy answered 407 for {}", response.url());
            return FetchOutcome::ProxyAuthRequired;
        }

        if !status.is_success() {
            warn!(
                "GET {} failed with status {}",
                response.url(),
                status.as_u16()
            );
            return FetchOutcome::Failed(FetchError::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(FetchError::from));

        FetchOutcome::Success(ResourceStream::new(body, content_type))
    }

    fn classify_error(error: reqwest::Error, url: &url::Url) -> FetchOutcome {
        if is_proxy_auth_required(&error) {
            debug!("Proxy refused tunnel with 407 for {url}");
            return FetchOutcome::ProxyAuthRequired;
        }

        if error.is_timeout() {
            warn!("GET {url} timed out");
            return FetchOutcome::Failed(FetchError::Timeout {
                url: url.to_string(),
            });
        }

        warn!("GET {url} failed: {error}");
        FetchOutcome::Failed(FetchError::Network(error))
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, target: &ProxyTarget) -> FetchOutcome {
        let uri = target.uri();

        if !matches!(uri.scheme(), "http" | "https") {
            return FetchOutcome::Failed(FetchError::UnsupportedScheme(uri.scheme().to_string()));
        }

        let client = match self.client_for(target) {
            Ok(client) => client,
            Err(e) => return FetchOutcome::Failed(e),
        };

        debug!(
            "GET {uri} via {}",
            target.proxy().map_or("direct connection", url::Url::as_str)
        );

        match client.get(uri.clone()).send().await {
            Ok(response) => Self::classify_response(response),
            Err(error) => Self::classify_error(error, uri),
        }
    }

    fn has_default_identity(&self) -> bool {
        self.default_identity.is_some()
    }
}

/// Check whether a transport error was caused by a 407 from the proxy.
///
/// Inspects the error itself and every error in its source chain: the status
/// code when one is attached, otherwise the message the tunnel layer reports
/// for a refused `CONNECT`. Other failures, including other 4xx statuses,
/// return `false`.
pub fn is_proxy_auth_required(error: &(dyn StdError + 'static)) -> bool {
    if let Some(reqwest_error) = error.downcast_ref::<reqwest::Error>()
        && reqwest_error.status() == Some(StatusCode::PROXY_AUTHENTICATION_REQUIRED)
    {
        return true;
    }

    let mut current = Some(error);
    while let Some(e) = current {
        let message = e.to_string().to_ascii_lowercase();
        if message.contains("proxy authentication required")
            || message.contains("proxy authorization required")
        {
            return true;
        }
        current = e.source();
    }

    false
}
