use url::Url;

use crate::credential::ProxyCredential;

/// The proxy a fetch chain goes through, the URI it fetches, and the
/// credential currently attached to the proxy.
///
/// One target lives for one fetch chain. The controller attaches credentials
/// to it between attempts; the fetcher reads them on every attempt.
#[derive(Debug, Clone)]
pub struct ProxyTarget {
    uri: Url,
    proxy: Option<Url>,
    credential: Option<ProxyCredential>,
}

impl ProxyTarget {
    /// Creates a target with nothing attached. `proxy` is `None` when the
    /// host environment routes `uri` directly.
    pub const fn new(uri: Url, proxy: Option<Url>) -> Self {
        Self {
            uri,
            proxy,
            credential: None,
        }
    }

    /// Creates a target with a credential attached before the first attempt.
    #[must_use]
    pub fn with_credential(mut self, credential: ProxyCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// The URI being fetched.
    pub const fn uri(&self) -> &Url {
        &self.uri
    }

    /// The proxy URL, if any.
    pub const fn proxy(&self) -> Option<&Url> {
        self.proxy.as_ref()
    }

    /// Host name of the proxy. This is the key credentials are stored and
    /// cached under.
    pub fn proxy_host(&self) -> Option<&str> {
        self.proxy.as_ref().and_then(Url::host_str)
    }

    /// The attached credential.
    pub const fn credential(&self) -> Option<&ProxyCredential> {
        self.credential.as_ref()
    }

    /// Attaches a credential, replacing any previous one.
    pub fn attach(&mut self, credential: ProxyCredential) {
        self.credential = Some(credential);
    }
}
