//! The fetch-and-escalate loop.

use std::sync::Arc;

use log::{debug, info};
use tokio_util::sync::CancellationToken;
use url::Url;

use proxyauth_client::{FetchOutcome, ProxyResolver, ResourceFetcher, ResourceStream};
use proxyauth_common::{ProxyAuthState, ProxyCredential, ProxyTarget, ResolverConfig};

use crate::controller::ProxyAuthorizationController;
use crate::entity::{EntityKind, EntityLoader, FileEntityLoader, ResolvedEntity};
use crate::error::ResolveError;
use crate::events::{EventCallback, ResolveEvent};

/// Resolves URIs to entities, fetching HTTP resources through the configured
/// proxy and escalating credentials whenever the proxy answers 407.
pub struct EntityResolver<F: ResourceFetcher> {
    fetcher: F,
    controller: Arc<ProxyAuthorizationController>,
    proxies: Arc<dyn ProxyResolver>,
    loader: Arc<dyn EntityLoader>,
    pub config: ResolverConfig,
    event_callback: Option<EventCallback>,
}

impl<F: ResourceFetcher> EntityResolver<F> {
    pub fn new(
        fetcher: F,
        controller: Arc<ProxyAuthorizationController>,
        proxies: Arc<dyn ProxyResolver>,
    ) -> Self {
        Self {
            fetcher,
            controller,
            proxies,
            loader: Arc::new(FileEntityLoader),
            config: ResolverConfig::default(),
            event_callback: None,
        }
    }

    #[must_use]
    pub fn with_loader(mut self, loader: Arc<dyn EntityLoader>) -> Self {
        self.loader = loader;
        self
    }

    #[must_use]
    pub const fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_event_callback<C>(mut self, callback: C) -> Self
    where
        C: Fn(&ResolveEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(Box::new(callback));
        self
    }

    pub const fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub const fn controller(&self) -> &Arc<ProxyAuthorizationController> {
        &self.controller
    }

    fn emit(&self, event: ResolveEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(&event);
        }
    }

    /// Resolve `uri` to an entity.
    ///
    /// `http`/`https` URIs expected as a stream (`expected` is `None` or
    /// [`EntityKind::Stream`]) go through [`fetch`](Self::fetch); everything
    /// else is handed to the entity loader.
    ///
    /// # Errors
    ///
    /// See [`fetch`](Self::fetch) and [`EntityLoader::load`].
    pub async fn get_entity(
        &self,
        uri: &Url,
        role: Option<&str>,
        expected: Option<&EntityKind>,
        cancel: &CancellationToken,
    ) -> Result<ResolvedEntity, ResolveError> {
        let expected = expected.cloned().unwrap_or_default();
        let is_http = matches!(uri.scheme(), "http" | "https");

        if is_http && expected == EntityKind::Stream {
            return self.fetch(uri, cancel).await.map(ResolvedEntity::Stream);
        }

        debug!("Delegating {uri} ({expected}) to the entity loader");
        self.loader.load(uri, role, &expected).await
    }

    /// Fetch `uri` through the proxy the host environment supplies for it.
    ///
    /// A credential the session cache holds for that proxy is attached before
    /// the first attempt.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Aborted`] when escalation runs out of
    /// credentials, [`ResolveError::Cancelled`] when `cancel` fires, and
    /// [`ResolveError::Fetch`] for any failure other than 407.
    pub async fn fetch(
        &self,
        uri: &Url,
        cancel: &CancellationToken,
    ) -> Result<ResourceStream, ResolveError> {
        let mut target = ProxyTarget::new(uri.clone(), self.proxies.proxy_for(uri));

        let host = target.proxy_host().map(str::to_string);
        if let Some(host) = host
            && let Some(cached) = self.controller.cached_credential(&host).await
        {
            debug!("Attaching session credential for proxy {host}");
            target.attach(ProxyCredential::Explicit(cached));
        }

        self.fetch_with_target(target, cancel).await
    }

    /// Run the escalation loop on a caller-built target.
    ///
    /// Each attempt is made once; a 407 advances the chain one tier and the
    /// fetch is retried with the newly attached credential. A retry that
    /// would only add an ambient identity the fetcher does not have is not
    /// sent, and the chain advances again. Prompts are limited to
    /// `config.max_prompts` per chain.
    ///
    /// # Errors
    ///
    /// See [`fetch`](Self::fetch).
    pub async fn fetch_with_target(
        &self,
        mut target: ProxyTarget,
        cancel: &CancellationToken,
    ) -> Result<ResourceStream, ResolveError> {
        let mut state = ProxyAuthState::NoCredentials;
        let mut prompts = 0u32;
        let mut repeats_last_attempt = false;

        loop {
            if cancel.is_cancelled() {
                return Err(ResolveError::Cancelled);
            }

            let outcome = if repeats_last_attempt {
                debug!(
                    "No ambient identity for {}, skipping the identical retry",
                    target.uri()
                );
                FetchOutcome::ProxyAuthRequired
            } else {
                debug!("Fetching {} ({state})", target.uri());
                self.emit(ResolveEvent::Attempt {
                    uri: target.uri().to_string(),
                    state,
                });

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(ResolveError::Cancelled),
                    outcome = self.fetcher.fetch(&target) => outcome,
                }
            };

            match outcome {
                FetchOutcome::Success(stream) => {
                    self.emit(ResolveEvent::Resolved {
                        uri: target.uri().to_string(),
                        state,
                    });
                    return Ok(stream);
                }
                FetchOutcome::Failed(e) => return Err(e.into()),
                FetchOutcome::ProxyAuthRequired => {}
            }

            let allow_prompt = self.config.allow_prompt && prompts < self.config.max_prompts;
            let transition = self
                .controller
                .advance(state, &mut target, allow_prompt, cancel)
                .await?;
            if transition.prompted {
                prompts += 1;
            }
            repeats_last_attempt = transition.credential_attached
                && matches!(target.credential(), Some(ProxyCredential::DefaultIdentity))
                && !self.fetcher.has_default_identity();

            self.emit(ResolveEvent::Escalated {
                proxy: target.proxy_host().map(str::to_string),
                from: state,
                to: transition.state,
                prompted: transition.prompted,
            });

            if transition.is_abort() {
                if cancel.is_cancelled() {
                    return Err(ResolveError::Cancelled);
                }
                info!(
                    "Giving up on {} after proxy authentication failed",
                    target.uri()
                );
                return Err(ResolveError::Aborted {
                    uri: target.uri().to_string(),
                    proxy: target.proxy_host().map(str::to_string),
                });
            }
            state = transition.state;
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use secrecy::ExposeSecret;

    use proxyauth_client::FetchError;
    use proxyauth_common::ProxySettings;

    use super::*;
    use crate::prompt::{CredentialPrompt, PromptResponse};
    use crate::store::CredentialStore;
    use crate::test_support::{CountingStore, ScriptedPrompt};

    const PROXY_URL: &str = "http://proxy.example.com:8080";
    const DOC: &str = "https://docs.example.com/a.xml";

    /// A proxy that only lets `alice:<secret>` through.
    struct GatedFetcher {
        secret: Mutex<String>,
        sent: Mutex<Vec<Option<String>>>,
        calls: AtomicUsize,
        ambient: bool,
    }

    impl GatedFetcher {
        fn new(secret: &str) -> Self {
            Self {
                secret: Mutex::new(secret.to_string()),
                sent: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
                ambient: true,
            }
        }

        fn without_identity(mut self) -> Self {
            self.ambient = false;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn rotate(&self, secret: &str) {
            *self.secret.lock().unwrap() = secret.to_string();
            self.sent.lock().unwrap().clear();
        }

        fn sent(&self) -> Vec<Option<String>> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ResourceFetcher for GatedFetcher {
        async fn fetch(&self, target: &ProxyTarget) -> FetchOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let explicit = target.credential().and_then(ProxyCredential::as_explicit);
            self.sent
                .lock()
                .unwrap()
                .push(explicit.map(|c| c.secret().expose_secret().to_string()));

            let secret = self.secret.lock().unwrap().clone();
            let allowed = explicit
                .is_some_and(|c| c.username() == "alice" && c.secret().expose_secret() == secret);
            if allowed {
                FetchOutcome::Success(ResourceStream::from_bytes("<doc/>"))
            } else {
                FetchOutcome::ProxyAuthRequired
            }
        }

        fn has_default_identity(&self) -> bool {
            self.ambient
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl ResourceFetcher for FailingFetcher {
        async fn fetch(&self, target: &ProxyTarget) -> FetchOutcome {
            FetchOutcome::Failed(FetchError::Status {
                status: 404,
                url: target.uri().to_string(),
            })
        }
    }

    fn controller(
        store: &Arc<CountingStore>,
        prompt: &Arc<ScriptedPrompt>,
    ) -> Arc<ProxyAuthorizationController> {
        Arc::new(ProxyAuthorizationController::new(
            Arc::clone(store) as Arc<dyn CredentialStore>,
            Arc::clone(prompt) as Arc<dyn CredentialPrompt>,
        ))
    }

    fn proxies() -> Arc<dyn ProxyResolver> {
        Arc::new(ProxySettings::new(PROXY_URL))
    }

    fn doc() -> Url {
        Url::parse(DOC).unwrap()
    }

    #[tokio::test]
    async fn test_escalates_to_stored_credential_then_reuses_cache() {
        let store = Arc::new(CountingStore::with_entry("proxy.example.com", "alice", "pw"));
        let prompt = Arc::new(ScriptedPrompt::default());
        let fetcher = GatedFetcher::new("pw");
        let resolver = EntityResolver::new(fetcher, controller(&store, &prompt), proxies());
        let cancel = CancellationToken::new();

        let body = resolver
            .fetch(&doc(), &cancel)
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(&body[..], b"<doc/>");
        assert_eq!(resolver.fetcher().calls(), 3);
        assert_eq!(store.reads(), 1);
        assert_eq!(prompt.calls(), 0);

        resolver.fetch(&doc(), &cancel).await.unwrap();
        assert_eq!(resolver.fetcher().calls(), 4);
        assert_eq!(store.reads(), 1);
    }

    #[tokio::test]
    async fn test_stale_session_credential_is_sent_at_most_twice() {
        let store = Arc::new(CountingStore::with_entry("proxy.example.com", "alice", "old"));
        let prompt = Arc::new(ScriptedPrompt::new([PromptResponse::confirmed(
            "alice", "new", false,
        )]));
        let fetcher = GatedFetcher::new("old");
        let resolver = EntityResolver::new(fetcher, controller(&store, &prompt), proxies());
        let cancel = CancellationToken::new();

        resolver.fetch(&doc(), &cancel).await.unwrap();
        resolver.fetcher().rotate("new");

        resolver.fetch(&doc(), &cancel).await.unwrap();

        let old = Some("old".to_string());
        let sent = resolver.fetcher().sent();
        assert_eq!(sent, vec![old.clone(), old, Some("new".to_string())]);
        assert_eq!(prompt.calls(), 1);
        assert_eq!(store.reads(), 1);
    }

    #[tokio::test]
    async fn test_skips_default_attempt_without_ambient_identity() {
        let store = Arc::new(CountingStore::with_entry("proxy.example.com", "alice", "pw"));
        let prompt = Arc::new(ScriptedPrompt::default());
        let fetcher = GatedFetcher::new("pw").without_identity();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let resolver = EntityResolver::new(fetcher, controller(&store, &prompt), proxies())
            .with_event_callback(move |event| sink.lock().unwrap().push(event.clone()));

        resolver
            .fetch(&doc(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(resolver.fetcher().calls(), 2);
        assert_eq!(
            resolver.fetcher().sent(),
            vec![None, Some("pw".to_string())]
        );
        let attempts: Vec<_> = events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                ResolveEvent::Attempt { state, .. } => Some(*state),
                _ => None,
            })
            .collect();
        assert_eq!(
            attempts,
            vec![ProxyAuthState::NoCredentials, ProxyAuthState::CachedCredentials]
        );
    }

    #[tokio::test]
    async fn test_prompts_when_store_is_empty() {
        let store = Arc::new(CountingStore::default());
        let prompt = Arc::new(ScriptedPrompt::new([PromptResponse::confirmed(
            "proxy.example.com\\alice",
            "pw",
            true,
        )]));
        let fetcher = GatedFetcher::new("pw");
        let resolver = EntityResolver::new(fetcher, controller(&store, &prompt), proxies());

        resolver
            .fetch(&doc(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(resolver.fetcher().calls(), 3);
        assert_eq!(prompt.calls(), 1);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_aborts_when_prompting_disabled() {
        let store = Arc::new(CountingStore::default());
        let prompt = Arc::new(ScriptedPrompt::default());
        let fetcher = GatedFetcher::new("pw");
        let config = ResolverConfig::builder().allow_prompt(false).build();
        let resolver = EntityResolver::new(fetcher, controller(&store, &prompt), proxies())
            .with_config(config);

        let err = resolver
            .fetch(&doc(), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            ResolveError::Aborted { uri, proxy } => {
                assert_eq!(uri, DOC);
                assert_eq!(proxy.as_deref(), Some("proxy.example.com"));
            }
            other => unreachable!("unexpected error: {other:?}"),
        }
        assert_eq!(resolver.fetcher().calls(), 2);
        assert_eq!(prompt.calls(), 0);
    }

    #[tokio::test]
    async fn test_prompts_are_bounded() {
        let store = Arc::new(CountingStore::default());
        let prompt = Arc::new(ScriptedPrompt::new(
            (0..10).map(|_| PromptResponse::confirmed("alice", "wrong", false)),
        ));
        let fetcher = GatedFetcher::new("pw");
        let config = ResolverConfig::builder().max_prompts(2).build();
        let resolver = EntityResolver::new(fetcher, controller(&store, &prompt), proxies())
            .with_config(config);

        let err = resolver
            .fetch(&doc(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.is_aborted());
        assert_eq!(prompt.calls(), 2);
        assert_eq!(resolver.fetcher().calls(), 4);
    }

    #[tokio::test]
    async fn test_other_failures_are_not_escalated() {
        let store = Arc::new(CountingStore::default());
        let prompt = Arc::new(ScriptedPrompt::default());
        let resolver = EntityResolver::new(FailingFetcher, controller(&store, &prompt), proxies());

        let err = resolver
            .fetch(&doc(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ResolveError::Fetch(FetchError::Status { status: 404, .. })
        ));
        assert_eq!(store.reads(), 0);
    }

    #[tokio::test]
    async fn test_second_407_without_proxy_aborts() {
        let store = Arc::new(CountingStore::default());
        let prompt = Arc::new(ScriptedPrompt::default());
        let fetcher = GatedFetcher::new("pw");
        let resolver = EntityResolver::new(
            fetcher,
            controller(&store, &prompt),
            Arc::new(ProxySettings::default()),
        );

        let err = resolver
            .fetch(&doc(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::Aborted { proxy: None, .. }));
        assert_eq!(resolver.fetcher().calls(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let store = Arc::new(CountingStore::default());
        let prompt = Arc::new(ScriptedPrompt::default());
        let fetcher = GatedFetcher::new("pw");
        let resolver = EntityResolver::new(fetcher, controller(&store, &prompt), proxies());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = resolver.fetch(&doc(), &cancel).await.unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(resolver.fetcher().calls(), 0);
    }

    #[tokio::test]
    async fn test_events_trace_the_chain() {
        let store = Arc::new(CountingStore::with_entry("proxy.example.com", "alice", "pw"));
        let prompt = Arc::new(ScriptedPrompt::default());
        let fetcher = GatedFetcher::new("pw");
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let resolver = EntityResolver::new(fetcher, controller(&store, &prompt), proxies())
            .with_event_callback(move |event| sink.lock().unwrap().push(event.clone()));

        resolver
            .fetch(&doc(), &CancellationToken::new())
            .await
            .unwrap();

        let events = events.lock().unwrap();
        let escalations: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ResolveEvent::Escalated { from, to, .. } => Some((*from, *to)),
                _ => None,
            })
            .collect();
        assert_eq!(
            escalations,
            vec![
                (ProxyAuthState::NoCredentials, ProxyAuthState::DefaultCredentials),
                (ProxyAuthState::DefaultCredentials, ProxyAuthState::CachedCredentials),
            ]
        );
        assert_eq!(
            events.last(),
            Some(&ResolveEvent::Resolved {
                uri: DOC.to_string(),
                state: ProxyAuthState::CachedCredentials,
            })
        );
    }

    #[tokio::test]
    async fn test_get_entity_routes_by_scheme_and_kind() {
        let store = Arc::new(CountingStore::default());
        let prompt = Arc::new(ScriptedPrompt::default());
        let fetcher = GatedFetcher::new("pw");
        let resolver = EntityResolver::new(fetcher, controller(&store, &prompt), proxies());
        let cancel = CancellationToken::new();

        let kind = EntityKind::Other("document".into());
        let err = resolver
            .get_entity(&doc(), Some("dtd"), Some(&kind), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedEntityType(_)));
        assert_eq!(resolver.fetcher().calls(), 0);

        let ftp = Url::parse("ftp://files.example.com/a.xml").unwrap();
        let err = resolver
            .get_entity(&ftp, None, None, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
        assert_eq!(resolver.fetcher().calls(), 0);
    }

    #[tokio::test]
    async fn test_get_entity_fetches_http_streams() {
        let store = Arc::new(CountingStore::with_entry("proxy.example.com", "alice", "pw"));
        let prompt = Arc::new(ScriptedPrompt::default());
        let fetcher = GatedFetcher::new("pw");
        let resolver = EntityResolver::new(fetcher, controller(&store, &prompt), proxies());

        let entity = resolver
            .get_entity(&doc(), None, None, &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(entity, ResolvedEntity::Stream(_)));
        assert_eq!(resolver.fetcher().calls(), 3);
    }
}
