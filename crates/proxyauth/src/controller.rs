//! The proxy-authorization escalation state machine.
//!
//! A fetch chain starts at [`ProxyAuthState::NoCredentials`]. Every time the
//! proxy answers 407 the caller hands the chain's current state and target to
//! [`ProxyAuthorizationController::advance`], which attaches the next-cheapest
//! credential and returns the new state:
//!
//! ```text
//! NoCredentials ─▶ DefaultCredentials ─▶ CachedCredentials ─▶ PromptedCredentials ─▶ Abort
//!   (keep/ambient)    (session cache,       (prompt)             (prompt again)
//!                      else store lookup)
//! ```
//!
//! The controller owns the session cache: at most one credential, tagged with
//! the proxy host it was obtained for.

use std::future::Future;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use proxyauth_common::{NetworkCredential, ProxyAuthState, ProxyCredential, ProxyTarget};

use crate::error::AuthError;
use crate::prompt::{CredentialPrompt, PromptResponse};
use crate::store::{CredentialStore, PersistScope, StoredCredential};

/// Result of one [`advance`](ProxyAuthorizationController::advance) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// The chain's new state.
    pub state: ProxyAuthState,
    /// Whether this call attached a credential to the target.
    pub credential_attached: bool,
    /// Whether the user was prompted during this call.
    pub prompted: bool,
}

impl Transition {
    const fn to(state: ProxyAuthState, credential_attached: bool) -> Self {
        Self {
            state,
            credential_attached,
            prompted: false,
        }
    }

    const fn abort() -> Self {
        Self::to(ProxyAuthState::Abort, false)
    }

    /// Check if the chain must stop.
    pub const fn is_abort(&self) -> bool {
        matches!(self.state, ProxyAuthState::Abort)
    }
}

#[derive(Debug, Default)]
struct SessionCache {
    host: Option<String>,
    credential: Option<Arc<NetworkCredential>>,
}

impl SessionCache {
    fn get(&self, host: &str) -> Option<&Arc<NetworkCredential>> {
        match &self.host {
            Some(cached) if cached.eq_ignore_ascii_case(host) => self.credential.as_ref(),
            _ => None,
        }
    }

    fn set(&mut self, host: &str, credential: Option<Arc<NetworkCredential>>) {
        self.host = Some(host.to_string());
        self.credential = credential;
    }
}

struct Entered {
    credential: Arc<NetworkCredential>,
    raw: StoredCredential,
    remember: bool,
}

/// Decides which credential a fetch chain tries next.
///
/// Construct one per process and share it by `Arc` between every fetch: the
/// session cache it owns is what lets a second fetch through the same proxy
/// skip the store and the prompt.
pub struct ProxyAuthorizationController {
    store: Arc<dyn CredentialStore>,
    prompt: Arc<dyn CredentialPrompt>,
    cache: Mutex<SessionCache>,
    persist_scope: PersistScope,
}

impl std::fmt::Debug for ProxyAuthorizationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyAuthorizationController")
            .field("persist_scope", &self.persist_scope)
            .finish_non_exhaustive()
    }
}

impl ProxyAuthorizationController {
    pub fn new(store: Arc<dyn CredentialStore>, prompt: Arc<dyn CredentialPrompt>) -> Self {
        Self {
            store,
            prompt,
            cache: Mutex::new(SessionCache::default()),
            persist_scope: PersistScope::default(),
        }
    }

    /// Scope used when writing remembered credentials back to the store.
    #[must_use]
    pub const fn with_persist_scope(mut self, scope: PersistScope) -> Self {
        self.persist_scope = scope;
        self
    }

    /// The session-cached credential for `proxy_host`, if any.
    pub async fn cached_credential(&self, proxy_host: &str) -> Option<Arc<NetworkCredential>> {
        self.cache.lock().await.get(proxy_host).cloned()
    }

    /// Forget the session-cached credential.
    pub async fn clear_cache(&self) {
        *self.cache.lock().await = SessionCache::default();
    }

    /// Escalate a chain whose last attempt was answered with 407.
    ///
    /// Performs exactly one transition. The caller retries the fetch once with
    /// whatever is now attached to `target`, and stops when the returned state
    /// is [`ProxyAuthState::Abort`]. Cancelling `cancel` at any point, including
    /// while the prompt is open, aborts the chain.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidStateTransition`] when `current` is `Abort`.
    pub async fn advance(
        &self,
        current: ProxyAuthState,
        target: &mut ProxyTarget,
        allow_prompt: bool,
        cancel: &CancellationToken,
    ) -> Result<Transition, AuthError> {
        if current.is_terminal() {
            error!(
                "Proxy auth transition requested from terminal state for {}",
                target.uri()
            );
            return Err(AuthError::InvalidStateTransition(current));
        }

        if cancel.is_cancelled() {
            info!("Proxy authentication for {} cancelled", target.uri());
            return Ok(Transition::abort());
        }

        let Some(host) = target.proxy_host().map(str::to_string) else {
            if current == ProxyAuthState::NoCredentials {
                debug!(
                    "No proxy configured for {}, continuing without credentials",
                    target.uri()
                );
                return Ok(Transition::to(ProxyAuthState::DefaultCredentials, false));
            }
            warn!(
                "Proxy authentication demanded again for {} but no proxy is configured; aborting",
                target.uri()
            );
            return Ok(Transition::abort());
        };

        let transition = match current {
            ProxyAuthState::NoCredentials => {
                let attach = target.credential().is_none();
                if attach {
                    target.attach(ProxyCredential::DefaultIdentity);
                } else {
                    debug!("Keeping credential already attached for proxy {host}");
                }
                Transition::to(ProxyAuthState::DefaultCredentials, attach)
            }
            ProxyAuthState::DefaultCredentials => {
                let Some(mut cache) = or_cancelled(cancel, self.cache.lock()).await else {
                    return Ok(Transition::abort());
                };

                let credential = if let Some(cached) = cache.get(&host) {
                    debug!("Session cache hit for proxy {host}");
                    Some(Arc::clone(cached))
                } else {
                    let Some(found) = or_cancelled(cancel, self.lookup(&host)).await else {
                        return Ok(Transition::abort());
                    };
                    cache.set(&host, found.clone());
                    found
                };

                let fresh = credential
                    .map(ProxyCredential::Explicit)
                    .filter(|credential| !is_attached(target, credential));

                if let Some(credential) = fresh {
                    target.attach(credential);
                    Transition::to(ProxyAuthState::CachedCredentials, true)
                } else {
                    self.try_cached_then_prompt(
                        &mut cache,
                        ProxyAuthState::CachedCredentials,
                        &host,
                        target,
                        allow_prompt,
                        cancel,
                    )
                    .await
                }
            }
            ProxyAuthState::CachedCredentials | ProxyAuthState::PromptedCredentials => {
                let Some(mut cache) = or_cancelled(cancel, self.cache.lock()).await else {
                    return Ok(Transition::abort());
                };
                self.try_cached_then_prompt(
                    &mut cache,
                    current,
                    &host,
                    target,
                    allow_prompt,
                    cancel,
                )
                .await
            }
            ProxyAuthState::Abort => return Err(AuthError::InvalidStateTransition(current)),
        };

        if transition.state != current {
            info!("Proxy auth for {host}: {current} -> {}", transition.state);
        }
        Ok(transition)
    }

    /// Shared path for a chain past the store tier: reuse a credential another
    /// chain cached in the meantime, otherwise prompt or abort.
    async fn try_cached_then_prompt(
        &self,
        cache: &mut SessionCache,
        current: ProxyAuthState,
        host: &str,
        target: &mut ProxyTarget,
        allow_prompt: bool,
        cancel: &CancellationToken,
    ) -> Transition {
        if let Some(cached) = cache.get(host) {
            let cached = ProxyCredential::Explicit(Arc::clone(cached));
            if !is_attached(target, &cached) {
                debug!("Reusing credential cached for proxy {host} by another request");
                target.attach(cached);
                return Transition::to(current.max(ProxyAuthState::CachedCredentials), true);
            }
        }

        if !allow_prompt {
            debug!("Prompting disabled, no credential left to try for proxy {host}");
            return Transition::abort();
        }

        let Some(entered) = self.prompt_for_credentials(host, cancel).await else {
            return Transition::abort();
        };

        cache.set(host, Some(Arc::clone(&entered.credential)));
        target.attach(ProxyCredential::Explicit(entered.credential));
        if entered.remember {
            self.persist(host, &entered.raw).await;
        }

        Transition {
            state: ProxyAuthState::PromptedCredentials,
            credential_attached: true,
            prompted: true,
        }
    }

    async fn lookup(&self, host: &str) -> Option<Arc<NetworkCredential>> {
        match self.store.read(host).await {
            Ok(Some(stored)) => {
                let credential =
                    NetworkCredential::from_raw(&stored.username, &stored.secret, host);
                if credential.is_none() {
                    warn!("Stored credential for proxy {host} is unusable, ignoring it");
                }
                credential.map(Arc::new)
            }
            Ok(None) => {
                debug!("No stored credential for proxy {host}");
                None
            }
            Err(e) => {
                warn!("Credential store lookup for proxy {host} failed: {e}");
                None
            }
        }
    }

    /// Prompt until the user enters a usable credential or gives up.
    async fn prompt_for_credentials(
        &self,
        host: &str,
        cancel: &CancellationToken,
    ) -> Option<Entered> {
        loop {
            let response = match or_cancelled(cancel, self.prompt.prompt(host)).await {
                None => {
                    info!("Credential prompt for proxy {host} cancelled by caller");
                    return None;
                }
                Some(Err(e)) => {
                    warn!("Credential prompt for proxy {host} failed: {e}");
                    return None;
                }
                Some(Ok(response)) => response,
            };

            match response {
                PromptResponse::Cancelled => {
                    info!("User cancelled the credential prompt for proxy {host}");
                    return None;
                }
                PromptResponse::Confirmed {
                    username,
                    secret,
                    remember,
                } => match NetworkCredential::from_raw(&username, &secret, host) {
                    Some(credential) => {
                        return Some(Entered {
                            credential: Arc::new(credential),
                            raw: StoredCredential { username, secret },
                            remember,
                        });
                    }
                    None => warn!("Unusable credentials entered for proxy {host}, asking again"),
                },
            }
        }
    }

    async fn persist(&self, host: &str, credential: &StoredCredential) {
        match self.store.write(host, credential, self.persist_scope).await {
            Ok(()) => debug!("Saved credential for proxy {host}"),
            Err(e) => warn!("Failed to save credential for proxy {host}: {e}"),
        }
    }
}

fn is_attached(target: &ProxyTarget, credential: &ProxyCredential) -> bool {
    target.credential().is_some_and(|a| a.same_as(credential))
}

async fn or_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}
