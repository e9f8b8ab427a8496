use std::fmt;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

/// A username/secret pair, optionally qualified by a domain or realm.
///
/// The secret is held in a [`SecretString`] and is never printed by `Debug`.
///
/// # Examples
///
/// ```
/// use proxyauth_common::NetworkCredential;
///
/// let cred = NetworkCredential::new("alice", "hunter2").with_domain("corp");
/// assert_eq!(cred.qualified_username(), "corp\\alice");
/// assert!(!format!("{cred:?}").contains("hunter2"));
/// ```
#[derive(Clone)]
pub struct NetworkCredential {
    username: String,
    domain: Option<String>,
    secret: SecretString,
}

impl NetworkCredential {
    /// Creates a credential without a domain component.
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            domain: None,
            secret: SecretString::new(secret.into().into()),
        }
    }

    /// Sets the domain component. An empty domain clears it.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        let domain = domain.into();
        self.domain = (!domain.is_empty()).then_some(domain);
        self
    }

    /// Builds a credential from the raw user string a credential store or
    /// prompt returned.
    ///
    /// The raw user may embed a domain (`domain\user` or `user@domain`); it is
    /// decomposed with [`parse_username`] against `target_host`. Returns `None`
    /// when either part is empty or the user string cannot be decomposed.
    pub fn from_raw(raw_username: &str, secret: &SecretString, target_host: &str) -> Option<Self> {
        if raw_username.is_empty() || secret.expose_secret().is_empty() {
            return None;
        }

        let (user, domain) = parse_username(raw_username, target_host)?;
        Some(Self {
            username: user,
            domain,
            secret: secret.clone(),
        })
    }

    /// The user part, without any domain.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The domain part, if any.
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// The secret.
    pub const fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// The identity as sent to a proxy: `domain\user`, or just `user`.
    pub fn qualified_username(&self) -> String {
        match &self.domain {
            Some(domain) => format!("{domain}\\{}", self.username),
            None => self.username.clone(),
        }
    }
}

impl PartialEq for NetworkCredential {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username
            && self.domain == other.domain
            && self.secret.expose_secret() == other.secret.expose_secret()
    }
}

impl Eq for NetworkCredential {}

impl fmt::Debug for NetworkCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkCredential")
            .field("username", &self.username)
            .field("domain", &self.domain)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// The credential attached to a proxy target.
#[derive(Debug, Clone)]
pub enum ProxyCredential {
    /// The ambient identity of the running user, as supplied by the host
    /// environment. Resolved by the fetcher at request time.
    DefaultIdentity,
    /// An explicit credential. Shared so that the controller, its cache and
    /// the target all point at the same object.
    Explicit(Arc<NetworkCredential>),
}

impl ProxyCredential {
    /// Wraps an owned credential.
    pub fn explicit(credential: NetworkCredential) -> Self {
        Self::Explicit(Arc::new(credential))
    }

    /// The explicit credential, if this is one.
    pub const fn as_explicit(&self) -> Option<&Arc<NetworkCredential>> {
        match self {
            Self::Explicit(credential) => Some(credential),
            Self::DefaultIdentity => None,
        }
    }

    /// Whether both values refer to the same attached object.
    ///
    /// Two `DefaultIdentity` values are the same; explicit credentials are
    /// compared by pointer, not by content.
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::DefaultIdentity, Self::DefaultIdentity) => true,
            (Self::Explicit(a), Self::Explicit(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Splits a user string into its user and domain parts.
///
/// Accepts `user`, `domain\user` and `user@domain`. The domain is dropped when
/// it equals `target_host` case-insensitively: credential dialogs complete a
/// bare user name with the target as its domain, and a proxy would reject that
/// identity. Any other domain is kept.
///
/// Returns `None` when the name is empty, either side of the separator is
/// empty, or the user part contains a further `\`.
///
/// # Examples
///
/// ```
/// use proxyauth_common::parse_username;
///
/// assert_eq!(
///     parse_username("proxy.example.com\\alice", "proxy.example.com"),
///     Some(("alice".to_string(), None))
/// );
/// assert_eq!(
///     parse_username("corp\\alice", "proxy.example.com"),
///     Some(("alice".to_string(), Some("corp".to_string())))
/// );
/// assert_eq!(parse_username("a\\b\\c", "proxy.example.com"), None);
/// ```
pub fn parse_username(raw: &str, target_host: &str) -> Option<(String, Option<String>)> {
    if raw.is_empty() {
        return None;
    }

    let (user, domain) = if let Some((domain, user)) = raw.split_once('\\') {
        if user.contains('\\') {
            return None;
        }
        (user, Some(domain))
    } else if let Some((user, domain)) = raw.rsplit_once('@') {
        (user, Some(domain))
    } else {
        (raw, None)
    };

    if user.is_empty() || domain.is_some_and(str::is_empty) {
        return None;
    }

    let domain = domain
        .filter(|d| !d.eq_ignore_ascii_case(target_host))
        .map(String::from);

    Some((user.to_string(), domain))
}


#[cfg(test)]
mod proptests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn domain_qualified_names_round_trip(
            user in "[a-z][a-z0-9._-]{0,15}",
            domain in "[a-z][a-z0-9.-]{0,15}",
        ) {
            let raw = format!("{domain}\\{user}");
            let (parsed_user, parsed_domain) = parse_username(&raw, "proxy.invalid.test").unwrap();
            prop_assert_eq!(parsed_user, user);
            prop_assert_eq!(parsed_domain, Some(domain));
        }

        #[test]
        fn target_domain_is_always_stripped(user in "[a-z][a-z0-9._-]{0,15}") {
            let raw = format!("proxy.example.com\\{user}");
            let (parsed_user, parsed_domain) = parse_username(&raw, "proxy.example.com").unwrap();
            prop_assert_eq!(parsed_user, user);
            prop_assert_eq!(parsed_domain, None);
        }
    }
}
