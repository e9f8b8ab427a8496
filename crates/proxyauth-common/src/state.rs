use std::fmt;

use serde::{Deserialize, Serialize};

/// Escalation progress of a single fetch chain.
///
/// Variants are declared in tier order, so the derived `Ord` is the
/// escalation order: a chain's state only ever compares greater than or
/// equal to its previous state.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ProxyAuthState {
    /// Nothing attached yet. Every chain starts here.
    #[default]
    NoCredentials,
    /// The ambient identity of the running user is attached, or whatever the
    /// caller attached before the first attempt.
    DefaultCredentials,
    /// A credential from the session cache or the credential store is attached.
    CachedCredentials,
    /// The user was asked and supplied a credential.
    PromptedCredentials,
    /// Terminal. No further attempt is made.
    Abort,
}

impl ProxyAuthState {
    /// Whether this state ends the chain.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Abort)
    }
}

impl fmt::Display for ProxyAuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoCredentials => "no-credentials",
            Self::DefaultCredentials => "default-credentials",
            Self::CachedCredentials => "cached-credentials",
            Self::PromptedCredentials => "prompted-credentials",
            Self::Abort => "abort",
        };
        f.write_str(name)
    }
}
