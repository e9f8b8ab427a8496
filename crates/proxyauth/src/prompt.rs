//! Interactive credential prompt port.

use std::fmt;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::PromptError;

/// What the user answered.
pub enum PromptResponse {
    /// The user confirmed the dialog. Either field may be empty; the
    /// controller re-prompts when the pair is unusable.
    Confirmed {
        username: String,
        secret: SecretString,
        /// Write the credential back to the credential store.
        remember: bool,
    },
    /// The user dismissed the dialog.
    Cancelled,
}

impl PromptResponse {
    pub fn confirmed(
        username: impl Into<String>,
        secret: impl Into<String>,
        remember: bool,
    ) -> Self {
        Self::Confirmed {
            username: username.into(),
            secret: SecretString::new(secret.into().into()),
            remember,
        }
    }
}

impl fmt::Debug for PromptResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed {
                username, remember, ..
            } => f
                .debug_struct("Confirmed")
                .field("username", username)
                .field("secret", &"[REDACTED]")
                .field("remember", remember)
                .finish(),
            Self::Cancelled => f.write_str("Cancelled"),
        }
    }
}

/// Asks the user for proxy credentials.
///
/// A call may block for as long as the user takes; the controller races it
/// against the caller's cancellation token.
#[async_trait]
pub trait CredentialPrompt: Send + Sync {
    /// Ask for credentials for `proxy_host`.
    ///
    /// # Errors
    ///
    /// Returns an error if no prompt can be shown. The controller treats this
    /// like a cancellation.
    async fn prompt(&self, proxy_host: &str) -> Result<PromptResponse, PromptError>;
}

/// A prompt for non-interactive hosts. Always cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

#[async_trait]
impl CredentialPrompt for NoPrompt {
    async fn prompt(&self, _proxy_host: &str) -> Result<PromptResponse, PromptError> {
        Ok(PromptResponse::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn test_no_prompt_cancels() {
        let response = NoPrompt.prompt("proxy.example.com").await.unwrap();
        assert!(matches!(response, PromptResponse::Cancelled));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", PromptResponse::confirmed("alice", "hunter2", true));
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }
}
