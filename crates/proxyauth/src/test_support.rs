//! Counting fakes for the credential store and prompt ports.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{PromptError, StoreError};
use crate::prompt::{CredentialPrompt, PromptResponse};
use crate::store::{CredentialStore, MemoryCredentialStore, PersistScope, StoredCredential};

#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryCredentialStore,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
    pub fail: bool,
}

impl CountingStore {
    pub fn with_entry(host: &str, username: &str, secret: &str) -> Self {
        Self {
            inner: MemoryCredentialStore::new()
                .with_entry(host, StoredCredential::new(username, secret)),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for CountingStore {
    async fn read(&self, target: &str) -> Result<Option<StoredCredential>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(StoreError::Unavailable("locked".into()));
        }
        self.inner.read(target).await
    }

    async fn write(
        &self,
        target: &str,
        credential: &StoredCredential,
        scope: PersistScope,
    ) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(StoreError::Unavailable("read-only".into()));
        }
        self.inner.write(target, credential, scope).await
    }

    async fn delete(&self, target: &str) -> Result<bool, StoreError> {
        self.inner.delete(target).await
    }
}

/// Answers from a script, then cancels.
#[derive(Default)]
pub struct ScriptedPrompt {
    pub responses: std::sync::Mutex<VecDeque<PromptResponse>>,
    pub calls: AtomicUsize,
    pub delay: Option<Duration>,
}

impl ScriptedPrompt {
    pub fn new(responses: impl IntoIterator<Item = PromptResponse>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialPrompt for ScriptedPrompt {
    async fn prompt(&self, _proxy_host: &str) -> Result<PromptResponse, PromptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PromptResponse::Cancelled))
    }
}
