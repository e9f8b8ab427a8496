//! Credential store port and an in-memory implementation.
//!
//! Stores are keyed by proxy host. Keys are compared case-insensitively, so
//! `Proxy.Example.com` and `proxy.example.com` share an entry.

use std::fmt;

use async_trait::async_trait;
use dashmap::DashMap;
use secrecy::{ExposeSecret, SecretString};

use crate::error::StoreError;

/// How long a written credential should live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PersistScope {
    /// Until the current login session ends.
    Session,
    /// Across sessions for the current user on this machine.
    #[default]
    LocalMachine,
}

/// A raw `(username, secret)` pair as kept by a store.
///
/// The username is stored exactly as the user typed it and may embed a domain;
/// it is decomposed when the controller turns it into a
/// [`NetworkCredential`](proxyauth_common::NetworkCredential).
#[derive(Clone)]
pub struct StoredCredential {
    /// User name, possibly domain-qualified.
    pub username: String,
    /// The secret.
    pub secret: SecretString,
}

impl StoredCredential {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: SecretString::new(secret.into().into()),
        }
    }
}

impl PartialEq for StoredCredential {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username
            && self.secret.expose_secret() == other.secret.expose_secret()
    }
}

impl fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredential")
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Secure, host-keyed storage for proxy credentials.
///
/// Implementations wrap a platform keychain, a file, or memory. The controller
/// only reads and writes; `delete` exists for management front-ends.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read the credential stored for `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached or the entry is corrupt.
    /// A missing entry is `Ok(None)`.
    async fn read(&self, target: &str) -> Result<Option<StoredCredential>, StoreError>;

    /// Store `credential` for `target`, replacing any existing entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write.
    async fn write(
        &self,
        target: &str,
        credential: &StoredCredential,
        scope: PersistScope,
    ) -> Result<(), StoreError>;

    /// Remove the entry for `target`. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the delete.
    async fn delete(&self, target: &str) -> Result<bool, StoreError>;
}

/// Process-local store backed by a concurrent map.
///
/// Entries written with either scope live until the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: DashMap<String, StoredCredential>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry.
    #[must_use]
    pub fn with_entry(self, target: &str, credential: StoredCredential) -> Self {
        self.entries.insert(target.to_ascii_lowercase(), credential);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn read(&self, target: &str) -> Result<Option<StoredCredential>, StoreError> {
        Ok(self
            .entries
            .get(&target.to_ascii_lowercase())
            .map(|entry| entry.value().clone()))
    }

    async fn write(
        &self,
        target: &str,
        credential: &StoredCredential,
        _scope: PersistScope,
    ) -> Result<(), StoreError> {
        self.entries
            .insert(target.to_ascii_lowercase(), credential.clone());
        Ok(())
    }

    async fn delete(&self, target: &str) -> Result<bool, StoreError> {
        Ok(self.entries.remove(&target.to_ascii_lowercase()).is_some())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn test_read_missing_is_none() {
        let store = MemoryCredentialStore::new();
        assert!(store.read("proxy.example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_keys_are_case_insensitive() {
        let store = MemoryCredentialStore::new();
        store
            .write(
                "Proxy.Example.COM",
                &StoredCredential::new("alice", "pw"),
                PersistScope::Session,
            )
            .await
            .unwrap();

        let read = store.read("proxy.example.com").await.unwrap().unwrap();
        assert_eq!(read, StoredCredential::new("alice", "pw"));
    }

    #[tokio::test]
    async fn test_write_replaces_and_delete_removes() {
        let store =
            MemoryCredentialStore::new().with_entry("proxy", StoredCredential::new("alice", "a"));
        let bob = StoredCredential::new("bob", "b");
        store
            .write("proxy", &bob, PersistScope::LocalMachine)
            .await
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.read("proxy").await.unwrap().unwrap().username, "bob");

        assert!(store.delete("proxy").await.unwrap());
        assert!(!store.delete("proxy").await.unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", StoredCredential::new("alice", "hunter2"));
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }
}
