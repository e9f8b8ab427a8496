//! Credential store backed by the platform keychain.
//!
//! Each proxy host gets one entry under the `proxyauth` service. The entry's
//! secret is a small JSON document holding both the user name and the password,
//! so that a single keychain lookup yields the whole credential.

use async_trait::async_trait;
use log::debug;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use proxyauth::{CredentialStore, PersistScope, StoreError, StoredCredential};

const SERVICE: &str = "proxyauth";

#[derive(Serialize, Deserialize)]
struct KeyringEntry {
    username: String,
    password: String,
}

/// [`CredentialStore`] over the `keyring` crate.
///
/// Keychain calls block, so every operation runs on the blocking pool. Both
/// persist scopes map to the keychain's own persistence.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(SERVICE)
    }
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    async fn run<T, F>(&self, target: &str, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(keyring::Entry) -> Result<T, StoreError> + Send + 'static,
    {
        let service = self.service.clone();
        let target = target.to_ascii_lowercase();

        tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&service, &target).map_err(unavailable)?;
            op(entry)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("keychain task failed: {e}")))?
    }
}

fn unavailable(error: keyring::Error) -> StoreError {
    StoreError::Unavailable(error.to_string())
}

fn encode(credential: &StoredCredential) -> Result<String, StoreError> {
    serde_json::to_string(&KeyringEntry {
        username: credential.username.clone(),
        password: credential.secret.expose_secret().to_string(),
    })
    .map_err(|e| StoreError::Unavailable(format!("failed to encode credential: {e}")))
}

fn decode(target: &str, raw: &str) -> Result<StoredCredential, StoreError> {
    let entry: KeyringEntry = serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
        target: target.to_string(),
        reason: e.to_string(),
    })?;
    Ok(StoredCredential::new(entry.username, entry.password))
}

#[async_trait]
impl CredentialStore for KeyringStore {
    async fn read(&self, target: &str) -> Result<Option<StoredCredential>, StoreError> {
        let key = target.to_string();
        self.run(target, move |entry| match entry.get_password() {
            Ok(raw) => decode(&key, &raw).map(Some),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(unavailable(e)),
        })
        .await
    }

    async fn write(
        &self,
        target: &str,
        credential: &StoredCredential,
        scope: PersistScope,
    ) -> Result<(), StoreError> {
        debug!("Writing keychain entry for {target} ({scope:?})");
        let raw = encode(credential)?;
        self.run(target, move |entry| entry.set_password(&raw).map_err(unavailable))
            .await
    }

    async fn delete(&self, target: &str) -> Result<bool, StoreError> {
        self.run(target, |entry| match entry.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(unavailable(e)),
        })
        .await
    }
}
