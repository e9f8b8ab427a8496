//! Command implementations for the CLI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use url::Url;

use proxyauth::{
    CredentialPrompt, CredentialStore, EntityResolver, HttpFetcher, NoPrompt, PersistScope,
    ProxyAuthorizationController, ProxySettings, ResourceStream, StoredCredential,
};

use crate::config::CliConfig;
use crate::console_prompt::{ConsolePrompt, read_credentials};
use crate::display::{display_event, display_fetched, display_resolve_hint};
use crate::keyring_store::KeyringStore;

/// Options for `proxyauth fetch`.
pub struct FetchOptions {
    pub uri: Url,
    pub proxy: Option<String>,
    pub no_prompt: bool,
    pub output: Option<PathBuf>,
    pub timeout: Option<u64>,
    pub quiet: bool,
}

/// Fetches a resource, escalating proxy credentials as needed.
///
/// # Errors
///
/// Returns an error if the resource cannot be fetched or written.
pub async fn fetch(config: CliConfig, options: FetchOptions) -> Result<()> {
    let mut fetch_config = config.fetch.clone();
    if let Some(timeout) = options.timeout {
        fetch_config.timeout_seconds = timeout;
    }

    let mut fetcher = HttpFetcher::new(fetch_config)?;
    if let Some(identity) = &config.identity {
        fetcher = fetcher.with_default_identity(identity.credential()?);
    }

    let proxies = options
        .proxy
        .map_or_else(|| config.proxy_settings(), ProxySettings::new);

    let mut resolver_config = config.resolver.clone();
    let prompt: Arc<dyn CredentialPrompt> = if options.no_prompt {
        resolver_config.allow_prompt = false;
        Arc::new(NoPrompt)
    } else {
        Arc::new(ConsolePrompt)
    };

    let controller = Arc::new(
        ProxyAuthorizationController::new(Arc::new(KeyringStore::default()), prompt)
            .with_persist_scope(PersistScope::LocalMachine),
    );

    let mut resolver =
        EntityResolver::new(fetcher, controller, Arc::new(proxies)).with_config(resolver_config);
    if !options.quiet {
        resolver = resolver.with_event_callback(display_event);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let stream = match resolver.fetch(&options.uri, &cancel).await {
        Ok(stream) => stream,
        Err(e) => {
            if !options.quiet {
                display_resolve_hint(&e);
            }
            return Err(e.into());
        }
    };

    let (written, destination) = match &options.output {
        Some(path) => {
            let mut file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let written = copy_stream(stream, &mut file).await?;
            (written, path.display().to_string())
        }
        None => {
            let mut stdout = tokio::io::stdout();
            (copy_stream(stream, &mut stdout).await?, "stdout".to_string())
        }
    };

    if !options.quiet {
        display_fetched(written, &destination);
    }
    Ok(())
}

async fn copy_stream<W>(mut stream: ResourceStream, writer: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Failed while reading the response body")?;
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    writer.flush().await?;
    Ok(written)
}

/// Prompts for a credential and stores it in the keychain for `host`.
///
/// # Errors
///
/// Returns an error if the terminal cannot be read or the keychain rejects the
/// write.
pub async fn credentials_set(host: String, username: Option<String>) -> Result<()> {
    let prompt_host = host.clone();
    let entered = tokio::task::spawn_blocking(move || {
        read_credentials(&prompt_host, username.as_deref(), false)
    })
    .await??;

    let Some(entered) = entered else {
        println!("{}", "Cancelled".dimmed());
        return Ok(());
    };
    if entered.username.is_empty() || entered.password.is_empty() {
        bail!("Username and password must not be empty");
    }

    KeyringStore::default()
        .write(
            &host,
            &StoredCredential::new(entered.username, entered.password),
            PersistScope::LocalMachine,
        )
        .await?;

    println!(
        "{} Stored credential for {}",
        "✓".bright_green(),
        host.bold()
    );
    Ok(())
}

/// Removes the keychain entry for `host`.
///
/// # Errors
///
/// Returns an error if the keychain rejects the delete.
pub async fn credentials_delete(host: &str) -> Result<()> {
    if KeyringStore::default().delete(host).await? {
        println!(
            "{} Removed credential for {}",
            "✓".bright_green(),
            host.bold()
        );
    } else {
        println!("{} No credential stored for {}", "·".dimmed(), host.bold());
    }
    Ok(())
}

/// Prints the configuration file location.
///
/// # Errors
///
/// Returns an error if the config directory cannot be determined.
pub fn config_path() -> Result<()> {
    let path = CliConfig::config_path()?;
    let state = if path.exists() { "" } else { " (not created)" };
    println!("{}{}", path.display(), state.dimmed());
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn test_copy_stream_counts_bytes() {
        let stream = ResourceStream::from_bytes("<schema/>");
        let mut out = Vec::new();

        let written = copy_stream(stream, &mut out).await.unwrap();

        assert_eq!(written, 9);
        assert_eq!(out, b"<schema/>");
    }
}
