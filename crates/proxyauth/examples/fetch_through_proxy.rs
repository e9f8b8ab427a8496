use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use log::info;
use tokio_util::sync::CancellationToken;
use url::Url;

use proxyauth::{
    EntityResolver, FetchConfig, HttpFetcher, MemoryCredentialStore, NoPrompt,
    ProxyAuthorizationController, ProxySettings, ResolveEvent, StoredCredential,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URI to fetch
    #[arg(long, default_value = "http://example.com/")]
    uri: Url,

    /// Proxy URL
    #[arg(long, default_value = "http://localhost:3128")]
    proxy: String,

    /// User name to seed the credential store with
    #[arg(long)]
    username: Option<String>,

    /// Password to seed the credential store with
    #[arg(long, default_value = "")]
    password: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let settings = ProxySettings::new(&args.proxy);
    let proxy = settings.proxy_for(&args.uri);
    let mut store = MemoryCredentialStore::new();
    if let Some(username) = &args.username
        && let Some(host) = proxy.as_ref().and_then(Url::host_str)
    {
        info!("Seeding credential store for {host}");
        store = store.with_entry(host, StoredCredential::new(username, &args.password));
    }

    let controller = Arc::new(ProxyAuthorizationController::new(
        Arc::new(store),
        Arc::new(NoPrompt),
    ));
    let resolver = EntityResolver::new(
        HttpFetcher::new(FetchConfig::default())?,
        controller,
        Arc::new(settings),
    )
    .with_event_callback(|event| match event {
        ResolveEvent::Attempt { state, .. } => println!("{} attempt ({state})", "→".dimmed()),
        ResolveEvent::Escalated { from, to, .. } => {
            println!("{} {from} -> {to}", "407".bright_yellow());
        }
        ResolveEvent::Resolved { state, .. } => println!("{} at {state}", "✓".bright_green()),
    });

    let cancel = CancellationToken::new();
    for round in 1..=2 {
        let body = resolver.fetch(&args.uri, &cancel).await?.bytes().await?;
        println!(
            "{} fetch {round}: {} bytes",
            "Done".bright_cyan().bold(),
            body.len()
        );
    }

    Ok(())
}
