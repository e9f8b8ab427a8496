//! proxyauth CLI - fetch resources through authenticating proxies
//!
//! `proxyauth fetch` resolves a URI through the configured proxy, escalating
//! from the ambient identity to keychain credentials to an interactive prompt
//! whenever the proxy answers 407. `proxyauth credentials` manages the keychain
//! entries that escalation reads.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use url::Url;

mod commands;
mod config;
mod console_prompt;
mod display;
mod keyring_store;

use crate::commands::FetchOptions;
use crate::config::CliConfig;

#[derive(Parser, Debug)]
#[command(name = "proxyauth", author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a resource and write it to stdout or a file
    Fetch {
        /// The http or https URI to fetch
        uri: Url,

        /// Proxy URL, overriding the config file and environment
        #[arg(long)]
        proxy: Option<String>,

        /// Never prompt for credentials
        #[arg(long)]
        no_prompt: bool,

        /// Write the body to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Per-attempt timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Suppress status output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Manage proxy credentials stored in the keychain
    #[command(subcommand)]
    Credentials(CredentialsCommand),

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
enum CredentialsCommand {
    /// Prompt for a credential and store it for a proxy host
    Set {
        /// Proxy host name, e.g. proxy.example.com
        host: String,

        /// User name; prompted for when omitted
        #[arg(long)]
        username: Option<String>,
    },

    /// Remove the stored credential for a proxy host
    Delete {
        /// Proxy host name
        host: String,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the configuration file location
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Fetch {
            uri,
            proxy,
            no_prompt,
            output,
            timeout,
            quiet,
        } => {
            let config = match &args.config {
                Some(path) => CliConfig::load_from(path)?,
                None => CliConfig::load()?,
            };
            commands::fetch(
                config,
                FetchOptions {
                    uri,
                    proxy,
                    no_prompt,
                    output,
                    timeout,
                    quiet,
                },
            )
            .await
        }
        Command::Credentials(CredentialsCommand::Set { host, username }) => {
            commands::credentials_set(host, username).await
        }
        Command::Credentials(CredentialsCommand::Delete { host }) => {
            commands::credentials_delete(&host).await
        }
        Command::Config(ConfigCommand::Path) => commands::config_path(),
    }
}
