//! Status output for the CLI
//!
//! Everything here goes to stderr so that fetched bytes on stdout stay clean.

use colored::Colorize;

use proxyauth::{ProxyAuthState, ResolveError, ResolveEvent};

fn tier_label(state: ProxyAuthState) -> colored::ColoredString {
    let label = state.to_string();
    match state {
        ProxyAuthState::NoCredentials => label.dimmed(),
        ProxyAuthState::DefaultCredentials => label.cyan(),
        ProxyAuthState::CachedCredentials => label.bright_blue(),
        ProxyAuthState::PromptedCredentials => label.bright_magenta(),
        ProxyAuthState::Abort => label.bright_red(),
    }
}

/// Display one step of the fetch chain
pub fn display_event(event: &ResolveEvent) {
    match event {
        ResolveEvent::Attempt { uri, state } => {
            eprintln!("{} {uri} [{}]", "→".dimmed(), tier_label(*state));
        }
        ResolveEvent::Escalated {
            proxy, from, to, ..
        } => {
            let proxy = proxy.as_deref().unwrap_or("no proxy");
            eprintln!(
                "{} {} {} {} → {}",
                "407".bright_yellow().bold(),
                "from".dimmed(),
                proxy,
                tier_label(*from),
                tier_label(*to)
            );
        }
        ResolveEvent::Resolved { state, .. } => {
            eprintln!(
                "{} authorized at {}",
                "✓".bright_green(),
                tier_label(*state)
            );
        }
    }
}

/// Display the final line of a successful fetch
pub fn display_fetched(bytes: u64, destination: &str) {
    eprintln!(
        "{} {} bytes written to {}",
        "✓".bright_green().bold(),
        bytes.to_string().bold(),
        destination
    );
}

/// Display a hint for resolve failures the user can fix
pub fn display_resolve_hint(error: &ResolveError) {
    match error {
        ResolveError::Aborted { proxy: Some(host), .. } => {
            eprintln!(
                "  {} store a credential with `proxyauth credentials set {host}`",
                "hint:".dimmed()
            );
        }
        ResolveError::Aborted { proxy: None, .. } => {
            eprintln!(
                "  {} no proxy is configured; set [proxy] url or HTTPS_PROXY",
                "hint:".dimmed()
            );
        }
        _ => {}
    }
}
