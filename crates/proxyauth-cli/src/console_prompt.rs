//! Terminal credential prompt with masked password input.

use std::borrow::Cow;

use async_trait::async_trait;
use colored::Colorize;
use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Editor, Helper};

use proxyauth::{CredentialPrompt, PromptError, PromptResponse};

/// Renders the line as `*` while `masking` is on.
#[derive(Default)]
struct MaskingHelper {
    masking: bool,
}

impl Completer for MaskingHelper {
    type Candidate = String;
}

impl Hinter for MaskingHelper {
    type Hint = String;
}

impl Validator for MaskingHelper {}

impl Highlighter for MaskingHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if self.masking {
            Cow::Owned("*".repeat(line.chars().count()))
        } else {
            Cow::Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        self.masking
    }
}

impl Helper for MaskingHelper {}

/// What the user typed, before any validation.
pub struct Entered {
    pub username: String,
    pub password: String,
    pub remember: bool,
}

/// Reads a credential from the terminal. Blocks until the user answers.
///
/// Returns `Ok(None)` when the user presses Ctrl-C or Ctrl-D.
///
/// # Errors
///
/// Returns an error if the terminal cannot be read.
pub fn read_credentials(
    proxy_host: &str,
    username: Option<&str>,
    ask_remember: bool,
) -> Result<Option<Entered>, ReadlineError> {
    eprintln!(
        "{} {}",
        "Proxy authentication required for".bright_yellow(),
        proxy_host.bold()
    );

    let mut rl: Editor<MaskingHelper, DefaultHistory> = Editor::new()?;
    rl.set_helper(Some(MaskingHelper::default()));

    let username = match username {
        Some(username) => {
            eprintln!("{} {username}", "Username:".dimmed());
            username.to_string()
        }
        None => match cancellable(rl.readline("Username: "))? {
            Some(line) => line.trim().to_string(),
            None => return Ok(None),
        },
    };

    set_masking(&mut rl, true);
    let password = cancellable(rl.readline("Password: "));
    set_masking(&mut rl, false);
    let Some(password) = password? else {
        return Ok(None);
    };

    let remember = if ask_remember {
        match cancellable(rl.readline("Remember in keychain? [y/N] "))? {
            Some(answer) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            None => return Ok(None),
        }
    } else {
        false
    };

    Ok(Some(Entered {
        username,
        password,
        remember,
    }))
}

fn set_masking(rl: &mut Editor<MaskingHelper, DefaultHistory>, masking: bool) {
    if let Some(helper) = rl.helper_mut() {
        helper.masking = masking;
    }
}

fn cancellable(line: Result<String, ReadlineError>) -> Result<Option<String>, ReadlineError> {
    match line {
        Ok(line) => Ok(Some(line)),
        Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(None),
        Err(e) => Err(e),
    }
}

fn prompt_error(error: ReadlineError) -> PromptError {
    match error {
        ReadlineError::Io(e) => PromptError::Io(e),
        other => PromptError::Unavailable(other.to_string()),
    }
}

/// [`CredentialPrompt`] on the controlling terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePrompt;

#[async_trait]
impl CredentialPrompt for ConsolePrompt {
    async fn prompt(&self, proxy_host: &str) -> Result<PromptResponse, PromptError> {
        let host = proxy_host.to_string();
        let entered = tokio::task::spawn_blocking(move || read_credentials(&host, None, true))
            .await
            .map_err(|e| PromptError::Unavailable(format!("prompt task failed: {e}")))?
            .map_err(prompt_error)?;

        Ok(match entered {
            Some(entered) => {
                PromptResponse::confirmed(entered.username, entered.password, entered.remember)
            }
            None => PromptResponse::Cancelled,
        })
    }
}
