//! Interactive loop over one [`SearchSession`]. Plain lines are product
//! searches, lines starting with `:` are commands.

use std::io::Write;

use anyhow::Result;
use lifecycle_core::{Collaborator, Phase, SearchSession, SessionState, Slot, TextRenderer};
use secrecy::SecretString;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::commands::SUGGESTIONS;

const PROMPT: &str = "lifecycle> ";
const RESEARCHING: &str = "Researching product lifecycle details...";

const HELP: &str = "\
Type a product name (e.g. Windows 10) to look up its lifecycle.
Commands:
  :retry          run the failed search again
  :dismiss        clear the current error
  :history        list recent searches
  :replay N       re-run history entry N (1 = most recent)
  :clear          forget all recent searches
  :key <API_KEY>  use this API key for the rest of the session
  :suggest        show example searches
  :help           show this help
  :quit           leave the shell
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Search(String),
    Retry,
    Dismiss,
    History,
    Replay(usize),
    Clear,
    Key(String),
    Suggest,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

pub fn parse(line: &str) -> ShellCommand {
    let line = line.trim();
    if line.is_empty() {
        return ShellCommand::Empty;
    }
    let Some(rest) = line.strip_prefix(':') else {
        return ShellCommand::Search(line.to_string());
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name.to_lowercase().as_str() {
        "retry" | "r" => ShellCommand::Retry,
        "dismiss" => ShellCommand::Dismiss,
        "history" | "h" => ShellCommand::History,
        "replay" => match arg.parse::<usize>() {
            Ok(index) if index > 0 => ShellCommand::Replay(index),
            _ => ShellCommand::Invalid("usage: :replay N (1 = most recent)".to_string()),
        },
        "clear" => ShellCommand::Clear,
        "key" if !arg.is_empty() => ShellCommand::Key(arg.to_string()),
        "key" => ShellCommand::Invalid("usage: :key <API_KEY>".to_string()),
        "suggest" => ShellCommand::Suggest,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" | "q" => ShellCommand::Quit,
        other => ShellCommand::Invalid(format!("unknown command :{other}, try :help")),
    }
}

/// Runs until `:quit` or end of input.
pub async fn run<C, S, R, W>(
    session: &mut SearchSession<C, S>,
    renderer: &TextRenderer,
    input: R,
    out: &mut W,
) -> Result<()>
where
    C: Collaborator,
    S: Slot,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    writeln!(out, "Type a product name to search, or :help for commands.")?;
    if session.state().needs_credential || !session.client().has_credential() {
        writeln!(out, "No API key configured yet. Use :key <API_KEY> first.")?;
    }
    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;
        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };
        match parse(&line) {
            ShellCommand::Empty => {}
            ShellCommand::Search(query) => {
                researching(out)?;
                session.submit(&query).await;
                show(session.state(), renderer, out)?;
            }
            ShellCommand::Retry => {
                if matches!(session.phase(), Phase::Failure(_)) {
                    researching(out)?;
                    session.retry().await;
                    show(session.state(), renderer, out)?;
                } else {
                    writeln!(out, "Nothing to retry.")?;
                }
            }
            ShellCommand::Dismiss => {
                session.dismiss();
            }
            ShellCommand::History => {
                out.write_all(renderer.history(session.history()).as_bytes())?;
            }
            ShellCommand::Replay(index) if index > session.history().len() => {
                writeln!(out, "No history entry #{index}.")?;
            }
            ShellCommand::Replay(index) => {
                researching(out)?;
                session.replay(index - 1).await;
                show(session.state(), renderer, out)?;
            }
            ShellCommand::Clear => {
                session.clear_history();
                writeln!(out, "Search history cleared.")?;
            }
            ShellCommand::Key(key) => {
                session.configure_credential(SecretString::new(key));
                writeln!(out, "API key set for this session.")?;
                if matches!(session.phase(), Phase::Failure(_)) {
                    let query = &session.state().last_query;
                    writeln!(out, "Use :retry to search for {query} again.")?;
                }
            }
            ShellCommand::Suggest => {
                for suggestion in SUGGESTIONS {
                    writeln!(out, "  {suggestion}")?;
                }
            }
            ShellCommand::Help => out.write_all(HELP.as_bytes())?,
            ShellCommand::Quit => break,
            ShellCommand::Invalid(message) => writeln!(out, "{message}")?,
        }
    }
    Ok(())
}

/// Printed before each query starts.
fn researching<W: Write>(out: &mut W) -> Result<()> {
    writeln!(out, "{RESEARCHING}")?;
    out.flush()?;
    Ok(())
}

fn show<W: Write>(state: &SessionState, renderer: &TextRenderer, out: &mut W) -> Result<()> {
    match &state.phase {
        Phase::Success(result) => renderer.write_report(result, &mut *out)?,
        Phase::Failure(info) => {
            writeln!(out, "error: {}", info.message)?;
            if state.needs_credential {
                writeln!(out, "Set a key with :key <API_KEY>, then :retry.")?;
            } else {
                writeln!(out, "Use :retry to try again or :dismiss to clear the error.")?;
            }
        }
        Phase::Idle | Phase::Loading => {}
    }
    Ok(())
}
