use std::io::Write;

use anyhow::{anyhow, bail, Result};
use lifecycle_core::{
    Collaborator, FileSlot, HistoryStore, LifecycleClient, LlmClient, Phase, SearchSession,
    SessionState, Slot, TextRenderer, HISTORY_KEY,
};
use tracing::debug;

use crate::config::TrackerConfig;

pub const SUGGESTIONS: [&str; 5] = [
    "Windows 10",
    "Ubuntu 22.04",
    "Java 8",
    "Cisco Catalyst 9300",
    "Node.js 18",
];

pub fn open_store(config: &TrackerConfig) -> Result<HistoryStore<FileSlot>> {
    let slot = match &config.history_dir {
        Some(dir) => FileSlot::new(dir, HISTORY_KEY),
        None => FileSlot::default_history()?,
    };
    debug!(path = %slot.path().display(), "using history file");
    Ok(HistoryStore::new(slot))
}

pub fn open_session(config: TrackerConfig) -> Result<SearchSession<LlmClient, FileSlot>> {
    let store = open_store(&config)?;
    let collaborator = LlmClient::with_options(config.provider, config.base_url, config.timeout)?;
    let client = LifecycleClient::new(collaborator, config.api_key).with_model(config.model);
    debug!(
        provider = client.collaborator().provider().as_str(),
        model = client.model(),
        "opening search session"
    );
    Ok(SearchSession::open(client, store))
}

pub async fn search<C, S, W>(
    session: &mut SearchSession<C, S>,
    product: &str,
    json: bool,
    renderer: &TextRenderer,
    out: &mut W,
) -> Result<()>
where
    C: Collaborator,
    S: Slot,
    W: Write,
{
    let product = product.trim();
    if product.is_empty() {
        bail!("product name must not be empty");
    }
    session.submit(product).await;
    report(session.state(), json, renderer, out)
}

/// `index` is 1-based, as printed by `history`.
pub async fn replay<C, S, W>(
    session: &mut SearchSession<C, S>,
    index: usize,
    json: bool,
    renderer: &TextRenderer,
    out: &mut W,
) -> Result<()>
where
    C: Collaborator,
    S: Slot,
    W: Write,
{
    let Some(position) = index
        .checked_sub(1)
        .filter(|position| *position < session.history().len())
    else {
        bail!("no history entry #{index}; run `lifecycle-tracker history` to list them");
    };
    session.replay(position).await;
    report(session.state(), json, renderer, out)
}

pub fn history<S: Slot, W: Write>(
    store: &HistoryStore<S>,
    json: bool,
    renderer: &TextRenderer,
    out: &mut W,
) -> Result<()> {
    let history = store.load();
    if json {
        serde_json::to_writer_pretty(&mut *out, &history)?;
        writeln!(out)?;
    } else {
        out.write_all(renderer.history(&history).as_bytes())?;
    }
    Ok(())
}

pub fn clear_history<S: Slot, W: Write>(store: &HistoryStore<S>, out: &mut W) -> Result<()> {
    store.clear()?;
    writeln!(out, "Search history cleared.")?;
    Ok(())
}

pub fn suggestions<W: Write>(out: &mut W) -> Result<()> {
    for suggestion in SUGGESTIONS {
        writeln!(out, "{suggestion}")?;
    }
    Ok(())
}

/// Writes a finished query. Failures become the returned error so the
/// process exits non-zero.
fn report<W: Write>(
    state: &SessionState,
    json: bool,
    renderer: &TextRenderer,
    out: &mut W,
) -> Result<()> {
    match &state.phase {
        Phase::Success(result) if json => {
            serde_json::to_writer_pretty(&mut *out, result)?;
            writeln!(out)?;
            Ok(())
        }
        Phase::Success(result) => {
            renderer.write_report(result, &mut *out)?;
            Ok(())
        }
        Phase::Failure(info) => {
            if state.needs_credential {
                eprintln!("hint: pass --api-key, or set LIFECYCLE_API_KEY, then search again");
            }
            Err(anyhow!(info.message.clone()))
        }
        Phase::Idle | Phase::Loading => Ok(()),
    }
}
