use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::config::Overrides;

pub const DEFAULT_CONFIG: &str = "lifecycle.toml";

#[derive(Parser, Debug)]
#[command(
    name = "lifecycle-tracker",
    version,
    about = "Look up release, end-of-support and end-of-life dates for IT products"
)]
pub struct Cli {
    /// TOML config file. A missing file means built-in defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// `gemini` or `local`.
    #[arg(long, global = true)]
    pub provider: Option<String>,
    #[arg(long, global = true)]
    pub model: Option<String>,
    #[arg(long = "api-key", global = true)]
    pub api_key: Option<String>,
    #[arg(long = "history-dir", global = true)]
    pub history_dir: Option<PathBuf>,
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG))
    }

    pub fn overrides(&self) -> Overrides {
        Overrides {
            provider: self.provider.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            history_dir: self.history_dir.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Query the lifecycle of one product.
    Search {
        #[arg(required = true, num_args = 1..)]
        product: Vec<String>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List recent searches, most recent first.
    History {
        #[command(subcommand)]
        action: Option<HistoryCommand>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Re-run the N-th entry of `history` (1 = most recent).
    Replay {
        index: usize,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print a few example queries.
    Suggestions,
    /// Interactive search loop.
    Shell,
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    Clear,
}
