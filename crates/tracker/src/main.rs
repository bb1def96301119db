mod cli;
mod commands;
mod config;
mod logging;
mod shell;

use std::env;
use std::io;

use anyhow::Result;
use clap::Parser;
use lifecycle_core::TextRenderer;
use tokio::io::BufReader;

use crate::cli::{Cli, Command, HistoryCommand};
use crate::config::TrackerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = if cli.verbose {
        true
    } else {
        logging::env_flag()
    };
    logging::init(verbose);

    let file_config = config::load_file(&cli.config_path())?;
    let config = TrackerConfig::resolve(&cli.overrides(), file_config, |key| env::var(key).ok())?;
    let renderer = TextRenderer::with_config(config.render.clone());
    let mut stdout = io::stdout();

    match cli.command {
        Command::Search { product, json } => {
            let mut session = commands::open_session(config)?;
            commands::search(&mut session, &product.join(" "), json, &renderer, &mut stdout).await
        }
        Command::History { action, json } => {
            let store = commands::open_store(&config)?;
            match action {
                Some(HistoryCommand::Clear) => commands::clear_history(&store, &mut stdout),
                None => commands::history(&store, json, &renderer, &mut stdout),
            }
        }
        Command::Replay { index, json } => {
            let mut session = commands::open_session(config)?;
            commands::replay(&mut session, index, json, &renderer, &mut stdout).await
        }
        Command::Suggestions => commands::suggestions(&mut stdout),
        Command::Shell => {
            let mut session = commands::open_session(config)?;
            let input = BufReader::new(tokio::io::stdin());
            shell::run(&mut session, &renderer, input, &mut stdout).await
        }
    }
}
