use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use lifecycle_core::{RenderConfig, DEFAULT_MODEL};
use lifecycle_llm::{LlmProvider, DEFAULT_GEMINI_BASE_URL, DEFAULT_TIMEOUT};
use secrecy::SecretString;
use serde::Deserialize;

const API_KEY_VARS: [&str; 3] = ["LIFECYCLE_API_KEY", "GEMINI_API_KEY", "API_KEY"];

/// Values given on the command line. They beat everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub history_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub history_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub gemini_base_url: Option<String>,
    pub render: RenderSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RenderSection {
    pub width: Option<usize>,
    pub max_cell_chars: Option<usize>,
    pub sources: Option<bool>,
}

#[derive(Debug)]
pub struct TrackerConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub api_key: Option<SecretString>,
    /// `None` selects the platform data directory.
    pub history_dir: Option<PathBuf>,
    pub timeout: Duration,
    pub base_url: String,
    pub render: RenderConfig,
}

impl TrackerConfig {
    /// Resolves every setting from flags, then `env`, then the file, then
    /// defaults.
    pub fn resolve<F>(overrides: &Overrides, file: FileConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider_name = overrides
            .provider
            .clone()
            .or_else(|| env("LIFECYCLE_PROVIDER"))
            .or(file.provider)
            .unwrap_or_else(|| LlmProvider::Gemini.as_str().to_string());
        let provider = LlmProvider::from_str(&provider_name)
            .ok_or_else(|| anyhow!("unknown provider {provider_name}"))?;
        let model = overrides
            .model
            .clone()
            .or_else(|| env("LIFECYCLE_MODEL"))
            .or(file.model)
            .unwrap_or_else(|| default_model(provider).to_string());
        let api_key = overrides
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| {
                API_KEY_VARS
                    .iter()
                    .find_map(|&name| env(name).filter(|key| !key.trim().is_empty()))
            })
            .or(file.api_key)
            .map(SecretString::new);
        let history_dir = overrides
            .history_dir
            .clone()
            .or_else(|| env("LIFECYCLE_HISTORY_DIR").map(PathBuf::from))
            .or(file.history_dir);
        let timeout_secs = env("LIFECYCLE_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse().ok())
            .or(file.timeout_secs);
        if timeout_secs == Some(0) {
            bail!("request timeout must be at least 1 second");
        }
        let timeout = timeout_secs.map(Duration::from_secs).unwrap_or(DEFAULT_TIMEOUT);
        let base_url = env("LIFECYCLE_GEMINI_BASE_URL")
            .or(file.gemini_base_url)
            .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string());

        let defaults = RenderConfig::default();
        let render = RenderConfig {
            width: file.render.width.unwrap_or(defaults.width),
            max_cell_chars: file.render.max_cell_chars.unwrap_or(defaults.max_cell_chars),
            include_sources: file.render.sources.unwrap_or(defaults.include_sources),
        };

        Ok(Self {
            provider,
            model,
            api_key,
            history_dir,
            timeout,
            base_url,
            render,
        })
    }
}

fn default_model(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::Gemini => DEFAULT_MODEL,
        LlmProvider::Local => "local",
    }
}

pub fn load_file(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&contents).map_err(|e| anyhow!("invalid config {}: {e}", path.display()))
}
