//! TOML configuration.
//!
//! Loaded once at startup by [`load_config`]. Every table except `[vault]`
//! may be omitted. The `VAULT_PATH` environment variable, when set and
//! non-empty, overrides `vault.root`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use vaultqa_core::index::IndexOptions;
use vaultqa_core::retrieve::RetrievalParams;
use vaultqa_core::vocab::{Lexicon, Vocabulary};

/// Environment variable overriding `vault.root`.
pub const VAULT_PATH_ENV: &str = "VAULT_PATH";

/// Lowest accepted `retrieval.exact_alias_score`.
pub const MIN_EXACT_ALIAS_SCORE: f64 = 100.0;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub vault: VaultConfig,
    #[serde(default)]
    pub retrieval: RetrievalParams,
    #[serde(default)]
    pub formatter: FormatterConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub vocabulary: Vocabulary,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VaultConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Designated notes. An empty file name disables that note.
    #[serde(flatten)]
    pub notes: IndexOptions,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string()]
}

impl VaultConfig {
    pub fn index_options(&self) -> IndexOptions {
        let named = |n: &Option<String>| n.clone().filter(|s| !s.trim().is_empty());
        IndexOptions {
            services_index_note: named(&self.notes.services_index_note),
            count_index_note: named(&self.notes.count_index_note),
            count_section: self.notes.count_section.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FormatterConfig {
    /// `disabled`, `command`, or `openai`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Executable for the `command` backend.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            command: None,
            args: Vec::new(),
            endpoint: default_endpoint(),
            model: None,
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_backend() -> String {
    "disabled".to_string()
}
fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl FormatterConfig {
    pub fn is_enabled(&self) -> bool {
        self.backend != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

impl Config {
    /// Compile the `[vocabulary]` table.
    pub fn lexicon(&self) -> Result<Lexicon> {
        Lexicon::new(self.vocabulary.clone()).context("Invalid [vocabulary] table")
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content)?;

    if let Ok(root) = std::env::var(VAULT_PATH_ENV) {
        if !root.trim().is_empty() {
            config.vault.root = PathBuf::from(root.trim());
        }
    }

    Ok(config)
}

/// Parse and validate a configuration document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.vault.include_globs.is_empty() {
        anyhow::bail!("vault.include_globs must not be empty");
    }

    let r = &config.retrieval;
    if r.top_n == 0 {
        anyhow::bail!("retrieval.top_n must be >= 1");
    }
    for (name, weight) in [
        ("title_weight", r.title_weight),
        ("path_weight", r.path_weight),
        ("body_weight", r.body_weight),
        ("alias_weight", r.alias_weight),
        ("phrase_bonus", r.phrase_bonus),
    ] {
        if !weight.is_finite() || weight < 0.0 {
            anyhow::bail!("retrieval.{} must be >= 0", name);
        }
    }
    // Lexical scores are capped one below this value.
    let max_weight = [r.title_weight, r.path_weight, r.body_weight, r.alias_weight, r.phrase_bonus]
        .into_iter()
        .fold(0.0, f64::max);
    let floor = MIN_EXACT_ALIAS_SCORE.max(max_weight * 10.0);
    if !r.exact_alias_score.is_finite() || r.exact_alias_score < floor {
        anyhow::bail!(
            "retrieval.exact_alias_score must be >= {} (at least {} and ten times the largest weight)",
            floor,
            MIN_EXACT_ALIAS_SCORE
        );
    }
    if r.price_pool == 0 || r.price_top_paths == 0 {
        anyhow::bail!("retrieval.price_pool and retrieval.price_top_paths must be >= 1");
    }
    if r.max_excerpt_chars == 0 {
        anyhow::bail!("retrieval.max_excerpt_chars must be > 0");
    }

    let f = &config.formatter;
    if f.timeout_secs == 0 {
        anyhow::bail!("formatter.timeout_secs must be > 0");
    }
    if !(0.0..=2.0).contains(&f.temperature) {
        anyhow::bail!("formatter.temperature must be in [0.0, 2.0]");
    }
    match f.backend.as_str() {
        "disabled" => {}
        "command" => {
            if f.command.as_deref().map_or(true, |c| c.trim().is_empty()) {
                anyhow::bail!("formatter.command must be specified when backend is 'command'");
            }
        }
        "openai" => {
            if f.model.is_none() {
                anyhow::bail!("formatter.model must be specified when backend is 'openai'");
            }
            if f.api_key_env.trim().is_empty() {
                anyhow::bail!("formatter.api_key_env must not be empty");
            }
        }
        other => anyhow::bail!(
            "Unknown formatter backend: '{}'. Must be disabled, command, or openai.",
            other
        ),
    }

    Ok(())
}
