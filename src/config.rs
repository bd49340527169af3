//! Configuration parsing and validation.
//!
//! ragchat is configured by one TOML file, passed with `--config`
//! (default `./config/ragchat.toml`). Only `[db]` is required; every
//! other section has defaults.
//!
//! ```toml
//! [db]
//! path = "./data/ragchat.sqlite"
//!
//! [retrieval]
//! top_k = 1
//!
//! [model]
//! provider = "ollama"
//! model = "llama3.2"
//!
//! [connectors.docs]
//! root = "./docs"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub connectors: ConnectorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Name of the record collection inside the database.
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
        }
    }
}

fn default_collection() -> String {
    "knowledge".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    700
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Matches injected as context per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl ModelConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "ollama".to_string()
}
fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> Option<String> {
    Some("llama3.2".to_string())
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_max_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// System preamble opening every chat session. Empty disables it.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_system_prompt() -> String {
    "To answer the user question, you must use the relevant information \
     provided in the context messages that precede it."
        .to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConnectorsConfig {
    pub faq: Option<FaqConnectorConfig>,
    pub docs: Option<DocsConnectorConfig>,
    pub git: Option<GitConnectorConfig>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FaqConnectorConfig {
    /// JSON file of `{question, answer}` objects. The built-in GitHub FAQ
    /// is used when unset.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocsConnectorConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.txt".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitConnectorConfig {
    /// Path to a local repository (or any directory inside one).
    #[serde(default = "default_repo")]
    pub repo: PathBuf,
    #[serde(default = "default_rev")]
    pub rev: String,
    #[serde(default = "default_max_commits")]
    pub max_commits: usize,
}

fn default_repo() -> PathBuf {
    PathBuf::from(".")
}
fn default_rev() -> String {
    "HEAD".to_string()
}
fn default_max_commits() -> usize {
    500
}

impl Config {
    /// Configuration for a database at `db_path` with every other section
    /// at its default.
    pub fn with_db(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            store: StoreConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            model: ModelConfig::default(),
            session: SessionConfig::default(),
            connectors: ConnectorsConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.store.collection.trim().is_empty() {
        bail!("store.collection must not be empty");
    }

    if config.chunking.max_tokens == 0 {
        bail!("chunking.max_tokens must be > 0");
    }

    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }

    match config.model.provider.as_str() {
        "disabled" | "ollama" => {}
        other => bail!(
            "Unknown model provider: '{}'. Must be disabled or ollama.",
            other
        ),
    }

    if config.model.is_enabled() && config.model.model.as_deref().unwrap_or("").is_empty() {
        bail!(
            "model.model must be specified when provider is '{}'",
            config.model.provider
        );
    }

    if let Some(git) = &config.connectors.git {
        if git.max_commits == 0 {
            bail!("connectors.git.max_commits must be > 0");
        }
    }

    Ok(())
}
