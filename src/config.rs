use anyhow::{Context, Result};
use globset::Glob;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Slug of the target collection.
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_collection_name")]
    pub collection_name: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Per-document timeout; 0 disables it.
    #[serde(default = "default_item_timeout_secs")]
    pub item_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            root: None,
            collection: default_collection(),
            collection_name: default_collection_name(),
            batch_size: default_batch_size(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            item_timeout_secs: default_item_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_collection() -> String {
    "public".to_string()
}
fn default_collection_name() -> String {
    "Public".to_string()
}
fn default_batch_size() -> usize {
    50
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.json".to_string()]
}
fn default_item_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_backoff_ms() -> u64 {
    200
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.db.max_connections == 0 {
        anyhow::bail!("db.max_connections must be > 0");
    }

    let import = &config.import;
    if import.batch_size == 0 {
        anyhow::bail!("import.batch_size must be > 0");
    }
    if import.collection.trim().is_empty() {
        anyhow::bail!("import.collection must not be empty");
    }
    if import.include_globs.is_empty() {
        anyhow::bail!("import.include_globs must list at least one pattern");
    }

    for pattern in import.include_globs.iter().chain(&import.exclude_globs) {
        Glob::new(pattern).with_context(|| format!("Invalid glob pattern: '{}'", pattern))?;
    }

    Ok(())
}
