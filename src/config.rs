use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::scan::ContentFilter;

/// Name of the per-user directory holding the config file and the cache.
pub const CONFIG_DIR_NAME: &str = ".vectrekker";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub base: BaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub indexer: IndexerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BaseConfig {
    pub content_folder: PathBuf,
    #[serde(default = "default_content_regex")]
    pub content_regex: String,
    #[serde(default)]
    pub follow_symlinks: bool,
}

pub fn default_content_regex() -> String {
    r".*\.md$".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CacheConfig {
    /// Overrides `<config_dir>/cache.db`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexerConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}

impl Config {
    /// Location of the change cache database.
    pub fn cache_path(&self) -> Result<PathBuf> {
        match &self.cache.path {
            Some(path) => Ok(path.clone()),
            None => Ok(config_dir()?.join("cache.db")),
        }
    }
}

/// `~/.vectrekker`
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine the home directory")?;
    Ok(home.join(CONFIG_DIR_NAME))
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Create an empty config file (and its directory) if none exists yet.
pub fn ensure_config_file(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }
    std::fs::write(path, "")
        .with_context(|| format!("Failed to create config file: {}", path.display()))?;
    tracing::info!(path = %path.display(), "created empty config file");
    Ok(())
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
        .with_context(|| format!("Invalid config file: {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.base.content_folder.as_os_str().is_empty() {
        bail!("base.content_folder must not be empty");
    }

    ContentFilter::new(&config.base.content_regex).with_context(|| {
        format!(
            "base.content_regex is not a valid regular expression: '{}'",
            config.base.content_regex
        )
    })?;

    match config.indexer.provider.as_str() {
        "disabled" | "noop" => {}
        other => bail!(
            "Unknown indexer provider: '{}'. Must be disabled or noop.",
            other
        ),
    }

    Ok(config)
}
