//! Configuration
//!
//! Settings come from built-in defaults, then an optional TOML file, then
//! `DOCQA_*` environment variables. The CLI applies its flags last.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::documents::{DEFAULT_MAX_CHUNK_SIZE, DEFAULT_TOP_K};

/// Directory name under the platform data/config dirs
const APP_DIR: &str = "docqa";

const ENV_DATA_DIR: &str = "DOCQA_DATA_DIR";
const ENV_MAX_CHUNK_SIZE: &str = "DOCQA_MAX_CHUNK_SIZE";
const ENV_TOP_K: &str = "DOCQA_TOP_K";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] toml::de::Error),
    #[error("Invalid setting {0}: {1}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Settings {
    /// Root of the document store
    pub data_dir: PathBuf,
    /// Maximum chunk length in characters
    pub max_chunk_size: usize,
    /// Chunks returned per question
    pub top_k: usize,
    /// Entries kept by the embedding cache (0 disables it)
    pub embedding_cache_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            top_k: DEFAULT_TOP_K,
            embedding_cache_capacity: 4096,
        }
    }
}

/// Platform data dir, falling back to the working directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// `<config dir>/docqa/config.toml`, if a config dir exists
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

impl Settings {
    /// Load settings.
    ///
    /// An explicit `path` must exist. Without one, the default config file
    /// is read only if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(p) => Self::from_file(p)?,
            None => match default_config_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Reading config file");
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup(ENV_MAX_CHUNK_SIZE) {
            self.max_chunk_size = parse_usize(ENV_MAX_CHUNK_SIZE, &value)?;
        }
        if let Some(value) = lookup(ENV_TOP_K) {
            self.top_k = parse_usize(ENV_TOP_K, &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_chunk_size == 0 {
            return Err(ConfigError::Invalid("max_chunk_size", "must be at least 1".to_string()));
        }
        if self.top_k == 0 {
            return Err(ConfigError::Invalid("top_k", "must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_usize(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    value.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(key, format!("not a number: {}", value)))
}
