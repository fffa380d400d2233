//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `ragkit.toml` + `ragkit.<env>.toml`
//! + `RAGKIT_*` env vars (`__` separates nesting, e.g. `RAGKIT_INGEST__WORKERS`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ingest: IngestSettings,
    pub embedding: EmbeddingSettings,
    pub strategies: StrategySettings,
    pub store: StoreSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Files per ingestion batch.
    pub batch_size: usize,
    /// Concurrent parse tasks and concurrent batches.
    pub workers: usize,
    pub continue_on_error: bool,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self { batch_size: 16, workers: 4, continue_on_error: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub batch_size: usize,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { batch_size: 32, max_attempts: 3, initial_backoff_ms: 200, max_backoff_ms: 5_000 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    /// Strategy definition files, loaded in order.
    pub files: Vec<String>,
    /// Allow a later file to replace a strategy of the same name.
    pub merge: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Base directory for relative on-disk store locations.
    pub data_dir: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { data_dir: "./.ragkit".to_string() }
    }
}

impl StoreSettings {
    pub fn data_dir(&self) -> PathBuf {
        expand_path(&self.data_dir)
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    /// Merge defaults, `ragkit.toml`, `ragkit.<env>.toml` and `RAGKIT_*` variables.
    pub fn load() -> Result<Self> {
        let env_name = env::var("RAGKIT_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    pub fn load_from(dir: &Path, env_name: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("ragkit.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("ragkit.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("ragkit.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("ragkit.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("RAGKIT_").split("__"));
        Ok(Self { figment })
    }

    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        if settings.ingest.batch_size == 0 || settings.ingest.workers == 0 {
            return Err(Error::InvalidConfig("ingest.batch_size and ingest.workers must be positive".into()));
        }
        if settings.embedding.batch_size == 0 || settings.embedding.max_attempts == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size and embedding.max_attempts must be positive".into()));
        }
        Ok(settings)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
