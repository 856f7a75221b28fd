use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `auto`, `onnx`, `tfidf` or `hash`.
    pub tier: String,
    pub model: String,
    pub cache_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_top_k: usize,
    pub default_threshold: f64,
    pub candidate_limit: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_nexus_dir()
            .join("knowledge.db")
            .to_string_lossy()
            .into_owned();
        Self {
            db_path,
            busy_timeout_ms: 5000,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_nexus_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            tier: "auto".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            default_threshold: 0.35,
            candidate_limit: 500,
        }
    }
}

/// Returns `~/.nexus/`
pub fn default_nexus_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".nexus")
}

/// Returns the default config file path: `~/.nexus/config.toml`
pub fn default_config_path() -> PathBuf {
    default_nexus_dir().join("config.toml")
}

impl KnowledgeConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            KnowledgeConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (NEXUS_KNOWLEDGE_DB, NEXUS_LOG_LEVEL, NEXUS_EMBEDDING_TIER).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("NEXUS_KNOWLEDGE_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("NEXUS_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("NEXUS_EMBEDDING_TIER") {
            self.embedding.tier = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

impl EmbeddingConfig {
    pub fn resolved_cache_dir(&self) -> PathBuf {
        expand_tilde(&self.cache_dir)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
