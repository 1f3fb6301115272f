use crate::error::{RecallError, Result};
use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallConfig {
    /// Where the memory JSON file lives; defaults to the platform data dir
    #[serde(default)]
    pub storage_path: Option<PathBuf>,

    /// Which ranker backs semantic search
    #[serde(default)]
    pub ranker: RankerKind,

    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Dimension of the hashed bag-of-words embedding space
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankerKind {
    #[default]
    Embedding,
    /// No ranking capability; search always returns empty
    None,
}

fn default_search_limit() -> usize {
    5
}

fn default_history_limit() -> usize {
    20
}

fn default_embedding_dim() -> usize {
    128
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            storage_path: None,
            ranker: RankerKind::default(),
            search_limit: default_search_limit(),
            history_limit: default_history_limit(),
            embedding_dim: default_embedding_dim(),
        }
    }
}

pub struct ConfigManager {
    config: RecallConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_path_internal()?;
        let config = Self::load_or_default(&config_path)?;

        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn load() -> Result<RecallConfig> {
        let config_path = Self::get_config_path_internal()?;
        Self::load_or_default(&config_path)
    }

    pub fn save(&self) -> Result<()> {
        let toml = toml::to_string_pretty(&self.config)
            .map_err(|e| RecallError::Configuration(format!("Failed to serialize config: {}", e)))?;

        fs::write(&self.config_path, toml)
            .map_err(|e| RecallError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn get(&self) -> &RecallConfig {
        &self.config
    }

    pub fn get_mut(&mut self) -> &mut RecallConfig {
        &mut self.config
    }

    pub fn get_config_path(&self) -> Result<PathBuf> {
        Ok(self.config_path.clone())
    }

    fn get_config_path_internal() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("com", "recall", "recall").ok_or_else(|| {
            RecallError::Configuration("Could not determine config directory".to_string())
        })?;

        let config_dir = project_dirs.config_dir();
        fs::create_dir_all(config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    fn load_or_default(path: &PathBuf) -> Result<RecallConfig> {
        if !path.exists() {
            return Ok(RecallConfig::default());
        }

        let s = Config::builder()
            .add_source(File::from(path.clone()))
            .add_source(Environment::with_prefix("RECALL"))
            .build()
            .map_err(|e| RecallError::Configuration(format!("Failed to build config: {}", e)))?;

        let config: RecallConfig = s.try_deserialize().map_err(|e| {
            RecallError::Configuration(format!("Failed to deserialize config: {}", e))
        })?;

        Ok(config)
    }
}

impl RecallConfig {
    /// Resolve the path of the memory JSON file, honoring the configured
    /// override.
    pub fn resolve_storage_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.storage_path {
            return Ok(path.clone());
        }

        let project_dirs = ProjectDirs::from("com", "recall", "recall").ok_or_else(|| {
            RecallError::Configuration("Could not determine data directory".to_string())
        })?;

        Ok(project_dirs.data_dir().join("memory.json"))
    }
}
