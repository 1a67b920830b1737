// Configuration - TOML file with per-section defaults
//
// [storage]  where the sled database lives
// [engine]   page and batch sizes for the transfer engine
// [worker]   retry policy for the stats worker

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("Failed to parse config: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// TOP LEVEL
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Default tracing filter directive; RUST_LOG takes precedence
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Config {
    /// Parse a TOML document; missing sections and keys take defaults
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, or return defaults if the file does not exist
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_worker(mut self, worker: WorkerConfig) -> Self {
        self.worker = worker;
        self
    }

    pub fn with_log_filter(mut self, filter: &str) -> Self {
        self.log_filter = filter.to_string();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.worker.validate()?;
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::Invalid("log_filter must not be empty".to_string()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            engine: EngineConfig::default(),
            worker: WorkerConfig::default(),
            log_filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "skillcoin=info".to_string()
}

// ============================================================================
// STORAGE
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.data_dir = dir.into();
        self
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("skillcoin-data")
}

// ============================================================================
// ENGINE
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Versioned rows fetched per page while planning a spend
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Pay records written per chunk inside one commit
    #[serde(default = "default_record_batch_size")]
    pub record_batch_size: usize,
    #[serde(default = "default_max_skills")]
    pub max_skills_per_holder: usize,
    /// Capacity of the settled-transfer event channel
    #[serde(default = "default_stats_queue_capacity")]
    pub stats_queue_capacity: usize,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    pub fn with_record_batch_size(mut self, size: usize) -> Self {
        self.record_batch_size = size;
        self
    }

    pub fn with_max_skills_per_holder(mut self, max: usize) -> Self {
        self.max_skills_per_holder = max;
        self
    }

    pub fn with_stats_queue_capacity(mut self, capacity: usize) -> Self {
        self.stats_queue_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be > 0".to_string()));
        }
        if self.record_batch_size == 0 {
            return Err(ConfigError::Invalid("record_batch_size must be > 0".to_string()));
        }
        if self.max_skills_per_holder == 0 {
            return Err(ConfigError::Invalid("max_skills_per_holder must be > 0".to_string()));
        }
        if self.stats_queue_capacity == 0 {
            return Err(ConfigError::Invalid("stats_queue_capacity must be > 0".to_string()));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            record_batch_size: default_record_batch_size(),
            max_skills_per_holder: default_max_skills(),
            stats_queue_capacity: default_stats_queue_capacity(),
        }
    }
}

fn default_page_size() -> usize {
    10
}

fn default_record_batch_size() -> usize {
    20
}

fn default_max_skills() -> usize {
    crate::skills::DEFAULT_MAX_SKILLS
}

fn default_stats_queue_capacity() -> usize {
    256
}

// ============================================================================
// WORKER
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl WorkerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_delay_ms(mut self, ms: u64) -> Self {
        self.retry_delay_ms = ms;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_delay_ms > 60_000 {
            return Err(ConfigError::Invalid("retry_delay_ms must be at most 60000".to_string()));
        }
        Ok(())
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    50
}
