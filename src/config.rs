use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub fanout: FanoutConfig,

    #[serde(default)]
    pub compaction: CompactionConfig,
}

/// Limits applied on the write path (fan-out) and the pull side of the read path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// Most-recent followers considered for push delivery. The rest read via pull.
    pub max_followers: usize,
    /// Most-recent followings consulted when reading the pull store.
    pub max_followings: usize,
    /// Followers inactive for longer than this are skipped at fan-out time.
    pub active_window_days: i64,
    /// Push rows inserted per transaction.
    pub batch_size: usize,
    /// Length cap for the denormalized content summary, in characters.
    pub summary_max_chars: usize,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            max_followers: 10_000,
            max_followings: 2_000,
            active_window_days: 30,
            batch_size: 500,
            summary_max_chars: 200,
        }
    }
}

impl FanoutConfig {
    pub fn active_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.active_window_days)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    pub interval_secs: u64,
    pub pull_batch: usize,
    pub push_batch: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            pull_batch: 300,
            push_batch: 800,
        }
    }
}

impl CompactionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fanout-feed");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("feeds.db").to_string_lossy().to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            fanout: FanoutConfig::default(),
            compaction: CompactionConfig::default(),
        }
    }
}

impl Config {
    /// Load from the default location, writing defaults there on first run.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save_to(config_path)?;
            config
        };
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let fanout = &self.fanout;
        if fanout.max_followers == 0 || fanout.max_followings == 0 {
            return Err(AppError::Config(
                "fanout.max_followers and fanout.max_followings must be positive".into(),
            ));
        }
        if fanout.batch_size == 0 {
            return Err(AppError::Config("fanout.batch_size must be positive".into()));
        }
        if fanout.active_window_days < 0 {
            return Err(AppError::Config(
                "fanout.active_window_days must not be negative".into(),
            ));
        }
        let compaction = &self.compaction;
        if compaction.pull_batch == 0 || compaction.push_batch == 0 {
            return Err(AppError::Config(
                "compaction batch sizes must be positive".into(),
            ));
        }
        if compaction.interval_secs == 0 {
            return Err(AppError::Config(
                "compaction.interval_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fanout-feed")
            .join("config.toml")
    }
}
