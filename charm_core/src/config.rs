//! Configuration file support for ChronoCharm.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/charm/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub progression: ProgressionConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub breakdown: BreakdownConfig,

    #[serde(default)]
    pub handoff: HandoffConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Remote API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_user_id")]
    pub user_id: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// When false, nothing is sent over the network
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_id: default_user_id(),
            timeout_secs: default_timeout_secs(),
            enabled: true,
        }
    }
}

/// Progression parameters configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct ProgressionConfig {
    /// Fixed seed for the level-up attribute roll; random when unset
    #[serde(default)]
    pub seed: Option<u64>,
}

/// What to do when asked to block a slot that holds a task
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockPolicy {
    /// Refuse with a slot-occupied error
    #[default]
    Reject,
    /// Remove the task's span from the day, then block the slot
    Evict,
}

/// Schedule grid configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub block_policy: BlockPolicy,
}

/// Assignment breakdown configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BreakdownConfig {
    #[serde(default = "default_task_count")]
    pub task_count: u32,

    #[serde(default)]
    pub wizard_mode: bool,

    /// Stake given to tasks imported from a breakdown
    #[serde(default = "default_stake")]
    pub default_stake: u32,

    /// Bounty given to tasks imported from a breakdown
    #[serde(default = "default_bounty")]
    pub default_bounty: u32,
}

impl Default for BreakdownConfig {
    fn default() -> Self {
        Self {
            task_count: default_task_count(),
            wizard_mode: false,
            default_stake: default_stake(),
            default_bounty: default_bounty(),
        }
    }
}

/// Calendar-to-breakdown handoff configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HandoffConfig {
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| home_dir().join(".local/share"));
    base.join("charm")
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_base_url() -> String {
    "http://127.0.0.1:8004/api".into()
}

fn default_user_id() -> String {
    "default".into()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_task_count() -> u32 {
    10
}

fn default_stake() -> u32 {
    10
}

fn default_bounty() -> u32 {
    30
}

fn default_ttl_minutes() -> i64 {
    5
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| home_dir().join(".config"));
        base.join("charm").join("config.toml")
    }

    /// Reject values that would make the rest of the system misbehave
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(Error::Config("api.base_url must not be empty".into()));
        }
        if self.breakdown.task_count == 0 {
            return Err(Error::Config("breakdown.task_count must be at least 1".into()));
        }
        if self.handoff.ttl_minutes <= 0 {
            return Err(Error::Config("handoff.ttl_minutes must be positive".into()));
        }
        Ok(())
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://127.0.0.1:8004/api");
        assert_eq!(config.api.user_id, "default");
        assert!(config.api.enabled);
        assert_eq!(config.schedule.block_policy, BlockPolicy::Reject);
        assert_eq!(config.breakdown.task_count, 10);
        assert_eq!(config.handoff.ttl_minutes, 5);
        assert!(config.progression.seed.is_none());
    }

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested/config.toml");

        let mut config = Config::default();
        config.progression.seed = Some(99);
        config.schedule.block_policy = BlockPolicy::Evict;
        config.save_to(&path).unwrap();

        let parsed = Config::load_from(&path).unwrap();
        assert_eq!(parsed.progression.seed, Some(99));
        assert_eq!(parsed.schedule.block_policy, BlockPolicy::Evict);
        assert_eq!(parsed.api.base_url, config.api.base_url);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[api]
user_id = "hermione"
enabled = false

[schedule]
block_policy = "evict"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api.user_id, "hermione");
        assert!(!config.api.enabled);
        assert_eq!(config.api.timeout_secs, 10); // default
        assert_eq!(config.schedule.block_policy, BlockPolicy::Evict);
        assert_eq!(config.breakdown.default_bounty, 30); // default
    }

    #[test]
    fn test_invalid_config_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[handoff]\nttl_minutes = 0\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }
}
