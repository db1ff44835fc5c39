//! BrowserPilot configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Project-local config file name
pub const LOCAL_CONFIG_FILE: &str = ".browserpilot.yml";

/// Errors from loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Main orchestrator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Event bus settings
    pub events: EventsConfig,

    /// Token chunker settings
    pub chunker: ChunkerConfig,

    /// Conversation history settings
    pub history: HistoryConfig,
}

impl OrchestratorConfig {
    /// Load configuration with fallback chain
    ///
    /// An explicit path must load; otherwise a project-local
    /// `.browserpilot.yml` is tried, and defaults apply when none exists.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Validate configuration before use
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.events.buffer_capacity == 0 {
            return Err(ConfigError::Invalid(
                "events.buffer-capacity must be at least 1".to_string(),
            ));
        }
        if self.chunker.max_tokens <= self.chunker.safety_margin {
            return Err(ConfigError::Invalid(
                "chunker.max-tokens must exceed chunker.safety-margin".to_string(),
            ));
        }
        Ok(())
    }
}

/// Event bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Replay buffer capacity (events)
    #[serde(rename = "buffer-capacity")]
    pub buffer_capacity: usize,

    /// Carry `debug.message` events
    pub debug: bool,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 100,
            debug: false,
        }
    }
}

/// Token chunker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Maximum tokens per chunk
    #[serde(rename = "max-tokens")]
    pub max_tokens: usize,

    /// Tokens held back per chunk for stamping and slack
    #[serde(rename = "safety-margin")]
    pub safety_margin: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_tokens: 8_192,
            safety_margin: 50,
        }
    }
}

/// Conversation history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Estimated token budget for retained history
    #[serde(rename = "token-budget")]
    pub token_budget: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { token_budget: 32_768 }
    }
}
