//! Configuration management
//!
//! Configuration is stored in TOML format at ~/.neuroljus/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Data directory, log level, default locale
//! - **model**: External model endpoint, credential env var, timeout
//! - **signals**: Telemetry polling, history capacity, quality band
//! - **chat**: History window, temperature, initiative, audience
//!
//! Paths support ~ expansion; the data directory is created on first load.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::EngineError;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// External model configuration
    #[serde(default)]
    pub model: ModelConfig,

    /// Telemetry configuration
    #[serde(default)]
    pub signals: SignalsConfig,

    /// Conversation configuration
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Default conversation locale tag (sv, es, en); unknown tags fall
    /// back to the default locale at parse time
    #[serde(default = "default_locale")]
    pub locale: String,
}

/// External model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_model_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_model_name")]
    pub model: String,

    /// Environment variable the API credential is read from.
    /// The key itself never lives in the config file.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Upper bound on one model call, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalsConfig {
    /// Feed polling interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Ring-buffer capacity for diagnostic sample history
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Lower bound of the acceptable mid-range band (open interval)
    #[serde(default = "default_quality_band_low")]
    pub quality_band_low: f64,

    /// Upper bound of the acceptable mid-range band (open interval)
    #[serde(default = "default_quality_band_high")]
    pub quality_band_high: f64,

    /// URL of an external sensor feed; the simulated source is used when unset
    #[serde(default)]
    pub feed_url: Option<String>,

    /// Heart-rate threshold that pulls the pain-triage module into
    /// composed instructions
    #[serde(default = "default_pain_cue_heart_rate")]
    pub pain_cue_heart_rate: f64,
}

/// Conversation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// History window sent to the model (last N messages)
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Initial randomness budget in [0,1]
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Whether unsolicited suggestions are permitted by default
    #[serde(default = "default_true")]
    pub allow_initiative: bool,

    /// Default audience framing (clinician, caregiver, adult, youth)
    #[serde(default = "default_audience")]
    pub audience: String,

    /// Hard cap on each serialized context substring, in characters
    #[serde(default = "default_context_max_chars")]
    pub context_max_chars: usize,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.neuroljus")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_locale() -> String {
    "sv".to_string()
}

fn default_model_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model_name() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_history_capacity() -> usize {
    300
}

fn default_quality_band_low() -> f64 {
    10.0
}

fn default_quality_band_high() -> f64 {
    90.0
}

fn default_pain_cue_heart_rate() -> f64 {
    110.0
}

fn default_history_window() -> usize {
    14
}

fn default_temperature() -> f64 {
    0.4
}

fn default_true() -> bool {
    true
}

fn default_audience() -> String {
    "caregiver".to_string()
}

fn default_context_max_chars() -> usize {
    1500
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            locale: default_locale(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_model_base_url(),
            model: default_model_name(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            history_capacity: default_history_capacity(),
            quality_band_low: default_quality_band_low(),
            quality_band_high: default_quality_band_high(),
            feed_url: None,
            pain_cue_heart_rate: default_pain_cue_heart_rate(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            temperature: default_temperature(),
            allow_initiative: true,
            audience: default_audience(),
            context_max_chars: default_context_max_chars(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            model: ModelConfig::default(),
            signals: SignalsConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    /// (~/.neuroljus/config.toml), creating a default file if none exists.
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {e}")))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {e}")))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save it to `path`.
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {e}"))
            })?;
        }

        let mut config = Self::default();
        config.validate_and_process()?;

        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {e}")))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {e}")))?;

        Ok(config)
    }

    /// The default configuration file path (~/.neuroljus/config.toml).
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".neuroljus").join("config.toml"))
    }

    /// Path of the persisted memory record inside the data directory.
    pub fn memory_path(&self) -> PathBuf {
        self.core.data_dir.join("memory.json")
    }

    /// Validate fields, expand ~ in the data directory and create it.
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if !(0.0..=1.0).contains(&self.chat.temperature) {
            return Err(EngineError::Config(
                "chat.temperature must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.signals.quality_band_low >= self.signals.quality_band_high {
            return Err(EngineError::Config(
                "signals.quality_band_low must be below quality_band_high".to_string(),
            ));
        }

        if !(250..=60_000).contains(&self.signals.poll_interval_ms) {
            return Err(EngineError::Config(
                "signals.poll_interval_ms must be between 250 and 60000".to_string(),
            ));
        }

        if self.signals.history_capacity == 0 {
            return Err(EngineError::Config(
                "signals.history_capacity must be at least 1".to_string(),
            ));
        }

        if self.chat.history_window < 2 {
            return Err(EngineError::Config(
                "chat.history_window must be at least 2".to_string(),
            ));
        }

        if self.chat.context_max_chars < 200 {
            return Err(EngineError::Config(
                "chat.context_max_chars must be at least 200".to_string(),
            ));
        }

        self.chat.audience.parse::<crate::policy::Audience>().map_err(EngineError::Config)?;

        self.core.data_dir = expand_path(&self.core.data_dir)?;
        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                EngineError::Config(format!("Failed to create data directory: {e}"))
            })?;
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.core.log_level, "info");
        assert_eq!(config.core.locale, "sv");
        assert_eq!(config.model.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.signals.poll_interval_ms, 2000);
        assert_eq!(config.signals.history_capacity, 300);
        assert_eq!(config.chat.history_window, 14);
        assert_eq!(config.chat.context_max_chars, 1500);
        assert!(config.chat.allow_initiative);
    }

    #[test]
    fn test_empty_toml_parses_to_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.chat.history_window, 14);
        assert_eq!(config.signals.quality_band_low, 10.0);
        assert_eq!(config.signals.quality_band_high, 90.0);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.chat.temperature = 1.5;
        assert!(config.validate_and_process().is_err());

        let mut config = Config::default();
        config.signals.quality_band_low = 90.0;
        config.signals.quality_band_high = 10.0;
        assert!(config.validate_and_process().is_err());

        let mut config = Config::default();
        config.chat.history_window = 1;
        assert!(config.validate_and_process().is_err());

        let mut config = Config::default();
        config.chat.audience = "coach".to_string();
        assert!(config.validate_and_process().is_err());

        let mut config = Config::default();
        config.core.log_level = "verbose".to_string();
        assert!(config.validate_and_process().is_err());
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/test");
        let expanded = expand_path(&path).unwrap();

        let home = dirs::home_dir().unwrap();
        assert_eq!(expanded, home.join("test"));
    }

    #[test]
    fn test_expand_path_without_tilde() {
        let path = PathBuf::from("/absolute/path");
        let expanded = expand_path(&path).unwrap();

        assert_eq!(expanded, path);
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = Config::default();
        let toml_string = toml::to_string(&config).unwrap();

        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(config.core.log_level, deserialized.core.log_level);
        assert_eq!(config.model.base_url, deserialized.model.base_url);
        assert_eq!(config.chat.history_window, deserialized.chat.history_window);
    }

    #[test]
    fn test_load_from_path_with_tempfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let data_dir = dir.path().join("data");
        fs::write(
            &path,
            format!(
                "[core]\ndata_dir = {:?}\n\n[chat]\nhistory_window = 6\n",
                data_dir.to_str().unwrap()
            ),
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.chat.history_window, 6);
        assert!(data_dir.exists());
    }
}
