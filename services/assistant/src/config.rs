//! Application Configuration Module
//!
//! Loads the assistant's settings from environment variables (and `.env`)
//! into a single struct that is handed to the runtime at startup.

use secrecy::SecretString;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use sudo_core::bridge::{DEFAULT_BRIDGE_ENDPOINT, DEFAULT_EXEC_TIMEOUT};
use sudo_core::tools::LIVE_MODEL;
use tracing::Level;

// --- Application Constants ---

/// Capacity of the WebSocket client's outbound queue and event broadcast.
pub const CHANNEL_CAPACITY: usize = 1024;
/// Captured frames buffered between the cpal thread and the capture tap.
pub const CAPTURE_QUEUE: usize = 32;

/// Holds all configuration loaded from the environment.
#[derive(Debug)]
pub struct Config {
    pub gemini_api_key: Option<SecretString>,
    pub live_model: String,
    pub bridge_endpoint: String,
    pub exec_timeout: Duration,
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub prompts_dir: PathBuf,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `GEMINI_API_KEY`: Secret key for the live API. Required by `live` only.
    // *   `LIVE_MODEL`: (Optional) Live model name.
    // *   `BRIDGE_ENDPOINT`: (Optional) Base URL of the command bridge. Defaults to "http://localhost:8080".
    // *   `BRIDGE_EXEC_TIMEOUT_SECS`: (Optional) Timeout of a single bridge command. Defaults to 60.
    // *   `INPUT_DEVICE` / `OUTPUT_DEVICE`: (Optional) Audio device names. Default devices otherwise.
    // *   `PROMPTS_DIR`: (Optional) Directory of `.md` prompt overrides. Defaults to "prompts".
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Blank values count as unset.
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let gemini_api_key = var("GEMINI_API_KEY").map(SecretString::from);

        let live_model = var("LIVE_MODEL").unwrap_or_else(|| LIVE_MODEL.to_string());
        let bridge_endpoint =
            var("BRIDGE_ENDPOINT").unwrap_or_else(|| DEFAULT_BRIDGE_ENDPOINT.to_string());

        let exec_timeout = match var("BRIDGE_EXEC_TIMEOUT_SECS") {
            Some(value) => value
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidValue {
                    name: "BRIDGE_EXEC_TIMEOUT_SECS".to_string(),
                    value,
                })?,
            None => DEFAULT_EXEC_TIMEOUT,
        };

        let prompts_dir = PathBuf::from(var("PROMPTS_DIR").unwrap_or_else(|| "prompts".to_string()));

        // Configure logging level from RUST_LOG, with a sensible default.
        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            gemini_api_key,
            live_model,
            bridge_endpoint,
            exec_timeout,
            input_device: var("INPUT_DEVICE"),
            output_device: var("OUTPUT_DEVICE"),
            prompts_dir,
            log_level,
        })
    }

    /// The live API key, for the subcommands that open a live session.
    pub fn require_api_key(&self) -> Result<SecretString, ConfigError> {
        self.gemini_api_key
            .clone()
            .ok_or_else(|| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_with_only_api_key() {
        let config = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "key-123")])).unwrap();

        assert_eq!(config.require_api_key().unwrap().expose_secret(), "key-123");
        assert_eq!(config.live_model, LIVE_MODEL);
        assert_eq!(config.bridge_endpoint, "http://localhost:8080");
        assert_eq!(config.exec_timeout, Duration::from_secs(60));
        assert_eq!(config.input_device, None);
        assert_eq!(config.prompts_dir, PathBuf::from("prompts"));
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn test_bridge_settings_load_without_api_key() {
        let missing = Config::from_lookup(lookup(&[("BRIDGE_ENDPOINT", "http://10.0.0.2:8080")])).unwrap();
        let blank = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "  ")])).unwrap();

        assert_eq!(missing.bridge_endpoint, "http://10.0.0.2:8080");
        assert!(missing.gemini_api_key.is_none());
        assert!(
            matches!(missing.require_api_key(), Err(ConfigError::MissingVar(name)) if name == "GEMINI_API_KEY")
        );
        assert!(matches!(blank.require_api_key(), Err(ConfigError::MissingVar(_))));
    }

    #[test]
    fn test_overrides_and_invalid_values() {
        let config = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "key"),
            ("BRIDGE_ENDPOINT", "http://10.0.0.2:8080"),
            ("BRIDGE_EXEC_TIMEOUT_SECS", "5"),
            ("OUTPUT_DEVICE", "speaker"),
            ("RUST_LOG", "debug"),
        ]))
        .unwrap();
        assert_eq!(config.bridge_endpoint, "http://10.0.0.2:8080");
        assert_eq!(config.exec_timeout, Duration::from_secs(5));
        assert_eq!(config.output_device.as_deref(), Some("speaker"));
        assert_eq!(config.log_level, Level::DEBUG);

        let bad_level = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "key"), ("RUST_LOG", "loud")]));
        let bad_timeout = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "key"),
            ("BRIDGE_EXEC_TIMEOUT_SECS", "soon"),
        ]));
        assert!(matches!(bad_level, Err(ConfigError::InvalidLogLevel(level)) if level == "loud"));
        assert!(matches!(bad_timeout, Err(ConfigError::InvalidValue { .. })));
    }
}
