//! Configuration types for the Virtual Stylist orchestrator.
//!
//! This module provides the configuration structure used to control the
//! image service connection, upload limits, and output location. The API
//! credential is deliberately not part of the file; see [`api_key_from_env`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use stylist_genai::{GeminiOptions, DEFAULT_BASE_URL, DEFAULT_MODEL};

use crate::error::{Result, StylistError};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "stylist.json";

/// Environment variables checked for the API credential, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Default image model.
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

/// Default image service API root.
fn default_api_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// Default output directory for exported outfits.
fn default_output_dir() -> String {
    "stylist-output".to_string()
}

/// Default upload limit in bytes (20MB, the inline payload ceiling of the service).
const fn default_max_upload_bytes() -> u64 {
    20 * 1024 * 1024
}

/// Default per-subscriber event buffer.
const fn default_event_buffer_size() -> usize {
    100
}

/// Main configuration for Virtual Stylist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Image model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Root URL of the image service API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Directory where generated outfits are exported.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Largest accepted upload in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Events buffered per WebSocket subscriber before it starts lagging.
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_base_url: default_api_base_url(),
            output_dir: default_output_dir(),
            max_upload_bytes: default_max_upload_bytes(),
            event_buffer_size: default_event_buffer_size(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `stylist.json` in the current directory. If found, loads and
    /// validates the configuration. If not found, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            StylistError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `stylist.json` in a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        Self::load_from_file(&config_path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `StylistError::ConfigParseError` if the file exists but contains
    /// invalid JSON.
    ///
    /// Returns `StylistError::ConfigValidationError` if the configuration values
    /// are invalid (e.g., empty model name, zero upload limit).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(StylistError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| StylistError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// Checks that:
    /// - `model` is not empty
    /// - `api_base_url` is an `http://` or `https://` URL
    /// - `output_dir` is not empty
    /// - `max_upload_bytes` and `event_buffer_size` are greater than 0
    ///
    /// # Errors
    ///
    /// Returns `StylistError::ConfigValidationError` if any validation check fails.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(StylistError::config_validation(
                "model must not be empty",
                format!("Set model to an image model such as '{DEFAULT_MODEL}' in your stylist.json"),
            ));
        }

        let base = self.api_base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(StylistError::config_validation(
                format!("apiBaseUrl must be an http(s) URL, got '{}'", self.api_base_url),
                format!("Remove apiBaseUrl from your stylist.json to use '{DEFAULT_BASE_URL}'"),
            ));
        }

        if self.output_dir.trim().is_empty() {
            return Err(StylistError::config_validation(
                "outputDir must not be empty",
                "Provide a valid output directory path in your stylist.json (use '.' for current directory)",
            ));
        }

        if self.max_upload_bytes == 0 {
            return Err(StylistError::config_validation(
                "maxUploadBytes must be greater than 0",
                "Set maxUploadBytes to at least 1 in your stylist.json",
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(StylistError::config_validation(
                "eventBufferSize must be greater than 0",
                "Set eventBufferSize to at least 1 in your stylist.json",
            ));
        }

        Ok(())
    }

    /// Builds client options for the image service with the given credential.
    #[must_use]
    pub fn gemini_options(&self, api_key: impl Into<String>) -> GeminiOptions {
        GeminiOptions::new(api_key)
            .with_model(self.model.trim())
            .with_base_url(self.api_base_url.trim())
    }
}

/// Reads the API credential from the environment.
///
/// Checks `GEMINI_API_KEY` first, then `API_KEY`. Blank values are ignored.
///
/// # Errors
///
/// Returns `StylistError::MissingApiKey` if neither variable holds a value.
pub fn api_key_from_env() -> Result<String> {
    api_key_from(|name| std::env::var(name).ok())
}

/// Resolves the credential through `lookup`, honouring [`API_KEY_ENV_VARS`] order.
fn api_key_from(lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
    API_KEY_ENV_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .ok_or(StylistError::MissingApiKey)
}
