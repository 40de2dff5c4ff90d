//! CLI configuration management.
//!
//! Values come from, in increasing precedence: built-in defaults, the JSON
//! config file, environment variables (including a `.env` file), and finally
//! the command-line flags applied by each command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use char_graph_collector::{API_KEY_ENV, API_URL_ENV, DEFAULT_API_URL, DEFAULT_OUTPUT_DIR};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Environment variable overriding the snapshot directory.
pub const OUTPUT_DIR_ENV: &str = "CHAR_GRAPH_OUTPUT_DIR";

/// Model used when neither a flag nor the config file names one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Transient-failure retries used when nothing else is configured.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Application-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key for the completion endpoint. Never written back to disk.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API.
    pub api_url: String,

    /// Directory scanned for and receiving snapshots.
    pub output_dir: PathBuf,

    /// Default model for `collect`.
    pub model: String,

    /// Retries for rate-limit, server and transport failures.
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            model: DEFAULT_MODEL.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl Config {
    /// Load configuration from the config file and environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present (silently ignore if missing)
        let _ = dotenvy::dotenv();

        let mut config = Self::load_file()?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Defaults overlaid with the config file only.
    pub fn load_file() -> Result<Self> {
        let Some(config_path) = Self::config_file_path() else {
            return Ok(Self::default());
        };
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
        serde_json::from_str(&contents).with_context(|| "Failed to parse config file")
    }

    /// Override fields with whatever `lookup` finds in the environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(key) = lookup(API_KEY_ENV) {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup(API_URL_ENV) {
            self.api_url = url;
        }
        if let Some(dir) = lookup(OUTPUT_DIR_ENV) {
            self.output_dir = PathBuf::from(dir);
        }
    }

    /// Save current configuration to the config file.
    pub fn save(&self) -> Result<()> {
        if let Some(config_path) = Self::config_file_path() {
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
            }
            let contents = serde_json::to_string_pretty(self)?;
            std::fs::write(&config_path, contents)
                .with_context(|| format!("Failed to write config to {}", config_path.display()))?;
        }
        Ok(())
    }

    /// Get the path to the config file.
    pub fn config_file_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "char-graph", "cgc")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }
}
