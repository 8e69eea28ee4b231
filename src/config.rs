//! Tunable settings loaded from an optional YAML file.
//!
//! Secrets and endpoints that differ per deployment come from the CLI and
//! environment (see [`crate::cli`]); this file holds everything else. Every
//! field has a default, so running without a config file is supported.
//!
//! # Example
//!
//! ```yaml
//! delivery_time: "07:30"
//! llm_retries: 2
//! store:
//!   backend: firestore
//! temperatures:
//!   creative: 0.8
//! ```

use crate::generator::Temperatures;
use crate::utils::parse_delivery_time;
use chrono::NaiveTime;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("invalid delivery_time {0:?} (expected HH:MM)")]
    DeliveryTime(String),

    #[error("{0} is not set")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    File,
    Firestore,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Root directory of the file backend.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::File,
            path: PathBuf::from("./dailyverse-data"),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemperatureConfig {
    pub creative: f32,
    pub news: f32,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        let t = Temperatures::default();
        Self {
            creative: t.creative,
            news: t.news,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Local time of day (`HH:MM`) after which the daily batch is due.
    pub delivery_time: String,
    pub groq_base_url: String,
    pub tavily_base_url: String,
    pub search_max_results: usize,
    pub request_timeout_secs: u64,
    /// Extra LLM attempts per call; `0` disables retries.
    pub llm_retries: usize,
    pub temperatures: TemperatureConfig,
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            delivery_time: "08:00".to_string(),
            groq_base_url: "https://api.groq.com/openai/v1".to_string(),
            tavily_base_url: "https://api.tavily.com".to_string(),
            search_max_results: 5,
            request_timeout_secs: 120,
            llm_retries: 0,
            temperatures: TemperatureConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    pub fn delivery_time(&self) -> Result<NaiveTime, ConfigError> {
        parse_delivery_time(&self.delivery_time)
            .map_err(|_| ConfigError::DeliveryTime(self.delivery_time.clone()))
    }

    pub fn request_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.request_timeout_secs)
    }

    pub fn temperatures(&self) -> Temperatures {
        Temperatures {
            creative: self.temperatures.creative,
            news: self.temperatures.news,
        }
    }

    /// Parse a YAML document, validating the delivery time.
    pub fn from_yaml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.delivery_time()?;
        Ok(config)
    }
}

/// Load the config file at `path`, or the defaults when no path is given.
#[instrument(level = "info")]
pub async fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let Some(path) = path else {
        info!("No config file given; using defaults");
        return Ok(Config::default());
    };
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let config = Config::from_yaml(&text, path)?;
    info!(path = %path.display(), "Loaded configuration");
    Ok(config)
}
