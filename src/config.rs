use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::rate_limiter::DEFAULT_MAX_ATTEMPTS;
use crate::fetcher::convert::MISSING_SENTINEL;

pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Top-level configuration, usually read from `api_config.json`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
    /// Declaration order is kept; the updater walks sources in this order.
    #[serde(default)]
    pub sources: IndexMap<String, SourceConfig>,
    /// Optional overrides for dataset titles and units.
    #[serde(default)]
    pub labels: HashMap<String, DatasetLabel>,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_name")]
    pub name: String,
    #[serde(default)]
    pub base_url: String,
    /// Minimum seconds between two requests.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: f64,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// logical dataset id -> provider series id, in declaration order.
    #[serde(default)]
    pub datasets: IndexMap<String, String>,
    /// logical dataset id -> multiplier applied at ingestion. Entries are
    /// layered over `default_scale()`.
    #[serde(default = "default_scale", deserialize_with = "scale_over_defaults")]
    pub scale: HashMap<String, f64>,
    /// Raw values that mean "no observation".
    #[serde(default = "default_missing_values")]
    pub missing_values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetLabel {
    pub title: String,
    pub unit: String,
}

fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_source_name() -> String {
    "Unknown Source".to_string()
}

fn default_rate_limit() -> f64 {
    1.0
}

fn default_timeout() -> f64 {
    DEFAULT_TIMEOUT.as_secs_f64()
}

fn default_retries() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_missing_values() -> Vec<String> {
    vec![MISSING_SENTINEL.to_string()]
}

/// GDP arrives in billions and is published in trillions.
pub fn default_scale() -> HashMap<String, f64> {
    HashMap::from([("gdp".to_string(), 0.001)])
}

fn scale_over_defaults<'de, D>(deserializer: D) -> Result<HashMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut scale = default_scale();
    scale.extend(HashMap::<String, f64>::deserialize(deserializer)?);
    Ok(scale)
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            name: default_source_name(),
            base_url: String::new(),
            rate_limit: default_rate_limit(),
            timeout: default_timeout(),
            retries: default_retries(),
            datasets: IndexMap::new(),
            scale: default_scale(),
            missing_values: default_missing_values(),
        }
    }
}

impl SourceConfig {
    pub fn dataset_series_id(&self, dataset_id: &str) -> Option<&str> {
        self.datasets.get(dataset_id).map(String::as_str)
    }

    pub fn dataset_ids(&self) -> Vec<String> {
        self.datasets.keys().cloned().collect()
    }

    /// `timeout` as a `Duration`; zero, negative or out-of-range values
    /// fall back to 30s.
    pub fn request_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout)
            .ok()
            .filter(|t| !t.is_zero())
            .unwrap_or(DEFAULT_TIMEOUT)
    }
}

impl AppConfig {
    /// Load the JSON config. A missing file yields an empty config so the
    /// updater can still run (and report that nothing is configured).
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file {:?} not found. Using empty config.", path);
            return Ok(AppConfig::default());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config = Self::from_json(&raw)
            .with_context(|| format!("Invalid JSON in config file {:?}", path))?;

        info!("Loaded config from {:?} ({} sources)", path, config.sources.len());
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let mut config: AppConfig = serde_json::from_str(raw)?;
        config.apply_env_keys();
        Ok(config)
    }

    /// `FRED_API_KEY` style variables win over keys in the file.
    fn apply_env_keys(&mut self) {
        for name in self.sources.keys() {
            let var = format!("{}_API_KEY", name.to_uppercase());
            if let Ok(key) = std::env::var(&var) {
                if !key.trim().is_empty() {
                    self.api_keys.insert(name.clone(), key);
                }
            }
        }
    }
}
