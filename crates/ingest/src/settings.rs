use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tally_core::Money;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse settings: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Tunables for the ingest pipeline. Missing TOML keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Category whose small transactions are folded into one row per month.
    pub aggregate_category: String,
    /// Content prefix of the monthly aggregate row, followed by `MM/YYYY`.
    pub aggregate_label: String,
    /// Inclusive upper bound (VND) for a transaction to be aggregated.
    pub aggregate_threshold: Money,
    pub pattern_cache_ttl_secs: u64,
    /// Max characters of `content` copied into a missing description.
    pub description_limit: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            aggregate_category: "Bank Fee".to_string(),
            aggregate_label: "Bank fees".to_string(),
            aggregate_threshold: Money::from_dong(5_000),
            pattern_cache_ttl_secs: 300,
            description_limit: 500,
        }
    }
}

impl PipelineSettings {
    pub fn from_toml(toml_content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(toml_content)?)
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    pub fn pattern_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.pattern_cache_ttl_secs)
    }
}
