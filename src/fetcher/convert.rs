use crate::models::DatasetMetadata;
use std::collections::HashMap;
use tracing::warn;

/// FRED marks missing observations with a single dot.
pub const MISSING_SENTINEL: &str = ".";

/// Turns raw textual observations into numbers.
///
/// Scaling is table driven (`dataset id -> factor`, default 1.0) so that new
/// providers do not have to special-case dataset names in code.
#[derive(Debug, Clone)]
pub struct ValueConverter {
    sentinels: Vec<String>,
    scale: HashMap<String, f64>,
}

impl Default for ValueConverter {
    fn default() -> Self {
        Self::new(crate::config::default_scale())
    }
}

impl ValueConverter {
    pub fn new(scale: HashMap<String, f64>) -> Self {
        Self {
            sentinels: vec![MISSING_SENTINEL.to_string()],
            scale,
        }
    }

    /// Replace the raw markers treated as "no observation".
    pub fn with_sentinels<S: AsRef<str>>(mut self, sentinels: &[S]) -> Self {
        self.sentinels = sentinels.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    pub fn scale_factor(&self, dataset_id: &str) -> f64 {
        self.scale.get(dataset_id).copied().unwrap_or(1.0)
    }

    pub fn convert(&self, raw: Option<&str>, meta: &DatasetMetadata) -> Option<f64> {
        let raw = raw?.trim();
        if raw.is_empty() || self.sentinels.iter().any(|s| s == raw) {
            return None;
        }

        let value = match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => {
                warn!(
                    "Could not convert value '{}' for dataset {} ({})",
                    raw, meta.logical_id, meta.source_name
                );
                return None;
            }
        };

        Some(round3(value * self.scale_factor(&meta.logical_id)))
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
