use async_trait::async_trait;
use std::time::Duration;

use crate::core::rate_limiter::DEFAULT_MIN_INTERVAL;
use crate::error::SourceError;
use crate::models::{DatasetInfo, QueryParams, StandardizedSeries};

pub mod convert;
pub mod fred;
pub mod transport;
pub mod worldbank;

/// Contract every economic data provider implements.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn name(&self) -> &str;

    /// Minimum spacing between two calls, consulted by the API manager.
    fn min_call_interval(&self) -> Duration {
        DEFAULT_MIN_INTERVAL
    }

    /// Fetch one logical dataset and normalize it. Caller params override the
    /// provider defaults.
    async fn fetch_dataset(&self, dataset_id: &str, params: &QueryParams) -> Result<StandardizedSeries, SourceError>;

    /// Best effort: metadata lookups that fail fall back to a derived title
    /// and "Unknown" units instead of failing the listing.
    async fn get_available_datasets(&self) -> Vec<DatasetInfo>;
}

/// "interest_rate_fed" -> "Interest_Rate_Fed"
///
/// Every letter that follows a non-letter is upper-cased, the rest lower-cased.
pub fn title_case(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    let mut prev_is_letter = false;
    for c in id.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}

/// Merge caller params over provider defaults. Caller values win.
pub(crate) fn merge_params(defaults: Vec<(&str, String)>, overrides: &QueryParams) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = defaults
        .into_iter()
        .map(|(k, v)| (k.to_string(), overrides.get(k).cloned().unwrap_or(v)))
        .collect();

    for (key, value) in overrides {
        if !merged.iter().any(|(k, _)| k == key) {
            merged.push((key.clone(), value.clone()));
        }
    }
    merged
}
