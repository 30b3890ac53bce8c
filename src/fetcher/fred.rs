use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::convert::ValueConverter;
use super::transport::Transport;
use super::{merge_params, title_case, DataSource};
use crate::config::SourceConfig;
use crate::core::rate_limiter::{interval_from_secs, RateLimiter};
use crate::core::timeseries::standardize;
use crate::error::SourceError;
use crate::models::{DatasetInfo, DatasetMetadata, LatestSnapshot, Observation, QueryParams, StandardizedSeries};

pub const FRED_BASE_URL: &str = "https://api.stlouisfed.org/fred";

/// Roughly five years of quarterly or monthly points.
const DEFAULT_LIMIT: &str = "60";
const RANGE_LIMIT: &str = "1000";

/// Federal Reserve Economic Data (St. Louis Fed).
pub struct FredSource {
    api_key: String,
    config: SourceConfig,
    transport: Arc<dyn Transport>,
    converter: ValueConverter,
    limiter: RateLimiter,
}

impl FredSource {
    pub fn new(config: SourceConfig, api_key: String, transport: Arc<dyn Transport>) -> Self {
        // FRED keys are 32 lower-case hex chars; pasted keys often carry whitespace.
        let api_key = api_key.trim().to_lowercase();
        if !api_key.is_empty() && api_key.len() != 32 {
            warn!("FRED API key length is {}, not 32! Requests will likely fail.", api_key.len());
        }

        let converter = ValueConverter::new(config.scale.clone()).with_sentinels(config.missing_values.as_slice());
        let limiter = RateLimiter::from_config(config.rate_limit, config.retries);

        Self { api_key, config, transport, converter, limiter }
    }

    fn base_url(&self) -> &str {
        let url = self.config.base_url.trim_end_matches('/');
        if url.is_empty() { FRED_BASE_URL } else { url }
    }

    fn timeout(&self) -> Duration {
        self.config.request_timeout()
    }

    fn series_id(&self, dataset_id: &str) -> Result<String, SourceError> {
        self.config
            .dataset_series_id(dataset_id)
            .map(|s| s.to_string())
            .ok_or_else(|| SourceError::Configuration(format!("Dataset '{}' not configured for FRED", dataset_id)))
    }

    fn require_key(&self) -> Result<(), SourceError> {
        if self.api_key.is_empty() {
            return Err(SourceError::Configuration("FRED API key is empty or missing".to_string()));
        }
        Ok(())
    }

    async fn get(&self, path: &str, query: Vec<(String, String)>) -> Result<Value, SourceError> {
        let url = format!("{}/{}", self.base_url(), path);
        let timeout = self.timeout();
        let transport = &self.transport;
        let query = &query;
        let url = &url;

        self.limiter
            .execute(|| async move { transport.get_json(url, query, timeout).await })
            .await
    }

    async fn fetch_observations(&self, dataset_id: &str, params: &QueryParams) -> Result<StandardizedSeries, SourceError> {
        let series_id = self.series_id(dataset_id)?;
        self.require_key()?;

        let query = merge_params(
            vec![
                ("series_id", series_id.clone()),
                ("api_key", self.api_key.clone()),
                ("file_type", "json".to_string()),
                ("sort_order", "desc".to_string()),
                ("limit", DEFAULT_LIMIT.to_string()),
            ],
            params,
        );

        let json = self.get("series/observations", query).await?;
        let observations = Self::parse_observations(&json)?;

        let meta = DatasetMetadata {
            logical_id: dataset_id.to_string(),
            provider_series_id: series_id,
            source_name: "FRED".to_string(),
        };
        let series = standardize(&self.config.name, &meta, &observations, &self.converter);

        info!("Successfully fetched {} observations for {}", observations.len(), dataset_id);
        Ok(series)
    }

    fn parse_observations(json: &Value) -> Result<Vec<Observation>, SourceError> {
        let observations = json["observations"]
            .as_array()
            .ok_or_else(|| SourceError::Protocol("Invalid FRED response: missing 'observations'".to_string()))?;

        let mut parsed = Vec::with_capacity(observations.len());
        for obs in observations {
            let date = obs["date"]
                .as_str()
                .ok_or_else(|| SourceError::Protocol("Invalid FRED observation: missing 'date'".to_string()))?;

            // "value": "123.45", or "." when the period has no data
            let raw_value = match &obs["value"] {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            };

            parsed.push(Observation { date: date.to_string(), raw_value });
        }

        Ok(parsed)
    }

    /// First entry of `seriess` from the series endpoint, if any.
    async fn series_info(&self, series_id: &str) -> Result<Value, SourceError> {
        self.require_key()?;
        let query = vec![
            ("series_id".to_string(), series_id.to_string()),
            ("api_key".to_string(), self.api_key.clone()),
            ("file_type".to_string(), "json".to_string()),
        ];

        let json = self.get("series", query).await?;
        Ok(json["seriess"].get(0).cloned().unwrap_or(Value::Null))
    }

    /// Only the newest observation.
    pub async fn fetch_latest_value(&self, dataset_id: &str) -> Result<LatestSnapshot, SourceError> {
        let params = QueryParams::from([("limit".to_string(), "1".to_string())]);
        let series = self.fetch_dataset(dataset_id, &params).await?;

        Ok(LatestSnapshot {
            dataset: dataset_id.to_string(),
            latest: series.data.latest,
            timestamp: series.meta.last_updated,
        })
    }

    /// Observations between two `YYYY-MM-DD` dates (inclusive).
    pub async fn fetch_historical_range(&self, dataset_id: &str, start_date: &str, end_date: &str) -> Result<StandardizedSeries, SourceError> {
        let params = QueryParams::from([
            ("observation_start".to_string(), start_date.to_string()),
            ("observation_end".to_string(), end_date.to_string()),
            ("limit".to_string(), RANGE_LIMIT.to_string()),
        ]);
        self.fetch_dataset(dataset_id, &params).await
    }
}

#[async_trait]
impl DataSource for FredSource {
    fn name(&self) -> &str {
        "fred"
    }

    fn min_call_interval(&self) -> Duration {
        interval_from_secs(self.config.rate_limit)
    }

    async fn fetch_dataset(&self, dataset_id: &str, params: &QueryParams) -> Result<StandardizedSeries, SourceError> {
        let result = self.fetch_observations(dataset_id, params).await;
        if let Err(e) = &result {
            error!("FRED fetch failed for {}: {}", dataset_id, e);
        }
        result
    }

    async fn get_available_datasets(&self) -> Vec<DatasetInfo> {
        let mut datasets = Vec::with_capacity(self.config.datasets.len());

        for (logical_id, series_id) in &self.config.datasets {
            let (title, units) = match self.series_info(series_id).await {
                Ok(info) => (
                    info["title"].as_str().map(|s| s.to_string()).unwrap_or_else(|| title_case(logical_id)),
                    info["units"].as_str().map(|s| s.to_string()).unwrap_or_else(|| "Unknown".to_string()),
                ),
                Err(e) => {
                    warn!("Series info for {} unavailable: {}", series_id, e);
                    (title_case(logical_id), "Unknown".to_string())
                }
            };

            datasets.push(DatasetInfo {
                id: logical_id.clone(),
                title,
                source: "FRED".to_string(),
                series_id: series_id.clone(),
                units,
            });
        }

        datasets
    }
}
