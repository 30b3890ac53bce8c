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
use crate::models::{DatasetInfo, DatasetMetadata, Observation, QueryParams, StandardizedSeries};

pub const WORLDBANK_BASE_URL: &str = "https://api.worldbank.org/v2";

/// Aggregate "World" region, used unless the caller passes `country`.
const DEFAULT_COUNTRY: &str = "WLD";

/// World Bank indicators API. No key required.
pub struct WorldBankSource {
    config: SourceConfig,
    transport: Arc<dyn Transport>,
    converter: ValueConverter,
    limiter: RateLimiter,
}

impl WorldBankSource {
    pub fn new(config: SourceConfig, transport: Arc<dyn Transport>) -> Self {
        let converter = ValueConverter::new(config.scale.clone()).with_sentinels(config.missing_values.as_slice());
        let limiter = RateLimiter::from_config(config.rate_limit, config.retries);
        Self { config, transport, converter, limiter }
    }

    fn base_url(&self) -> &str {
        let url = self.config.base_url.trim_end_matches('/');
        if url.is_empty() { WORLDBANK_BASE_URL } else { url }
    }

    async fn get(&self, url: String, query: Vec<(String, String)>) -> Result<Value, SourceError> {
        let timeout = self.config.request_timeout();
        let transport = &self.transport;
        let (url, query) = (&url, &query);

        self.limiter
            .execute(|| async move { transport.get_json(url, query, timeout).await })
            .await
    }

    async fn fetch_indicator(&self, dataset_id: &str, params: &QueryParams) -> Result<StandardizedSeries, SourceError> {
        let indicator = self
            .config
            .dataset_series_id(dataset_id)
            .ok_or_else(|| SourceError::Configuration(format!("Dataset '{}' not configured for World Bank", dataset_id)))?
            .to_string();

        // `country` is part of the path, not the query string.
        let mut params = params.clone();
        let country = params.remove("country").unwrap_or_else(|| DEFAULT_COUNTRY.to_string());

        let query = merge_params(
            vec![("format", "json".to_string()), ("per_page", "60".to_string())],
            &params,
        );
        let url = format!("{}/country/{}/indicator/{}", self.base_url(), country, indicator);

        let json = self.get(url, query).await?;
        let observations = Self::parse_observations(&json)?;

        let meta = DatasetMetadata {
            logical_id: dataset_id.to_string(),
            provider_series_id: indicator,
            source_name: "World Bank".to_string(),
        };
        let series = standardize(&self.config.name, &meta, &observations, &self.converter);

        info!("Successfully fetched {} observations for {}", observations.len(), dataset_id);
        Ok(series)
    }

    fn parse_observations(json: &Value) -> Result<Vec<Observation>, SourceError> {
        // Body is [paging metadata, [observations...]]; errors come back as
        // [{"message": [...]}] with no second element.
        let parts = json
            .as_array()
            .ok_or_else(|| SourceError::Protocol("Invalid World Bank response: expected an array".to_string()))?;

        if parts.len() < 2 {
            let detail = parts
                .first()
                .and_then(|m| m.get("message"))
                .map(|m| m.to_string())
                .unwrap_or_else(|| "missing data element".to_string());
            return Err(SourceError::Protocol(format!("Invalid World Bank response: {}", detail)));
        }

        let rows = match &parts[1] {
            Value::Null => return Ok(Vec::new()),
            Value::Array(rows) => rows,
            _ => return Err(SourceError::Protocol("Invalid World Bank response: data is not an array".to_string())),
        };

        let mut parsed = Vec::with_capacity(rows.len());
        for row in rows {
            let date = row["date"]
                .as_str()
                .ok_or_else(|| SourceError::Protocol("Invalid World Bank observation: missing 'date'".to_string()))?;

            // Usually a number or null, occasionally a string
            let raw_value = match &row["value"] {
                Value::Number(n) => Some(n.to_string()),
                Value::String(s) => Some(s.clone()),
                _ => None,
            };

            parsed.push(Observation { date: date.to_string(), raw_value });
        }

        Ok(parsed)
    }
}

#[async_trait]
impl DataSource for WorldBankSource {
    fn name(&self) -> &str {
        "worldbank"
    }

    fn min_call_interval(&self) -> Duration {
        interval_from_secs(self.config.rate_limit)
    }

    async fn fetch_dataset(&self, dataset_id: &str, params: &QueryParams) -> Result<StandardizedSeries, SourceError> {
        let result = self.fetch_indicator(dataset_id, params).await;
        if let Err(e) = &result {
            error!("World Bank fetch failed for {}: {}", dataset_id, e);
        }
        result
    }

    async fn get_available_datasets(&self) -> Vec<DatasetInfo> {
        let mut datasets = Vec::with_capacity(self.config.datasets.len());

        for (logical_id, indicator) in &self.config.datasets {
            let url = format!("{}/indicator/{}", self.base_url(), indicator);
            let query = vec![("format".to_string(), "json".to_string())];

            let info = match self.get(url, query).await {
                Ok(json) => json.get(1).and_then(|rows| rows.get(0)).cloned().unwrap_or(Value::Null),
                Err(e) => {
                    warn!("Indicator info for {} unavailable: {}", indicator, e);
                    Value::Null
                }
            };

            let title = info["name"].as_str().map(|s| s.to_string()).unwrap_or_else(|| title_case(logical_id));
            // The API returns "" for most indicators
            let units = info["unit"]
                .as_str()
                .filter(|u| !u.is_empty())
                .map(|s| s.to_string())
                .unwrap_or_else(|| "Unknown".to_string());

            datasets.push(DatasetInfo {
                id: logical_id.clone(),
                title,
                source: "World Bank".to_string(),
                series_id: indicator.clone(),
                units,
            });
        }

        datasets
    }
}
