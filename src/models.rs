use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Extra query parameters passed through to a provider. A `BTreeMap` keeps
/// them in a canonical order, which the cache key relies on.
pub type QueryParams = BTreeMap<String, String>;

/// One raw data point as delivered by a provider, before conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub date: String,
    pub raw_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetMetadata {
    pub logical_id: String,
    pub provider_series_id: String,
    pub source_name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DataPoint {
    pub date: String,
    pub value: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct LatestValue {
    pub value: Option<f64>,
    pub date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct SeriesData {
    #[serde(default)]
    pub latest: LatestValue,
    /// Oldest first, ready for charting.
    #[serde(default)]
    pub historical: Vec<DataPoint>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SeriesMeta {
    pub source: String,
    pub dataset: String,
    pub last_updated: String,
    pub count: usize,
}

/// Canonical output of every data source.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StandardizedSeries {
    pub meta: SeriesMeta,
    pub data: SeriesData,
}

/// Entry of a source's dataset listing.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DatasetInfo {
    pub id: String,
    pub title: String,
    pub source: String,
    pub series_id: String,
    pub units: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LatestSnapshot {
    pub dataset: String,
    pub latest: LatestValue,
    pub timestamp: String,
}

// ============================================================================
// CONSOLIDATED DOCUMENT (economic_data.json)
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct SourceSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct DocumentMeta {
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub update_summary: BTreeMap<String, SourceSummary>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DatasetEntry {
    pub title: String,
    pub unit: String,
    pub data: SeriesData,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ConsolidatedDocument {
    #[serde(default)]
    pub meta: DocumentMeta,
    #[serde(default)]
    pub datasets: BTreeMap<String, DatasetEntry>,
}
