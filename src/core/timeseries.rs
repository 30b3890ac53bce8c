use crate::fetcher::convert::ValueConverter;
use crate::models::{DataPoint, DatasetMetadata, LatestValue, Observation, SeriesData, SeriesMeta, StandardizedSeries};

/// Builds the canonical series from raw provider observations.
///
/// Observations that do not convert are dropped. The remaining points are
/// sorted ascending by date for charting, and `latest` is the point with the
/// greatest date no matter which order the provider returned them in.
pub fn standardize(
    source_label: &str,
    meta: &DatasetMetadata,
    observations: &[Observation],
    converter: &ValueConverter,
) -> StandardizedSeries {
    let mut historical: Vec<DataPoint> = observations
        .iter()
        .filter_map(|obs| {
            converter
                .convert(obs.raw_value.as_deref(), meta)
                .map(|value| DataPoint { date: obs.date.clone(), value })
        })
        .collect();

    // Provider dates are ISO-like, so string order is date order.
    historical.sort_by(|a, b| a.date.cmp(&b.date));

    let latest = historical
        .last()
        .map(|dp| LatestValue { value: Some(dp.value), date: Some(dp.date.clone()) })
        .unwrap_or_default();

    StandardizedSeries {
        meta: SeriesMeta {
            source: source_label.to_string(),
            dataset: meta.logical_id.clone(),
            last_updated: chrono::Local::now().to_rfc3339(),
            count: historical.len(),
        },
        data: SeriesData { latest, historical },
    }
}
