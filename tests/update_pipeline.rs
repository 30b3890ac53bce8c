use economic_data_updater_lib::core::orchestrator::DOCUMENT_SOURCE;
use economic_data_updater_lib::fetcher::transport::{ScriptedTransport, TransportError};
use economic_data_updater_lib::models::{
    ConsolidatedDocument, DataPoint, DatasetEntry, DocumentMeta, LatestValue, SeriesData,
};
use economic_data_updater_lib::{build_updater, AppConfig, DataUpdater, RunStatus, UpdateError};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const CONFIG: &str = r#"{
    "api_keys": { "fred": "0123456789abcdef0123456789abcdef" },
    "sources": {
        "fred": {
            "name": "Federal Reserve Economic Data",
            "base_url": "https://fred.test/fred",
            "rate_limit": 0,
            "retries": 1,
            "datasets": { "gdp": "GDP", "unemployment": "UNRATE" }
        },
        "worldbank": {
            "name": "World Bank",
            "base_url": "https://wb.test/v2",
            "rate_limit": 0,
            "retries": 1,
            "datasets": { "world_gdp_growth": "NY.GDP.MKTP.KD.ZG" }
        }
    }
}"#;

fn updater(transport: Arc<ScriptedTransport>, output: &Path) -> DataUpdater {
    let config = AppConfig::from_json(CONFIG).unwrap();
    build_updater(&config, output, transport)
}

fn output_in(dir: &TempDir) -> PathBuf {
    dir.path().join("economic_data.json")
}

fn read_document(path: &Path) -> ConsolidatedDocument {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn write_document(path: &Path, doc: &ConsolidatedDocument) {
    std::fs::write(path, serde_json::to_string_pretty(doc).unwrap()).unwrap();
}

fn gdp_response() -> serde_json::Value {
    json!({ "observations": [
        { "date": "2024-04-01", "value": "28629.153" },
        { "date": "2024-01-01", "value": "28269.174" }
    ]})
}

fn unrate_response() -> serde_json::Value {
    json!({ "observations": [
        { "date": "2024-06-01", "value": "4.1" },
        { "date": "2024-05-01", "value": "." },
        { "date": "2024-04-01", "value": "3.9" }
    ]})
}

fn wb_response() -> serde_json::Value {
    json!([
        { "page": 1, "pages": 1, "per_page": 60, "total": 2 },
        [
            { "date": "2023", "value": 2.71 },
            { "date": "2022", "value": 3.09 }
        ]
    ])
}

fn previous_entry(title: &str, value: f64) -> DatasetEntry {
    DatasetEntry {
        title: title.to_string(),
        unit: "%".to_string(),
        data: SeriesData {
            latest: LatestValue { value: Some(value), date: Some("2019-12-01".to_string()) },
            historical: vec![DataPoint { date: "2019-12-01".to_string(), value }],
        },
    }
}

fn previous_document() -> ConsolidatedDocument {
    let mut doc = ConsolidatedDocument {
        meta: DocumentMeta {
            last_updated: "01.01.2000 00:00".to_string(),
            source: DOCUMENT_SOURCE.to_string(),
            update_summary: Default::default(),
        },
        datasets: Default::default(),
    };
    doc.datasets.insert("unemployment".to_string(), previous_entry("Unemployment Rate (US)", 3.6));
    doc.datasets.insert("gdp".to_string(), previous_entry("US GDP", 21.7));
    doc
}

#[tokio::test]
async fn full_update_writes_consolidated_document() {
    let dir = TempDir::new().unwrap();
    let output = output_in(&dir);
    let transport = Arc::new(
        ScriptedTransport::new()
            .respond(Ok(gdp_response()))
            .respond(Ok(unrate_response()))
            .respond(Ok(wb_response())),
    );
    let updater = updater(transport.clone(), &output);

    let run = updater.update_all().await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(updater.status(), RunStatus::Completed);
    assert_eq!((run.successful(), run.total()), (3, 3));

    let doc = read_document(&output);
    assert_eq!(doc, run.document);
    assert_eq!(doc.meta.source, DOCUMENT_SOURCE);

    let gdp = &doc.datasets["gdp"];
    assert_eq!(gdp.title, "US GDP");
    assert_eq!(gdp.unit, "Trillion USD");
    assert_eq!(gdp.data.latest.value, Some(28.629));
    assert_eq!(gdp.data.historical[0].date, "2024-01-01");

    let unemployment = &doc.datasets["unemployment"];
    assert_eq!(unemployment.data.historical.len(), 2);
    assert_eq!(unemployment.data.latest.date.as_deref(), Some("2024-06-01"));

    let growth = &doc.datasets["world_gdp_growth"];
    assert_eq!(growth.title, "World_Gdp_Growth");
    assert_eq!(growth.unit, "Unknown");
    assert_eq!(growth.data.latest.value, Some(2.71));

    let fred = &doc.meta.update_summary["fred"];
    assert_eq!((fred.total, fred.successful, fred.failed), (2, 2, 0));
    assert!(fred.errors.is_empty());

    // No temp file left behind after the rename.
    assert!(!dir.path().join("economic_data.json.tmp").exists());

    let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(
        urls,
        vec![
            "https://fred.test/fred/series/observations",
            "https://fred.test/fred/series/observations",
            "https://wb.test/v2/country/WLD/indicator/NY.GDP.MKTP.KD.ZG",
        ]
    );
}

#[tokio::test]
async fn failed_dataset_keeps_previous_entry() {
    let dir = TempDir::new().unwrap();
    let output = output_in(&dir);
    write_document(&output, &previous_document());

    let transport = Arc::new(
        ScriptedTransport::new()
            .respond(Ok(gdp_response()))
            .respond(Err(TransportError::Status { status: 500, body: "Internal Server Error".to_string() }))
            .respond(Ok(wb_response())),
    );
    let updater = updater(transport, &output);

    let run = updater.update_all().await.unwrap();
    assert_eq!(run.status, RunStatus::PartiallyCompleted);

    let doc = read_document(&output);
    assert_eq!(doc.datasets["unemployment"], previous_entry("Unemployment Rate (US)", 3.6));
    assert_eq!(doc.datasets["gdp"].data.latest.value, Some(28.629));
    assert_ne!(doc.meta.last_updated, "01.01.2000 00:00");

    let fred = &doc.meta.update_summary["fred"];
    assert_eq!((fred.total, fred.successful, fred.failed), (2, 1, 1));
    assert_eq!(fred.errors.len(), 1);
    assert!(fred.errors[0].starts_with("unemployment: "));
    assert!(fred.errors[0].contains("fred"));
}

#[tokio::test]
async fn degraded_run_without_previous_document() {
    let dir = TempDir::new().unwrap();
    let output = output_in(&dir);
    let updater = updater(Arc::new(ScriptedTransport::new()), &output);

    let run = updater.update_all().await.unwrap();
    assert_eq!(run.status, RunStatus::PartiallyCompleted);

    let doc = read_document(&output);
    assert!(doc.datasets.is_empty());
    for summary in doc.meta.update_summary.values() {
        assert_eq!(summary.failed, summary.total);
        assert_eq!(summary.errors.len(), summary.total);
    }
    assert_eq!(run.total(), 3);
}

#[tokio::test]
async fn single_dataset_update_patches_one_key() {
    let dir = TempDir::new().unwrap();
    let output = output_in(&dir);
    let mut previous = previous_document();
    previous.meta.update_summary.insert("fred".to_string(), Default::default());
    write_document(&output, &previous);

    let transport = Arc::new(ScriptedTransport::new().respond(Ok(unrate_response())));
    let updater = updater(transport.clone(), &output);

    let series = updater.update_single_dataset("fred", "unemployment").await.unwrap();
    assert_eq!(series.meta.count, 2);

    let doc = read_document(&output);
    assert_eq!(doc.datasets["gdp"], previous.datasets["gdp"]);
    assert_eq!(doc.datasets["unemployment"].data.latest.value, Some(4.1));
    assert_eq!(doc.meta.update_summary, previous.meta.update_summary);
    assert_ne!(doc.meta.last_updated, previous.meta.last_updated);
    assert_eq!(transport.requests()[0].param("series_id"), Some("UNRATE"));
}

#[tokio::test]
async fn single_dataset_failure_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let output = output_in(&dir);
    write_document(&output, &previous_document());
    let before = std::fs::read_to_string(&output).unwrap();

    let updater = updater(Arc::new(ScriptedTransport::new()), &output);
    let result = updater.update_single_dataset("fred", "unemployment").await;

    assert!(matches!(result, Err(UpdateError::Fetch(_))));
    assert_eq!(std::fs::read_to_string(&output).unwrap(), before);
}

#[tokio::test]
async fn unregistered_source_is_reported() {
    let dir = TempDir::new().unwrap();
    let updater = updater(Arc::new(ScriptedTransport::new()), &output_in(&dir));

    let err = updater.update_single_dataset("eurostat", "hicp").await.unwrap_err();
    assert!(err.to_string().contains("not registered"));
}

#[tokio::test]
async fn second_run_is_served_from_cache() {
    let dir = TempDir::new().unwrap();
    let output = output_in(&dir);
    let transport = Arc::new(
        ScriptedTransport::new()
            .respond(Ok(gdp_response()))
            .respond(Ok(unrate_response()))
            .respond(Ok(wb_response())),
    );
    let updater = updater(transport.clone(), &output);

    let first = updater.update_all().await.unwrap();
    let second = updater.update_all().await.unwrap();

    assert_eq!(transport.requests().len(), 3);
    assert_eq!(second.status, RunStatus::Completed);
    assert_eq!(second.document.datasets, first.document.datasets);

    updater.manager().clear_cache(Some("fred"));
    let third = updater.update_all().await.unwrap();
    assert_eq!(transport.requests().len(), 5);
    assert_eq!(third.document.meta.update_summary["fred"].failed, 2);
    // Previous run's entries carried forward.
    assert_eq!(third.document.datasets["gdp"], first.document.datasets["gdp"]);
}

#[tokio::test]
async fn unwritable_output_is_a_persistence_error() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not_a_dir");
    std::fs::write(&blocker, "x").unwrap();

    let updater = updater(Arc::new(ScriptedTransport::new()), &blocker.join("economic_data.json"));
    let result = updater.update_all().await;

    assert!(matches!(result, Err(UpdateError::Persistence(_))));
}
