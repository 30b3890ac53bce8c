use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info, warn};

use crate::core::api_manager::ApiManager;
use crate::datasets::LabelRegistry;
use crate::error::{PersistenceError, UpdateError};
use crate::models::{ConsolidatedDocument, DatasetEntry, DocumentMeta, QueryParams, SourceSummary, StandardizedSeries};

pub const DOCUMENT_SOURCE: &str = "Multiple APIs via WED Data Updater";

/// Display format the dashboard expects for `meta.last_updated`.
pub const DISPLAY_TIME_FORMAT: &str = "%d.%m.%Y %H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Idle,
    Running,
    /// Every dataset was fetched fresh.
    Completed,
    /// At least one dataset failed (possibly all of them).
    PartiallyCompleted,
}

#[derive(Debug, Clone)]
pub struct UpdateRun {
    pub status: RunStatus,
    pub document: ConsolidatedDocument,
}

impl UpdateRun {
    pub fn total(&self) -> usize {
        self.document.meta.update_summary.values().map(|s| s.total).sum()
    }

    pub fn successful(&self) -> usize {
        self.document.meta.update_summary.values().map(|s| s.successful).sum()
    }
}

/// Walks every source and dataset, consolidates the results and writes the
/// dashboard document.
///
/// A failing dataset never aborts the run: it is recorded in the source's
/// summary and, when the previous document had it, the old entry is carried
/// forward unchanged.
pub struct DataUpdater {
    manager: ApiManager,
    /// source name -> dataset ids, in declaration order
    datasets: IndexMap<String, Vec<String>>,
    labels: LabelRegistry,
    output_path: PathBuf,
    status: Mutex<RunStatus>,
}

impl DataUpdater {
    pub fn new(manager: ApiManager, output_path: impl Into<PathBuf>, labels: LabelRegistry) -> Self {
        Self {
            manager,
            datasets: IndexMap::new(),
            labels,
            output_path: output_path.into(),
            status: Mutex::new(RunStatus::Idle),
        }
    }

    pub fn set_datasets(&mut self, source_name: &str, dataset_ids: Vec<String>) {
        self.datasets.insert(source_name.to_string(), dataset_ids);
    }

    fn datasets_for(&self, source_name: &str) -> &[String] {
        self.datasets.get(source_name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn manager(&self) -> &ApiManager {
        &self.manager
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn status(&self) -> RunStatus {
        self.status.lock().map(|s| *s).unwrap_or(RunStatus::Idle)
    }

    fn set_status(&self, status: RunStatus) {
        if let Ok(mut s) = self.status.lock() {
            *s = status;
        }
    }

    /// Refresh every configured dataset and persist the rebuilt document.
    ///
    /// Only a failed write returns `Err`; dataset failures show up in
    /// `meta.update_summary`.
    pub async fn update_all(&self) -> Result<UpdateRun, UpdateError> {
        info!("Starting full data update...");
        self.set_status(RunStatus::Running);

        let mut document = empty_document();

        // Loaded on first failure only.
        let mut previous: Option<Option<ConsolidatedDocument>> = None;
        let no_params = QueryParams::new();

        for source_name in self.manager.source_names() {
            info!("Updating data from {}...", source_name);
            let dataset_ids = self.datasets_for(&source_name);

            let mut summary = SourceSummary { total: dataset_ids.len(), ..Default::default() };

            for dataset_id in dataset_ids {
                match self.manager.fetch(&source_name, dataset_id, &no_params).await {
                    Ok(series) => {
                        document.datasets.insert(dataset_id.clone(), self.format_dataset(&series, dataset_id));
                        summary.successful += 1;
                        info!("✅ Updated {}", dataset_id);
                    }
                    Err(e) => {
                        summary.failed += 1;
                        summary.errors.push(format!("{}: {}", dataset_id, e.message()));
                        error!("❌ Failed to update {}: {}", dataset_id, e.message());

                        if previous.is_none() {
                            previous = Some(self.load_existing().await);
                        }
                        let old_entry = previous
                            .as_ref()
                            .and_then(|doc| doc.as_ref())
                            .and_then(|doc| doc.datasets.get(dataset_id));

                        if let Some(old) = old_entry {
                            document.datasets.insert(dataset_id.clone(), old.clone());
                            info!("🔄 Using previous data for {}", dataset_id);
                        }
                    }
                }
            }

            document.meta.update_summary.insert(source_name, summary);
        }

        let run = UpdateRun {
            status: if document.meta.update_summary.values().any(|s| s.failed > 0) {
                RunStatus::PartiallyCompleted
            } else {
                RunStatus::Completed
            },
            document,
        };
        info!("Update complete: {}/{} datasets updated successfully", run.successful(), run.total());

        if let Err(e) = self.save(&run.document).await {
            self.set_status(RunStatus::PartiallyCompleted);
            error!("Failed to save data: {}", e);
            return Err(e.into());
        }

        self.set_status(run.status);
        Ok(run)
    }

    /// Refresh one dataset and patch it into the existing document.
    ///
    /// Only that key and `meta.last_updated` change. On a failed fetch the
    /// file is left as it is, so the previous entry keeps serving. A file
    /// that exists but cannot be read or parsed is an error, never replaced.
    pub async fn update_single_dataset(&self, source_name: &str, dataset_id: &str) -> Result<StandardizedSeries, UpdateError> {
        info!("Updating single dataset: {}.{}", source_name, dataset_id);

        let series = match self.manager.fetch(source_name, dataset_id, &QueryParams::new()).await {
            Ok(series) => series,
            Err(e) => {
                error!("❌ Failed to update {}: {}", dataset_id, e.message());
                return Err(e.into());
            }
        };

        let mut document = self.read_document().await?.unwrap_or_else(empty_document);
        document.datasets.insert(dataset_id.to_string(), self.format_dataset(&series, dataset_id));
        document.meta.last_updated = now_display();

        self.save(&document).await?;
        info!("✅ Successfully updated {}", dataset_id);
        Ok(series)
    }

    fn format_dataset(&self, series: &StandardizedSeries, dataset_id: &str) -> DatasetEntry {
        DatasetEntry {
            title: self.labels.title(dataset_id),
            unit: self.labels.unit(dataset_id),
            data: series.data.clone(),
        }
    }

    /// Previously persisted document for fallback; missing or unreadable
    /// means none.
    pub async fn load_existing(&self) -> Option<ConsolidatedDocument> {
        match self.read_document().await {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Ignoring previous document: {}", e);
                None
            }
        }
    }

    /// `Ok(None)` only when the file does not exist.
    async fn read_document(&self) -> Result<Option<ConsolidatedDocument>, PersistenceError> {
        let path = &self.output_path;
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(PersistenceError::Io { path: path.clone(), source }),
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| PersistenceError::Json { path: path.clone(), source })
    }

    /// Write to a sibling temp file, then rename over the target.
    async fn save(&self, document: &ConsolidatedDocument) -> Result<(), PersistenceError> {
        let path = &self.output_path;
        let json = serde_json::to_string_pretty(document)
            .map_err(|source| PersistenceError::Json { path: path.clone(), source })?;

        let tmp_path = temp_path(path);
        let io_err = |source: std::io::Error| PersistenceError::Io { path: path.clone(), source };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(&tmp_path, json.as_bytes()).await.map_err(io_err)?;
        if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(io_err(e));
        }

        info!("Data saved to {:?}", path);
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| "economic_data.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn empty_document() -> ConsolidatedDocument {
    ConsolidatedDocument {
        meta: DocumentMeta {
            last_updated: now_display(),
            source: DOCUMENT_SOURCE.to_string(),
            update_summary: Default::default(),
        },
        datasets: Default::default(),
    }
}

fn now_display() -> String {
    chrono::Local::now().format(DISPLAY_TIME_FORMAT).to_string()
}
