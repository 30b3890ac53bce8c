use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{AppConfig, SourceConfig};
use crate::core::api_manager::ApiManager;
use crate::core::orchestrator::DataUpdater;
use crate::datasets::LabelRegistry;
use crate::fetcher::fred::FredSource;
use crate::fetcher::transport::Transport;
use crate::fetcher::worldbank::WorldBankSource;
use crate::fetcher::DataSource;

/// Instantiate the provider behind a configured source name.
///
/// FRED is skipped when no key is configured; unknown names are skipped.
pub fn create_source(
    name: &str,
    config: &SourceConfig,
    manager: &ApiManager,
    transport: Arc<dyn Transport>,
) -> Option<Arc<dyn DataSource>> {
    match name {
        "fred" => {
            let api_key = manager.get_api_key(name);
            if api_key.trim().is_empty() {
                warn!("FRED API key missing - skipping FRED registration");
                return None;
            }
            Some(Arc::new(FredSource::new(config.clone(), api_key, transport)))
        }
        "worldbank" => Some(Arc::new(WorldBankSource::new(config.clone(), transport))),
        other => {
            warn!("Unknown source '{}' in config - skipping", other);
            None
        }
    }
}

/// Register every usable configured source and wire up the updater.
pub fn build_updater(config: &AppConfig, output_path: impl Into<PathBuf>, transport: Arc<dyn Transport>) -> DataUpdater {
    let mut manager = ApiManager::from_config(config);
    let mut configured: Vec<(String, Vec<String>)> = Vec::new();

    for (name, source_config) in &config.sources {
        if let Some(source) = create_source(name, source_config, &manager, transport.clone()) {
            manager.register(name, source);
            configured.push((name.clone(), source_config.dataset_ids()));
            info!("{} source registered ({} datasets)", source_config.name, source_config.datasets.len());
        }
    }

    let mut updater = DataUpdater::new(manager, output_path, LabelRegistry::new(config.labels.clone()));
    for (name, dataset_ids) in configured {
        updater.set_datasets(&name, dataset_ids);
    }

    info!("WED Data Updater initialized");
    updater
}
