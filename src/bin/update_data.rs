use anyhow::{bail, Context};
use economic_data_updater_lib::fetcher::transport::HttpTransport;
use economic_data_updater_lib::{build_updater, AppConfig, RunStatus, UpdateError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Usage: `update_data [source.dataset]`
///
/// Without an argument every configured dataset is refreshed. Paths come
/// from `WED_CONFIG` (default `api_config.json`) and `WED_OUTPUT`
/// (default `economic_data.json`).
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = PathBuf::from(std::env::var("WED_CONFIG").unwrap_or_else(|_| "api_config.json".to_string()));
    let output_path = PathBuf::from(std::env::var("WED_OUTPUT").unwrap_or_else(|_| "economic_data.json".to_string()));

    let config = AppConfig::load(&config_path)?;
    let updater = build_updater(&config, &output_path, Arc::new(HttpTransport::new()));

    match std::env::args().nth(1) {
        Some(target) => {
            let Some((source, dataset)) = target.split_once('.') else {
                bail!("Expected <source>.<dataset>, got '{}'", target);
            };
            match updater.update_single_dataset(source, dataset).await {
                Ok(series) => println!(
                    "Updated {}: {} observations, latest {:?} ({})",
                    target,
                    series.meta.count,
                    series.data.latest.value,
                    series.data.latest.date.as_deref().unwrap_or("-")
                ),
                // The previous entry stays in place; only a failed write is fatal.
                Err(UpdateError::Fetch(e)) => println!("❌ {} not updated: {}", target, e),
                Err(e) => return Err(e).with_context(|| format!("Saving {} failed", target)),
            }
        }
        None => {
            let run = updater.update_all().await?;
            println!("Wrote {:?}", updater.output_path());
            for (source, summary) in &run.document.meta.update_summary {
                println!("  {:<12} {}/{} ok", source, summary.successful, summary.total);
                for err in &summary.errors {
                    println!("    ❌ {}", err);
                }
            }
            if run.status == RunStatus::PartiallyCompleted {
                println!("Finished with failures ({}/{} datasets updated)", run.successful(), run.total());
            }
        }
    }

    Ok(())
}
