use economic_data_updater_lib::fetcher::transport::HttpTransport;
use economic_data_updater_lib::{build_updater, AppConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let config_path = PathBuf::from(std::env::var("WED_CONFIG").unwrap_or_else(|_| "api_config.json".to_string()));
    let config = AppConfig::load(&config_path)?;
    let updater = build_updater(&config, "economic_data.json", Arc::new(HttpTransport::new()));
    let manager = updater.manager();

    println!("{:<20} | {:<12} | {:<20} | {:<15} | {}", "Dataset", "Source", "Series", "Units", "Title");
    println!("{}", "-".repeat(100));

    for source in manager.source_names() {
        for info in manager.get_available_datasets(&source).await {
            println!(
                "{:<20} | {:<12} | {:<20} | {:<15} | {}",
                info.id, info.source, info.series_id, info.units, info.title
            );
        }
    }

    Ok(())
}
