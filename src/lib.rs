pub mod config;
pub mod core;
pub mod datasets;
pub mod error;
pub mod fetcher;
pub mod models;

pub use crate::config::AppConfig;
pub use crate::core::orchestrator::{DataUpdater, RunStatus, UpdateRun};
pub use crate::core::seeder::build_updater;
pub use crate::error::{SourceError, UpdateError};
