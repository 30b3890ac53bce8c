use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single dataset fetch.
///
/// These are plain values: the API manager caches them next to successful
/// series and the orchestrator inspects them to decide on fallback.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    /// Missing source registration, dataset mapping or API key. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network, timeout or provider-side throttling that survived all retries.
    #[error("Transient error: {0}")]
    Transient(String),

    /// The provider answered, but not with the shape we expect.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl SourceError {
    pub fn message(&self) -> &str {
        match self {
            SourceError::Configuration(msg)
            | SourceError::Transient(msg)
            | SourceError::Protocol(msg) => msg,
        }
    }

    /// Prefix the message while keeping the error kind.
    pub fn with_context(self, context: &str) -> Self {
        match self {
            SourceError::Configuration(msg) => SourceError::Configuration(format!("{}{}", context, msg)),
            SourceError::Transient(msg) => SourceError::Transient(format!("{}{}", context, msg)),
            SourceError::Protocol(msg) => SourceError::Protocol(format!("{}{}", context, msg)),
        }
    }
}

/// Reading or writing the consolidated document failed.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error on {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum UpdateError {
    #[error(transparent)]
    Fetch(#[from] SourceError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
