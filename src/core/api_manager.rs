use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::core::rate_limiter::RateLimitState;
use crate::error::SourceError;
use crate::fetcher::DataSource;
use crate::models::{DatasetInfo, QueryParams, StandardizedSeries};

pub type FetchResult = Result<StandardizedSeries, SourceError>;

struct RegisteredSource {
    source: Arc<dyn DataSource>,
    /// Held across wait -> cache lookup -> fetch, which serializes calls per source.
    gate: AsyncMutex<RateLimitState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    source: String,
    dataset: String,
    params: String,
}

impl CacheKey {
    fn new(source: &str, dataset: &str, params: &QueryParams) -> Self {
        // BTreeMap iteration is sorted, so equal maps give equal strings.
        let params = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        Self { source: source.to_string(), dataset: dataset.to_string(), params }
    }
}

struct CacheEntry {
    value: FetchResult,
    stored_at: Instant,
}

/// Owns the registered sources, their spacing clocks and the response cache.
///
/// Fetches never fail loudly: every problem comes back as a tagged
/// `SourceError`, and errors are cached just like data so a broken endpoint
/// is not hammered for the whole TTL window.
pub struct ApiManager {
    api_keys: HashMap<String, String>,
    /// Registration order is the update order.
    sources: IndexMap<String, RegisteredSource>,
    cache: Mutex<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
}

impl ApiManager {
    pub fn new(api_keys: HashMap<String, String>, ttl: Duration) -> Self {
        info!("API Manager initialized");
        Self {
            api_keys,
            sources: IndexMap::new(),
            cache: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.api_keys.clone(), Duration::from_secs(config.cache_ttl_secs))
    }

    /// Re-registering a name replaces the source in place (keeping its
    /// position in the update order) and resets its spacing clock.
    pub fn register(&mut self, name: &str, source: Arc<dyn DataSource>) {
        let gate = AsyncMutex::new(RateLimitState::new(source.min_call_interval()));
        let entry = RegisteredSource { source, gate };

        if self.sources.insert(name.to_string(), entry).is_some() {
            warn!("Source {} already registered. Overwriting.", name);
        }
        info!("Registered source: {}", name);
    }

    /// Names in registration order.
    pub fn source_names(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    pub fn get_api_key(&self, source_name: &str) -> String {
        match self.api_keys.get(source_name) {
            Some(key) => key.clone(),
            None => {
                warn!("No API key found for {}", source_name);
                String::new()
            }
        }
    }

    pub async fn fetch(&self, source_name: &str, dataset_id: &str, params: &QueryParams) -> FetchResult {
        let Some(entry) = self.sources.get(source_name) else {
            let msg = format!("Source {} not registered", source_name);
            error!("{}", msg);
            return Err(SourceError::Configuration(msg));
        };

        let mut gate = entry.gate.lock().await;
        gate.wait().await;

        let key = CacheKey::new(source_name, dataset_id, params);
        if let Some(cached) = self.cached(&key) {
            info!("Using cached data for {}/{}", source_name, dataset_id);
            return cached;
        }

        gate.mark();
        let result = entry
            .source
            .fetch_dataset(dataset_id, params)
            .await
            .map_err(|e| e.with_context(&format!("Error fetching data from {}: ", source_name)));

        match &result {
            Ok(_) => info!("Successfully fetched data from {} for {}", source_name, dataset_id),
            Err(e) => error!("{}", e),
        }

        self.store(key, result.clone());
        result
    }

    fn cached(&self, key: &CacheKey) -> Option<FetchResult> {
        let cache = self.cache.lock().ok()?;
        cache
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone())
    }

    fn store(&self, key: CacheKey, value: FetchResult) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, CacheEntry { value, stored_at: Instant::now() });
        }
    }

    /// Drop every cached entry, or only those of one source.
    pub fn clear_cache(&self, source_name: Option<&str>) {
        let Ok(mut cache) = self.cache.lock() else { return };
        match source_name {
            Some(name) => {
                cache.retain(|key, _| key.source != name);
                info!("Cleared cache for source {}", name);
            }
            None => {
                cache.clear();
                info!("Cleared entire cache");
            }
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub async fn get_available_datasets(&self, source_name: &str) -> Vec<DatasetInfo> {
        match self.sources.get(source_name) {
            Some(entry) => entry.source.get_available_datasets().await,
            None => {
                error!("Source {} not registered", source_name);
                Vec::new()
            }
        }
    }
}
