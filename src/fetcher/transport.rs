use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl TransportError {
    /// A body that is not JSON will not become JSON on the next attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::Decode(_))
    }
}

/// The outbound HTTP capability a data source needs: GET a URL, get JSON back.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(
        &self,
        url: &str,
        query: &[(String, String)],
        timeout: Duration,
    ) -> Result<Value, TransportError>;
}

pub struct HttpTransport {
    client: Client,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    pub fn new() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("WedDataUpdater/1.0"));

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(
        &self,
        url: &str,
        query: &[(String, String)],
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        // Only the URL is logged, the query carries the API key.
        debug!("GET {}", url);

        let resp = self
            .client
            .get(url)
            .query(query)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status { status: status.as_u16(), body });
        }

        read_json(resp).await
    }
}

/// A body cut off mid-stream is a network error and worth retrying; only a
/// complete body that is not JSON is a decode error.
async fn read_json(resp: reqwest::Response) -> Result<Value, TransportError> {
    let body = resp.bytes().await.map_err(classify)?;
    serde_json::from_slice(&body).map_err(|e| TransportError::Decode(e.to_string()))
}

fn classify(err: reqwest::Error) -> TransportError {
    // reqwest includes the full URL (and so the key) in its message.
    let err = err.without_url();
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else {
        TransportError::Network(err.to_string())
    }
}

/// Replays canned responses in order and records every request.
///
/// Lets the whole pipeline run without network access.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<Value, TransportError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, response: Result<Value, TransportError>) -> Self {
        self.push(response);
        self
    }

    pub fn push(&self, response: Result<Value, TransportError>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get_json(
        &self,
        url: &str,
        query: &[(String, String)],
        _timeout: Duration,
    ) -> Result<Value, TransportError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest { url: url.to_string(), query: query.to_vec() });
        }

        self.responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| Err(TransportError::Network("no scripted response left".to_string())))
    }
}
