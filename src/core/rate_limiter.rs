use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::fetcher::transport::TransportError;

pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Config values are seconds as floats; negative, NaN or out-of-range values
/// fall back to the default.
pub fn interval_from_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(DEFAULT_MIN_INTERVAL)
}

/// Spacing clock for one source.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    pub last_call: Option<Instant>,
    pub min_interval: Duration,
}

impl RateLimitState {
    pub fn new(min_interval: Duration) -> Self {
        Self { last_call: None, min_interval }
    }

    /// Time left before the next call may start.
    pub fn remaining(&self) -> Duration {
        match self.last_call {
            Some(last) => self.min_interval.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Block until `min_interval` has passed since the last call started.
    pub async fn wait(&self) {
        let remaining = self.remaining();
        if !remaining.is_zero() {
            debug!("Rate limiting: waiting {:.2}s", remaining.as_secs_f64());
            sleep(remaining).await;
        }
    }

    pub fn mark(&mut self) {
        self.last_call = Some(Instant::now());
    }
}

/// Minimum-interval spacing plus bounded exponential-backoff retry around a
/// single outbound call.
///
/// This is not a token bucket: after an idle period only the first call goes
/// out immediately, every following one is spaced by `min_interval`.
pub struct RateLimiter {
    state: Mutex<RateLimitState>,
    max_attempts: u32,
    base_backoff: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, max_attempts: u32) -> Self {
        Self {
            state: Mutex::new(RateLimitState::new(min_interval)),
            max_attempts: max_attempts.max(1),
            base_backoff: Duration::from_secs(1),
        }
    }

    /// Build from the `rate_limit` seconds found in the source config.
    pub fn from_config(rate_limit_secs: f64, retries: u32) -> Self {
        Self::new(interval_from_secs(rate_limit_secs), retries)
    }

    /// 1s, 2s, 4s, ...
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_backoff * 2u32.saturating_pow(attempt)
    }

    pub async fn execute<T, F, Fut>(&self, mut call: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        // Held for the whole attempt sequence so concurrent callers queue up
        // behind each other instead of racing on `last_call`.
        let mut state = self.state.lock().await;
        state.wait().await;

        let mut last_error: Option<TransportError> = None;

        for attempt in 0..self.max_attempts {
            // Stamped at the start, so slow responses don't shorten the gap.
            state.mark();
            debug!("Request attempt {}/{}", attempt + 1, self.max_attempts);

            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => {
                    return Err(SourceError::Protocol(e.to_string()));
                }
                Err(e) => {
                    warn!("Request failed (attempt {}/{}): {}", attempt + 1, self.max_attempts, e);
                    last_error = Some(e);

                    if attempt + 1 < self.max_attempts {
                        sleep(self.backoff_delay(attempt)).await;
                    }
                }
            }
        }

        let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
        Err(SourceError::Transient(format!("Failed after {} attempts: {}", self.max_attempts, reason)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn network_err() -> TransportError {
        TransportError::Network("connection refused".to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn test_spacing_between_call_starts() {
        let limiter = RateLimiter::new(Duration::from_secs(1), 3);
        let starts = StdMutex::new(Vec::new());
        let starts_ref = &starts;

        for _ in 0..3 {
            limiter
                .execute(|| async move {
                    starts_ref.lock().unwrap().push(Instant::now());
                    Ok::<_, TransportError>(())
                })
                .await
                .unwrap();
        }

        let starts = starts.into_inner().unwrap();
        assert_eq!(starts.len(), 3);
        assert!(starts[1] - starts[0] >= Duration::from_secs(1));
        assert!(starts[2] - starts[1] >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_call_after_idle_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_secs(5), 3);
        let before = Instant::now();
        let started = limiter.execute(|| async { Ok::<_, TransportError>(Instant::now()) }).await.unwrap();
        assert_eq!(started, before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_exponential_backoff() {
        let limiter = RateLimiter::new(Duration::ZERO, 3);
        let starts = StdMutex::new(Vec::new());
        let starts_ref = &starts;

        let result = limiter
            .execute(|| async move {
                let mut s = starts_ref.lock().unwrap();
                s.push(Instant::now());
                if s.len() < 3 { Err(network_err()) } else { Ok(42) }
            })
            .await;

        assert_eq!(result, Ok(42));
        let starts = starts.into_inner().unwrap();
        assert_eq!(starts[1] - starts[0], Duration::from_secs(1));
        assert_eq!(starts[2] - starts[1], Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_are_transient() {
        let limiter = RateLimiter::new(Duration::ZERO, 3);
        let calls = StdMutex::new(0u32);
        let calls_ref = &calls;

        let result: Result<(), _> = limiter
            .execute(|| async move {
                *calls_ref.lock().unwrap() += 1;
                Err(TransportError::Status { status: 503, body: "unavailable".to_string() })
            })
            .await;

        assert_eq!(*calls.lock().unwrap(), 3);
        match result {
            Err(SourceError::Transient(msg)) => {
                assert!(msg.contains("Failed after 3 attempts"));
                assert!(msg.contains("503"));
            }
            other => panic!("expected transient error, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_decode_error_not_retried() {
        let limiter = RateLimiter::new(Duration::ZERO, 3);
        let calls = StdMutex::new(0u32);
        let calls_ref = &calls;

        let result: Result<(), _> = limiter
            .execute(|| async move {
                *calls_ref.lock().unwrap() += 1;
                Err(TransportError::Decode("expected value at line 1".to_string()))
            })
            .await;

        assert_eq!(*calls.lock().unwrap(), 1);
        assert!(matches!(result, Err(SourceError::Protocol(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spacing_measured_from_attempt_start() {
        let limiter = RateLimiter::new(Duration::from_secs(1), 1);
        let starts = StdMutex::new(Vec::new());
        let starts_ref = &starts;

        for _ in 0..2 {
            limiter
                .execute(|| async move {
                    starts_ref.lock().unwrap().push(Instant::now());
                    sleep(Duration::from_secs(5)).await;
                    Ok::<_, TransportError>(())
                })
                .await
                .unwrap();
        }

        // The slow response already covered the interval: no extra wait.
        let starts = starts.into_inner().unwrap();
        assert_eq!(starts[1] - starts[0], Duration::from_secs(5));
    }

    #[test]
    fn test_interval_from_config_secs() {
        assert_eq!(interval_from_secs(0.0), Duration::ZERO);
        assert_eq!(interval_from_secs(0.5), Duration::from_millis(500));
        assert_eq!(interval_from_secs(-1.0), DEFAULT_MIN_INTERVAL);
        assert_eq!(interval_from_secs(f64::NAN), DEFAULT_MIN_INTERVAL);
        assert_eq!(interval_from_secs(1e20), DEFAULT_MIN_INTERVAL);
    }

    #[test]
    fn test_backoff_schedule() {
        let limiter = RateLimiter::new(Duration::ZERO, 4);
        assert_eq!(limiter.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(limiter.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(limiter.backoff_delay(2), Duration::from_secs(4));
    }
}
