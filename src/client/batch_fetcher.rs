//! Rate-limited request scheduling.
//!
//! Requests go out in fixed-size waves. All requests of a wave run
//! concurrently on the current task; the next wave starts only after every
//! request of the previous one has resolved and the cooldown has elapsed.
//! Outcomes are returned in the same order as the input descriptors.

use crate::client::transport::Transport;
use crate::models::{FetchOutcome, RequestDescriptor};
use crate::utils::constants::{
    DEFAULT_COOLDOWN_SECS, DEFAULT_RETRY_DELAY_SECS, DEFAULT_TIMEOUT_SECS, DEFAULT_WAVE_SIZE,
    MAX_RETRY_DELAY_SECS,
};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Receives progress callbacks while a batch is in flight.
pub trait FetchObserver: Send + Sync {
    fn wave_started(&self, _wave: usize, _total_waves: usize, _requests: usize) {}

    fn request_finished(&self, _request: &RequestDescriptor, _outcome: &FetchOutcome) {}

    fn cooling_down(&self, _wave: usize, _cooldown: Duration) {}
}

/// Backoff applied to rate-limited (429) responses only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries per request; zero disables retrying
    pub max_retries: u32,
    /// Delay before the first retry (doubles each retry)
    pub initial_delay: Duration,
    /// Upper bound on the retry delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            max_delay: Duration::from_secs(MAX_RETRY_DELAY_SECS),
        }
    }
}

pub struct BatchFetcher {
    transport: Arc<dyn Transport>,
    wave_size: usize,
    cooldown: Duration,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl BatchFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            wave_size: DEFAULT_WAVE_SIZE,
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_wave_size(mut self, wave_size: usize) -> Self {
        self.wave_size = wave_size.max(1);
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn wave_size(&self) -> usize {
        self.wave_size
    }

    pub fn wave_count(&self, requests: usize) -> usize {
        requests.div_ceil(self.wave_size)
    }

    /// Fetch every request, returning exactly one outcome per descriptor in
    /// input order.
    #[instrument(skip_all, fields(requests = requests.len(), wave_size = self.wave_size))]
    pub async fn fetch_all(
        &self,
        requests: &[RequestDescriptor],
        observer: Option<&dyn FetchObserver>,
    ) -> Vec<FetchOutcome> {
        let total_waves = self.wave_count(requests.len());
        let mut outcomes = Vec::with_capacity(requests.len());

        for (wave, chunk) in requests.chunks(self.wave_size).enumerate() {
            if let Some(o) = observer {
                o.wave_started(wave + 1, total_waves, chunk.len());
            }
            debug!(
                wave = wave + 1,
                total_waves,
                requests = chunk.len(),
                "Dispatching wave"
            );

            let wave_outcomes =
                join_all(chunk.iter().map(|request| self.fetch_one(request, observer))).await;
            outcomes.extend(wave_outcomes);

            info!(
                completed = outcomes.len(),
                remaining = requests.len() - outcomes.len(),
                "Wave {}/{} finished",
                wave + 1,
                total_waves
            );

            if wave + 1 < total_waves && !self.cooldown.is_zero() {
                if let Some(o) = observer {
                    o.cooling_down(wave + 1, self.cooldown);
                }
                tokio::time::sleep(self.cooldown).await;
            }
        }

        outcomes
    }

    async fn fetch_one(
        &self,
        request: &RequestDescriptor,
        observer: Option<&dyn FetchObserver>,
    ) -> FetchOutcome {
        let mut attempt = 0;

        let outcome = loop {
            let outcome =
                match tokio::time::timeout(self.request_timeout, self.transport.get(&request.url))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => FetchOutcome::Timeout,
                };

            if outcome.is_rate_limited() {
                if attempt < self.retry.max_retries {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        index = request.index,
                        attempt,
                        delay_secs = delay.as_secs_f64(),
                        "Rate limited, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                warn!(index = request.index, url = %request.url, "Rate limited (HTTP 429)");
            } else if !outcome.is_success() {
                warn!(
                    index = request.index,
                    url = %request.url,
                    outcome = %outcome.describe(),
                    "Request failed"
                );
            }

            break outcome;
        };

        if let Some(o) = observer {
            o.request_finished(request, &outcome);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Fails any URL containing "fail", answers 429 to URLs containing
    /// "limited" until `limited_responses` are used up. URLs containing
    /// "slow" take two minutes to answer.
    struct StubTransport {
        calls: AtomicUsize,
        limited_responses: AtomicUsize,
    }

    impl StubTransport {
        fn new(limited_responses: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                limited_responses: AtomicUsize::new(limited_responses),
            }
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn get(&self, url: &str) -> FetchOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if url.contains("slow") {
                tokio::time::sleep(Duration::from_secs(120)).await;
            }
            if url.contains("fail") {
                FetchOutcome::HttpError {
                    status: 500,
                    message: None,
                }
            } else if url.contains("limited")
                && self
                    .limited_responses
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
            {
                FetchOutcome::HttpError {
                    status: 429,
                    message: None,
                }
            } else {
                FetchOutcome::Success(json!({ "url": url }))
            }
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        waves: Mutex<Vec<usize>>,
        finished: AtomicUsize,
        cooldowns: AtomicUsize,
    }

    impl FetchObserver for RecordingObserver {
        fn wave_started(&self, _wave: usize, _total_waves: usize, requests: usize) {
            self.waves.lock().unwrap().push(requests);
        }

        fn request_finished(&self, _request: &RequestDescriptor, _outcome: &FetchOutcome) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }

        fn cooling_down(&self, _wave: usize, _cooldown: Duration) {
            self.cooldowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn descriptors(urls: &[&str]) -> Vec<RequestDescriptor> {
        urls.iter()
            .enumerate()
            .map(|(i, url)| RequestDescriptor::new(url.to_string(), i))
            .collect()
    }

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(4), Duration::from_secs(10));
    }

    #[test]
    fn test_wave_count() {
        let fetcher = BatchFetcher::new(Arc::new(StubTransport::new(0))).with_wave_size(5);
        assert_eq!(fetcher.wave_count(0), 0);
        assert_eq!(fetcher.wave_count(5), 1);
        assert_eq!(fetcher.wave_count(12), 3);

        let fetcher = BatchFetcher::new(Arc::new(StubTransport::new(0))).with_wave_size(0);
        assert_eq!(fetcher.wave_size(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waves_and_cooldowns() {
        let urls: Vec<String> = (0..12).map(|i| format!("https://api/{}", i)).collect();
        let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let requests = descriptors(&url_refs);

        let observer = RecordingObserver::default();
        let fetcher = BatchFetcher::new(Arc::new(StubTransport::new(0)))
            .with_wave_size(5)
            .with_cooldown(Duration::from_secs(10));

        let outcomes = fetcher.fetch_all(&requests, Some(&observer)).await;

        assert_eq!(outcomes.len(), 12);
        assert_eq!(*observer.waves.lock().unwrap(), vec![5, 5, 2]);
        assert_eq!(observer.cooldowns.load(Ordering::SeqCst), 2);
        assert_eq!(observer.finished.load(Ordering::SeqCst), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outcomes_keep_input_order_with_failures() {
        let requests = descriptors(&["https://api/a", "https://api/fail", "https://api/c"]);
        let fetcher = BatchFetcher::new(Arc::new(StubTransport::new(0))).with_wave_size(2);

        let outcomes = fetcher.fetch_all(&requests, None).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0], FetchOutcome::Success(json!({ "url": "https://api/a" })));
        assert!(matches!(
            outcomes[1],
            FetchOutcome::HttpError { status: 500, .. }
        ));
        assert_eq!(outcomes[2], FetchOutcome::Success(json!({ "url": "https://api/c" })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_not_retried_by_default() {
        let transport = Arc::new(StubTransport::new(1));
        let fetcher = BatchFetcher::new(transport.clone());

        let outcomes = fetcher
            .fetch_all(&descriptors(&["https://api/limited"]), None)
            .await;

        assert!(outcomes[0].is_rate_limited());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_retried_with_policy() {
        let transport = Arc::new(StubTransport::new(2));
        let fetcher =
            BatchFetcher::new(transport.clone()).with_retry_policy(RetryPolicy::exponential(3));

        let outcomes = fetcher
            .fetch_all(&descriptors(&["https://api/limited"]), None)
            .await;

        assert!(outcomes[0].is_success());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_request_times_out_without_aborting_wave() {
        let requests = descriptors(&["https://api/a", "https://api/slow", "https://api/c"]);
        let observer = RecordingObserver::default();
        let fetcher = BatchFetcher::new(Arc::new(StubTransport::new(0)))
            .with_wave_size(3)
            .with_request_timeout(Duration::from_secs(30));

        let start = tokio::time::Instant::now();
        let outcomes = fetcher.fetch_all(&requests, Some(&observer)).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0], FetchOutcome::Success(json!({ "url": "https://api/a" })));
        assert_eq!(outcomes[1], FetchOutcome::Timeout);
        assert_eq!(outcomes[2], FetchOutcome::Success(json!({ "url": "https://api/c" })));
        assert_eq!(observer.finished.load(Ordering::SeqCst), 3);

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(30), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(120), "elapsed {:?}", elapsed);
    }
}
