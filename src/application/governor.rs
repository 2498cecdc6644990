use crate::domain::errors::ProviderError;
use rand::Rng;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct GovernorConfig {
    /// Calls allowed per key within one rolling window.
    pub rpm_limit: u32,
    pub window: Duration,
    /// Retries after the first attempt; attempts = max_retries + 1.
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Upper bound of the uniform jitter added to each backoff delay.
    pub max_jitter: Duration,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            rpm_limit: 60,
            window: Duration::from_secs(60),
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_jitter: Duration::from_millis(250),
        }
    }
}

/// Rate governor for external provider calls: a per-key sliding window of
/// call timestamps plus exponential-backoff retry for rate-limit-class
/// failures.
///
/// Explicitly constructed and passed by reference to every component that
/// performs external calls; there is no global instance. The window state is
/// behind a mutex that is never held across an await, so a throttled caller
/// suspends cooperatively without stalling unrelated work.
pub struct RateGovernor {
    config: GovernorConfig,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateGovernor {
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a call of `estimated_cost` quota units may proceed now for
    /// `key`. Does not queue; a refused caller must wait and retry itself.
    pub fn acquire_permission(&self, key: &str, estimated_cost: u32) -> bool {
        let mut windows = self
            .windows
            .lock()
            .expect("governor window mutex poisoned - concurrent panic");
        let window = windows.entry(key.to_string()).or_default();

        // checked_sub: the monotonic clock may not reach back a full window
        if let Some(cutoff) = Instant::now().checked_sub(self.config.window) {
            while let Some(&stamp) = window.front() {
                if stamp < cutoff {
                    window.pop_front();
                } else {
                    break;
                }
            }
        }

        if window.len() as u32 + estimated_cost <= self.config.rpm_limit {
            let now = Instant::now();
            for _ in 0..estimated_cost {
                window.push_back(now);
            }
            true
        } else {
            debug!(key, in_window = window.len(), "quota refused");
            false
        }
    }

    /// Run `call` under the quota with bounded exponential-backoff retry.
    ///
    /// Only rate-limit-class failures (and local quota refusals) are retried;
    /// any other provider error propagates immediately. Exhausting the retry
    /// budget yields a terminal `RetriesExhausted`.
    pub async fn execute_with_backoff<T, F, Fut>(
        &self,
        key: &str,
        mut call: F,
    ) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut last: Option<ProviderError> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = self.backoff_delay(attempt - 1);
                debug!(key, attempt, ?delay, "backing off before retry");
                tokio::time::sleep(delay).await;
            }

            if !self.acquire_permission(key, 1) {
                last = Some(ProviderError::RateLimited {
                    key: key.to_string(),
                });
                continue;
            }

            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_rate_limit() => {
                    warn!(key, attempt, "provider rate limited");
                    last = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(ProviderError::RetriesExhausted {
            key: key.to_string(),
            attempts: self.config.max_retries + 1,
            last: last
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempt recorded".to_string()),
        })
    }

    /// Base delay doubling per attempt, plus uniform random jitter.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let doubled = self.config.base_delay.saturating_mul(1u32 << attempt.min(16));
        let jitter_ms = self.config.max_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            doubled
        } else {
            doubled + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        }
    }
}
