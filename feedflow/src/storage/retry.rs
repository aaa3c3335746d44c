//! Retry policy for storage operations.
//!
//! A [`RetryPolicy`] wraps a single-attempt closure: transient failures are
//! retried after a backoff sleep until the attempt budget is spent, while
//! definitive failures (not-found) return immediately.

use crate::errors::StorageError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::transport::TransportError;

/// How the wait grows across retries of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Doubles on every retry.
    Exponential,
    /// Grows by the base delay on every retry.
    Linear,
    /// Always the base delay.
    #[default]
    Constant,
}

impl BackoffStrategy {
    /// Uncapped wait in milliseconds before retry number `retry` (zero-based).
    #[must_use]
    pub fn delay_ms(self, base_ms: u64, retry: u32) -> u64 {
        match self {
            Self::Constant => base_ms,
            Self::Linear => base_ms.saturating_mul(u64::from(retry) + 1),
            Self::Exponential => 1u64
                .checked_shl(retry)
                .map_or(u64::MAX, |factor| base_ms.saturating_mul(factor)),
        }
    }
}

impl std::str::FromStr for BackoffStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "constant" => Ok(Self::Constant),
            "linear" => Ok(Self::Linear),
            "exponential" => Ok(Self::Exponential),
            other => Err(anyhow::anyhow!("Unsupported backoff strategy '{other}'")),
        }
    }
}

/// Randomization applied to a computed wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// Wait exactly the computed delay.
    #[default]
    None,
    /// Anywhere between zero and the delay.
    Full,
    /// At least half the delay, the rest random.
    Equal,
}

impl JitterStrategy {
    /// Applies the jitter to `delay_ms`. The result never exceeds `delay_ms`.
    pub fn apply<R: Rng + ?Sized>(self, delay_ms: u64, rng: &mut R) -> u64 {
        match self {
            Self::None => delay_ms,
            Self::Full => rng.gen_range(0..=delay_ms),
            Self::Equal => {
                let spread = delay_ms / 2;
                (delay_ms - spread) + rng.gen_range(0..=spread)
            }
        }
    }
}

impl std::str::FromStr for JitterStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "full" => Ok(Self::Full),
            "equal" => Ok(Self::Equal),
            other => Err(anyhow::anyhow!("Unsupported jitter strategy '{other}'")),
        }
    }
}

/// Attempt budget and wait schedule for storage operations.
///
/// The default is five attempts with a constant 400 ms wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per operation, the first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Wait before the first retry, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on any single wait, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// How waits grow.
    #[serde(default)]
    pub backoff_strategy: BackoffStrategy,
    /// How waits are randomized.
    #[serde(default)]
    pub jitter_strategy: JitterStrategy,
}

const fn default_max_attempts() -> usize {
    5
}

const fn default_base_delay_ms() -> u64 {
    400
}

const fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_strategy: BackoffStrategy::default(),
            jitter_strategy: JitterStrategy::default(),
        }
    }
}

impl RetryConfig {
    /// A fixed wait of `delay_ms` between at most `max_attempts` attempts.
    #[must_use]
    pub fn constant(max_attempts: usize, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms: delay_ms,
            ..Self::default()
        }
    }

    /// Switches to `strategy`, capping every wait at `max_delay_ms`.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy, max_delay_ms: u64) -> Self {
        self.backoff_strategy = strategy;
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter_strategy = strategy;
        self
    }

    /// Wait before retry number `retry` (zero-based).
    #[must_use]
    pub fn delay_for(&self, retry: usize) -> Duration {
        self.delay_with(retry, &mut rand::thread_rng())
    }

    /// Like [`delay_for`](Self::delay_for), drawing jitter from `rng`.
    pub fn delay_with<R: Rng + ?Sized>(&self, retry: usize, rng: &mut R) -> Duration {
        let retry = u32::try_from(retry).unwrap_or(u32::MAX);
        let capped = self
            .backoff_strategy
            .delay_ms(self.base_delay_ms, retry)
            .min(self.max_delay_ms);
        Duration::from_millis(self.jitter_strategy.apply(capped, rng))
    }
}

/// Blocks the calling thread between attempts.
pub trait Sleeper: Send + Sync + fmt::Debug {
    /// Sleeps for `duration`.
    fn sleep(&self, duration: Duration);
}

/// A [`Sleeper`] backed by `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Predicate selecting which transport errors are worth retrying.
pub type RetryPredicate = fn(&TransportError) -> bool;

/// Retry policy wrapping single-attempt storage operations.
#[derive(Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
    retry_on: RetryPredicate,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .field("sleeper", &self.sleeper)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Creates a policy that sleeps on the calling thread and retries transient errors.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            sleeper: Arc::new(ThreadSleeper),
            retry_on: TransportError::is_transient,
        }
    }

    /// Replaces the sleeper.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Replaces the retryable-error predicate.
    #[must_use]
    pub fn with_retry_on(mut self, retry_on: RetryPredicate) -> Self {
        self.retry_on = retry_on;
        self
    }

    /// Returns the retry configuration.
    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Returns the sleeper used between attempts.
    #[must_use]
    pub fn sleeper(&self) -> Arc<dyn Sleeper> {
        Arc::clone(&self.sleeper)
    }

    /// Runs `attempt` until it succeeds, fails definitively, or the budget is spent.
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`] for a non-retryable not-found failure,
    /// [`StorageError::Unavailable`] otherwise.
    pub fn run<T, F>(&self, operation: &str, mut attempt: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Result<T, TransportError>,
    {
        let mut failures = 0;

        loop {
            let err = match attempt() {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            failures += 1;

            if !(self.retry_on)(&err) {
                return Err(match err {
                    TransportError::NotFound(key) => StorageError::not_found(key),
                    TransportError::Transient(reason) => {
                        StorageError::unavailable(operation, failures, reason)
                    }
                });
            }

            tracing::error!(operation, attempt = failures, error = %err, "Storage operation failed");
            if failures >= self.config.max_attempts {
                tracing::error!(operation, attempts = failures, "Giving up on storage operation");
                return Err(StorageError::unavailable(operation, failures, err.to_string()));
            }

            let delay = self.config.delay_for(failures - 1);
            tracing::debug!(
                operation,
                attempt = failures,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Retrying after error"
            );
            self.sleeper.sleep(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSleeper;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn recording_policy(max_attempts: usize) -> (RetryPolicy, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::new());
        let policy = RetryPolicy::new(RetryConfig::constant(max_attempts, 400))
            .with_sleeper(sleeper.clone());
        (policy, sleeper)
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay_ms, 400);
        assert_eq!(config.backoff_strategy, BackoffStrategy::Constant);
        assert_eq!(config.jitter_strategy, JitterStrategy::None);
        assert_eq!(config.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn test_retry_config_deserializes_with_defaults() {
        let config: RetryConfig =
            serde_json::from_str(r#"{"max_attempts": 2, "backoff_strategy": "linear"}"#).unwrap();
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.base_delay_ms, 400);
        assert_eq!(config.backoff_strategy, BackoffStrategy::Linear);
    }

    #[test]
    fn test_backoff_growth() {
        assert_eq!(BackoffStrategy::Constant.delay_ms(100, 4), 100);
        assert_eq!(BackoffStrategy::Linear.delay_ms(100, 2), 300);
        assert_eq!(BackoffStrategy::Exponential.delay_ms(100, 0), 100);
        assert_eq!(BackoffStrategy::Exponential.delay_ms(100, 3), 800);
        assert_eq!(BackoffStrategy::Exponential.delay_ms(100, 80), u64::MAX);
    }

    #[test]
    fn test_delay_is_capped() {
        let config = RetryConfig::constant(5, 1000).with_backoff(BackoffStrategy::Exponential, 5000);
        assert_eq!(config.delay_for(1), Duration::from_millis(2000));
        assert_eq!(config.delay_for(10), Duration::from_millis(5000));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            assert!(JitterStrategy::Full.apply(100, &mut rng) <= 100);
            let equal = JitterStrategy::Equal.apply(101, &mut rng);
            assert!((51..=101).contains(&equal));
        }
        assert_eq!(JitterStrategy::Full.apply(0, &mut rng), 0);
        assert_eq!(JitterStrategy::None.apply(250, &mut rng), 250);
    }

    #[test]
    fn test_parse_strategies() {
        assert_eq!("exponential".parse::<BackoffStrategy>().unwrap(), BackoffStrategy::Exponential);
        assert_eq!("equal".parse::<JitterStrategy>().unwrap(), JitterStrategy::Equal);
        assert!("random".parse::<BackoffStrategy>().is_err());
        assert!("some".parse::<JitterStrategy>().is_err());
    }

    #[test]
    fn test_run_sleeps_follow_the_schedule() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let policy = RetryPolicy::new(
            RetryConfig::constant(4, 100).with_backoff(BackoffStrategy::Linear, 250),
        )
        .with_sleeper(sleeper.clone());

        let result: Result<(), _> = policy.run("op", || Err(TransportError::transient("down")));

        assert!(matches!(result, Err(StorageError::Unavailable { attempts: 4, .. })));
        assert_eq!(
            sleeper.recorded(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(250)
            ]
        );
    }

    #[test]
    fn test_run_success_first_try() {
        let (policy, sleeper) = recording_policy(5);
        let mut calls = 0;

        let result = policy.run("op", || {
            calls += 1;
            Ok::<_, TransportError>(42)
        });

        assert_eq!(result, Ok(42));
        assert_eq!(calls, 1);
        assert_eq!(sleeper.count(), 0);
    }

    #[test]
    fn test_run_four_failures_then_success() {
        let (policy, sleeper) = recording_policy(5);
        let mut calls = 0;

        let result = policy.run("op", || {
            calls += 1;
            if calls < 5 {
                Err(TransportError::transient(format!("attempt {calls}")))
            } else {
                Ok("done")
            }
        });

        assert_eq!(result, Ok("done"));
        assert_eq!(calls, 5);
        assert_eq!(sleeper.count(), 4);
        assert!(sleeper.recorded().iter().all(|d| *d == Duration::from_millis(400)));
    }

    #[test]
    fn test_run_exhausts_after_five_attempts() {
        let (policy, sleeper) = recording_policy(5);
        let mut calls = 0;

        let result: Result<(), _> = policy.run("upload_obj", || {
            calls += 1;
            Err(TransportError::transient("reset"))
        });

        assert_eq!(calls, 5);
        assert_eq!(sleeper.count(), 4);
        assert_eq!(
            result,
            Err(StorageError::unavailable("upload_obj", 5, "transient failure: reset"))
        );
    }

    #[test]
    fn test_run_not_found_is_not_retried() {
        let (policy, sleeper) = recording_policy(5);
        let mut calls = 0;

        let result: Result<(), _> = policy.run("head", || {
            calls += 1;
            Err(TransportError::NotFound("a/b".into()))
        });

        assert_eq!(calls, 1);
        assert_eq!(sleeper.count(), 0);
        assert_eq!(result, Err(StorageError::not_found("a/b")));
    }

    #[test]
    fn test_run_custom_predicate_stops_transient_retries() {
        let (policy, sleeper) = recording_policy(5);
        let policy = policy.with_retry_on(|_| false);

        let result: Result<(), _> = policy.run("op", || Err(TransportError::transient("boom")));

        assert_eq!(sleeper.count(), 0);
        assert!(matches!(result, Err(StorageError::Unavailable { attempts: 1, .. })));
    }
}
