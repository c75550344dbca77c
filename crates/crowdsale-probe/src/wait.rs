//! Condition Poller
//!
//! Deadline-bounded polling of asynchronous probes against the browser,
//! the wallet popup or the chain.
//!
//! A probe is any `FnMut() -> impl Future<Output = Result<T, E>>`. An `Err`
//! from the probe is transient: the attempt counts as "no value yet" and the
//! poller keeps going. Only a bad [`PollConfig`] is surfaced as an error.
//!
//! Whether running out of time is a failure depends on the call site, so the
//! poller always returns a [`PollOutcome`] and leaves the polarity to
//! [`PollOutcome::require_present`] / [`PollOutcome::require_absent`].

use crate::result::{ProbeError, ProbeResult};
use async_trait::async_trait;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (30 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;

/// Default polling interval (300ms, the wizard's own re-render cadence)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 300;

// =============================================================================
// POLL CONFIG
// =============================================================================

/// Interval, deadline and label for one wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Sleep between attempts
    pub interval: Duration,
    /// Total budget; zero means a single probe
    pub timeout: Duration,
    /// What is being waited for, used in logs and errors
    pub description: Option<String>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            timeout: Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS),
            description: None,
        }
    }
}

impl PollConfig {
    /// Create a config from an interval and a timeout
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            description: None,
        }
    }

    /// Create a config from millisecond values
    #[must_use]
    pub const fn from_millis(interval_ms: u64, timeout_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(interval_ms),
            Duration::from_millis(timeout_ms),
        )
    }

    /// Probe exactly once ("is it there right now?")
    #[must_use]
    pub fn once() -> Self {
        Self::default().with_timeout(Duration::ZERO)
    }

    /// Wait up to `secs` seconds with the default interval
    #[must_use]
    pub fn seconds(secs: u64) -> Self {
        Self::default().with_timeout(Duration::from_secs(secs))
    }

    /// Set the timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the polling interval
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Reject configurations the poller cannot honour
    pub fn validate(&self) -> ProbeResult<()> {
        if self.interval.is_zero() {
            return Err(ProbeError::invalid_config(format!(
                "poll interval must be positive (waiting for {})",
                self.what()
            )));
        }
        Ok(())
    }

    /// Label for logs
    #[must_use]
    pub fn what(&self) -> &str {
        self.description.as_deref().unwrap_or("condition")
    }
}

// =============================================================================
// POLL OUTCOME
// =============================================================================

/// Result of one wait
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome<T> {
    /// Whether the predicate held before the deadline
    pub satisfied: bool,
    /// Matching value on success, otherwise the last value the probe produced
    pub last_value: Option<T>,
    /// Wall-clock time spent
    pub elapsed: Duration,
    /// Probe invocations
    pub attempts: u32,
    /// Invocations that returned an error
    pub errors: u32,
    /// Message of the most recent probe error
    pub last_error: Option<String>,
}

impl<T> PollOutcome<T> {
    const fn started() -> Self {
        Self {
            satisfied: false,
            last_value: None,
            elapsed: Duration::ZERO,
            attempts: 0,
            errors: 0,
            last_error: None,
        }
    }

    /// The deadline passed without the predicate holding
    #[must_use]
    pub const fn timed_out(&self) -> bool {
        !self.satisfied
    }

    /// Positive polarity: the condition had to show up.
    ///
    /// Returns the matching value, or [`ProbeError::Timeout`].
    pub fn require_present(self, what: impl Into<String>) -> ProbeResult<T> {
        match (self.satisfied, self.last_value) {
            (true, Some(value)) => Ok(value),
            _ => Err(ProbeError::Timeout {
                what: what.into(),
                ms: self.elapsed.as_millis() as u64,
                attempts: self.attempts,
            }),
        }
    }

    /// Negative polarity: the condition had to stay away for the whole window.
    pub fn require_absent(self, what: impl Into<String>) -> ProbeResult<()> {
        if self.satisfied {
            Err(ProbeError::UnexpectedPresence { what: what.into() })
        } else {
            Ok(())
        }
    }

    /// Map the carried value
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PollOutcome<U> {
        PollOutcome {
            satisfied: self.satisfied,
            last_value: self.last_value.map(f),
            elapsed: self.elapsed,
            attempts: self.attempts,
            errors: self.errors,
            last_error: self.last_error,
        }
    }
}

// =============================================================================
// POLLER
// =============================================================================

/// Drive `probe` until `predicate` holds or `config.timeout` elapses.
///
/// The probe runs immediately, then after every `interval`. The last sleep
/// is clamped to the remaining budget, so the final attempt lands on the
/// deadline. A probe that is still running at the deadline is awaited; its
/// value is recorded but the poller returns right after.
pub async fn poll_until<T, E, F, Fut, P>(
    mut probe: F,
    predicate: P,
    config: &PollConfig,
) -> ProbeResult<PollOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&T) -> bool,
{
    config.validate()?;

    let start = Instant::now();
    // an unrepresentable deadline means the wait never expires
    let deadline = start.checked_add(config.timeout);
    let mut outcome = PollOutcome::started();

    loop {
        outcome.attempts += 1;
        match probe().await {
            Ok(value) => {
                let hit = predicate(&value);
                trace!(what = config.what(), attempt = outcome.attempts, hit, "probe");
                outcome.last_value = Some(value);
                if hit {
                    outcome.satisfied = true;
                    outcome.elapsed = start.elapsed();
                    debug!(
                        what = config.what(),
                        attempts = outcome.attempts,
                        elapsed_ms = outcome.elapsed.as_millis() as u64,
                        "condition satisfied"
                    );
                    return Ok(outcome);
                }
            }
            Err(err) => {
                outcome.errors += 1;
                trace!(what = config.what(), attempt = outcome.attempts, error = %err, "probe failed");
                outcome.last_error = Some(err.to_string());
            }
        }

        let pause = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                config.interval.min(deadline - now)
            }
            None => config.interval,
        };
        sleep(pause).await;
    }

    outcome.elapsed = start.elapsed();
    debug!(
        what = config.what(),
        attempts = outcome.attempts,
        errors = outcome.errors,
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        "wait timed out"
    );
    Ok(outcome)
}

/// Confirm a condition never holds during the window.
///
/// Returns `true` when the whole budget ran out without the predicate
/// holding, `false` as soon as it holds once.
pub async fn poll_for_absence<T, E, F, Fut, P>(
    probe: F,
    predicate: P,
    config: &PollConfig,
) -> ProbeResult<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&T) -> bool,
{
    let outcome = poll_until(probe, predicate, config).await?;
    Ok(outcome.timed_out())
}

/// Wait for a unix timestamp, re-read on every attempt, to lie in the past.
///
/// Tier start and end times are read back from the chain, so the probe is
/// re-evaluated each time rather than sampled once.
pub async fn wait_until_passed<E, F, Fut>(
    probe: F,
    config: &PollConfig,
) -> ProbeResult<PollOutcome<i64>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<i64, E>>,
    E: Display,
{
    wait_until_passed_with(probe, || chrono::Utc::now().timestamp(), config).await
}

/// [`wait_until_passed`] with an injectable clock
pub async fn wait_until_passed_with<E, F, Fut, N>(
    probe: F,
    now: N,
    config: &PollConfig,
) -> ProbeResult<PollOutcome<i64>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<i64, E>>,
    E: Display,
    N: Fn() -> i64,
{
    poll_until(probe, |ts: &i64| now() > *ts, config).await
}

// =============================================================================
// PROBE TRAIT
// =============================================================================

/// A named, reusable probe.
///
/// Closures cover most call sites; implement this for probes that carry
/// their own description, such as the session-bound element probes.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Snapshot type
    type Output: Send;

    /// Read the external state once
    async fn sample(&self) -> Result<Self::Output, ProbeError>;

    /// Description for logs and timeout errors
    fn description(&self) -> String;
}

/// Polling front-end carrying a [`PollConfig`]
#[derive(Debug, Clone, Default)]
pub struct Poller {
    config: PollConfig,
}

impl Poller {
    /// Create a poller
    #[must_use]
    pub const fn new(config: PollConfig) -> Self {
        Self { config }
    }

    /// Get the config
    #[must_use]
    pub const fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Poll a closure probe
    pub async fn until<T, E, F, Fut, P>(&self, probe: F, predicate: P) -> ProbeResult<PollOutcome<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: Fn(&T) -> bool,
    {
        poll_until(probe, predicate, &self.config).await
    }

    /// Poll a boolean probe until it reports `true`
    pub async fn until_true<E, F, Fut>(&self, probe: F) -> ProbeResult<PollOutcome<bool>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
        E: Display,
    {
        poll_until(probe, |v: &bool| *v, &self.config).await
    }

    /// Poll a [`Probe`], labelling the wait with its description
    pub async fn watch<P, Pred>(
        &self,
        probe: &P,
        predicate: Pred,
    ) -> ProbeResult<PollOutcome<P::Output>>
    where
        P: Probe + ?Sized,
        Pred: Fn(&P::Output) -> bool,
    {
        let config = self.config.clone().with_description(probe.description());
        poll_until(|| probe.sample(), predicate, &config).await
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Probe that replays a script, repeating the last entry forever
    fn scripted(values: Vec<Result<bool, &'static str>>) -> impl FnMut() -> std::future::Ready<Result<bool, &'static str>> {
        let mut idx = 0;
        move || {
            let v = values[idx.min(values.len() - 1)];
            idx += 1;
            std::future::ready(v)
        }
    }

    mod poll_config_tests {
        use super::*;

        #[test]
        fn test_default() {
            let config = PollConfig::default();
            assert_eq!(config.interval, Duration::from_millis(DEFAULT_POLL_INTERVAL_MS));
            assert_eq!(config.timeout, Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS));
            assert_eq!(config.what(), "condition");
        }

        #[test]
        fn test_once_has_zero_timeout() {
            assert!(PollConfig::once().timeout.is_zero());
        }

        #[test]
        fn test_zero_interval_rejected() {
            let err = PollConfig::from_millis(0, 100).validate().unwrap_err();
            assert!(matches!(err, ProbeError::InvalidConfig { .. }));
        }

        #[test]
        fn test_chained() {
            let config = PollConfig::seconds(180)
                .with_interval(Duration::from_secs(1))
                .with_description("tier 1 start");
            assert_eq!(config.timeout, Duration::from_secs(180));
            assert_eq!(config.interval, Duration::from_secs(1));
            assert_eq!(config.what(), "tier 1 start");
        }
    }

    mod poll_until_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_unbounded_timeout_does_not_overflow() {
            let config = PollConfig::new(Duration::from_millis(50), Duration::MAX);
            let outcome = poll_until(scripted(vec![Ok(false), Ok(false), Ok(true)]), |v| *v, &config)
                .await
                .unwrap();
            assert!(outcome.satisfied);
            assert_eq!(outcome.attempts, 3);
        }

        #[tokio::test(start_paused = true)]
        async fn test_satisfied_on_third_attempt() {
            let config = PollConfig::from_millis(100, 1000);
            let outcome = poll_until(scripted(vec![Ok(false), Ok(false), Ok(true)]), |v| *v, &config)
                .await
                .unwrap();
            assert!(outcome.satisfied);
            assert_eq!(outcome.attempts, 3);
            assert_eq!(outcome.last_value, Some(true));
            assert_eq!(outcome.elapsed, Duration::from_millis(200));
        }

        #[tokio::test(start_paused = true)]
        async fn test_returns_first_matching_value() {
            let counter = AtomicU32::new(0);
            let config = PollConfig::from_millis(10, 1000);
            let outcome = poll_until(
                || {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    async move { Ok::<_, String>(n) }
                },
                |n| *n >= 4,
                &config,
            )
            .await
            .unwrap();
            assert!(outcome.satisfied);
            assert_eq!(outcome.last_value, Some(4));
            assert_eq!(outcome.attempts, 5);
        }

        #[tokio::test(start_paused = true)]
        async fn test_always_erroring_probe_times_out() {
            let config = PollConfig::from_millis(100, 300);
            let outcome = poll_until(scripted(vec![Err("no element")]), |v| *v, &config)
                .await
                .unwrap();
            assert!(!outcome.satisfied);
            assert_eq!(outcome.last_value, None);
            assert!((3..=4).contains(&outcome.attempts));
            assert_eq!(outcome.errors, outcome.attempts);
            assert_eq!(outcome.last_error.as_deref(), Some("no element"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_never_matching_probe_bounded_by_timeout_plus_interval() {
            let config = PollConfig::from_millis(70, 500);
            let outcome = poll_until(scripted(vec![Ok(false)]), |v| *v, &config)
                .await
                .unwrap();
            assert!(!outcome.satisfied);
            assert!(outcome.elapsed >= config.timeout);
            assert!(outcome.elapsed <= config.timeout + config.interval);
            assert_eq!(outcome.last_value, Some(false));
        }

        #[tokio::test(start_paused = true)]
        async fn test_zero_timeout_probes_once() {
            let calls = AtomicU32::new(0);
            let outcome = poll_until(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, String>(false) }
                },
                |v| *v,
                &PollConfig::once(),
            )
            .await
            .unwrap();
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert_eq!(outcome.attempts, 1);
            assert!(!outcome.satisfied);
        }

        #[tokio::test(start_paused = true)]
        async fn test_value_after_error_is_kept() {
            let config = PollConfig::from_millis(10, 25);
            let outcome = poll_until(
                scripted(vec![Ok(false), Err("stale element")]),
                |v| *v,
                &config,
            )
            .await
            .unwrap();
            assert_eq!(outcome.last_value, Some(false));
            assert!(outcome.errors >= 1);
        }

        #[tokio::test]
        async fn test_invalid_interval_fails_before_probing() {
            let calls = AtomicU32::new(0);
            let result = poll_until(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, String>(true) }
                },
                |v| *v,
                &PollConfig::from_millis(0, 100),
            )
            .await;
            assert!(result.is_err());
            assert_eq!(calls.load(Ordering::SeqCst), 0);
        }
    }

    mod polarity_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_require_present_ok() {
            let outcome = poll_until(scripted(vec![Ok(true)]), |v| *v, &PollConfig::once())
                .await
                .unwrap();
            assert!(outcome.require_present("alert").unwrap());
        }

        #[tokio::test(start_paused = true)]
        async fn test_require_present_timeout() {
            let config = PollConfig::from_millis(50, 200);
            let outcome = poll_until(scripted(vec![Ok(false)]), |v| *v, &config)
                .await
                .unwrap();
            let err = outcome.require_present("wallet popup").unwrap_err();
            match err {
                ProbeError::Timeout { what, ms, attempts } => {
                    assert_eq!(what, "wallet popup");
                    assert_eq!(ms, 200);
                    assert_eq!(attempts, 5);
                }
                other => panic!("expected Timeout, got {other:?}"),
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_require_absent() {
            let config = PollConfig::from_millis(50, 150);
            let absent = poll_until(scripted(vec![Ok(false)]), |v| *v, &config)
                .await
                .unwrap();
            assert!(absent.require_absent("warning").is_ok());

            let present = poll_until(scripted(vec![Ok(false), Ok(true)]), |v| *v, &config)
                .await
                .unwrap();
            assert!(matches!(
                present.require_absent("warning"),
                Err(ProbeError::UnexpectedPresence { .. })
            ));
        }

        #[tokio::test(start_paused = true)]
        async fn test_poll_for_absence_spends_whole_window() {
            let start = Instant::now();
            let config = PollConfig::from_millis(100, 3000);
            let absent = poll_for_absence(scripted(vec![Ok(false)]), |v| *v, &config)
                .await
                .unwrap();
            assert!(absent);
            assert_eq!(start.elapsed(), Duration::from_millis(3000));
        }

        #[tokio::test(start_paused = true)]
        async fn test_poll_for_absence_stops_on_first_sighting() {
            let config = PollConfig::from_millis(100, 3000);
            let absent = poll_for_absence(scripted(vec![Ok(false), Ok(true)]), |v| *v, &config)
                .await
                .unwrap();
            assert!(!absent);
        }

        #[test]
        fn test_map_keeps_counters() {
            let outcome = PollOutcome {
                satisfied: true,
                last_value: Some("1000 TICK".to_string()),
                elapsed: Duration::from_millis(5),
                attempts: 2,
                errors: 1,
                last_error: Some("stale".into()),
            };
            let mapped = outcome.map(|s| s.len());
            assert_eq!(mapped.last_value, Some(9));
            assert_eq!(mapped.attempts, 2);
            assert_eq!(mapped.errors, 1);
        }
    }

    mod schedule_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_wait_until_passed_with_advancing_clock() {
            let now = Mutex::new(1_000_i64);
            let config = PollConfig::from_millis(1000, 180_000);
            let outcome = wait_until_passed_with(
                || async { Ok::<_, String>(1_003) },
                || {
                    let mut t = now.lock().unwrap();
                    *t += 1;
                    *t
                },
                &config,
            )
            .await
            .unwrap();
            assert!(outcome.satisfied);
            assert_eq!(outcome.attempts, 4);
        }

        #[tokio::test(start_paused = true)]
        async fn test_wait_until_passed_past_timestamp() {
            let outcome = wait_until_passed(|| async { Ok::<_, String>(0) }, &PollConfig::once())
                .await
                .unwrap();
            assert!(outcome.satisfied);
        }

        #[tokio::test(start_paused = true)]
        async fn test_wait_until_passed_far_future_times_out() {
            let config = PollConfig::from_millis(100, 500);
            let outcome = wait_until_passed(|| async { Ok::<_, String>(i64::MAX) }, &config)
                .await
                .unwrap();
            assert!(outcome.timed_out());
            assert_eq!(outcome.last_value, Some(i64::MAX));
        }
    }

    mod poller_tests {
        use super::*;

        struct Flag {
            reads: AtomicU32,
            flips_after: u32,
        }

        #[async_trait]
        impl Probe for Flag {
            type Output = bool;

            async fn sample(&self) -> Result<bool, ProbeError> {
                let n = self.reads.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    return Err(ProbeError::driver("page still loading"));
                }
                Ok(n >= self.flips_after)
            }

            fn description(&self) -> String {
                "flag".into()
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_watch_probe_trait() {
            let flag = Flag {
                reads: AtomicU32::new(0),
                flips_after: 3,
            };
            let poller = Poller::new(PollConfig::from_millis(50, 1000));
            let outcome = poller.watch(&flag, |v| *v).await.unwrap();
            assert!(outcome.satisfied);
            assert_eq!(outcome.attempts, 4);
            assert_eq!(outcome.errors, 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_until_true() {
            let poller = Poller::new(PollConfig::from_millis(50, 1000));
            let outcome = poller
                .until_true(scripted(vec![Ok(false), Ok(true)]))
                .await
                .unwrap();
            assert!(outcome.satisfied);
            assert_eq!(outcome.attempts, 2);
        }

        #[test]
        fn test_default_poller_config() {
            assert_eq!(Poller::default().config(), &PollConfig::default());
        }
    }
}
