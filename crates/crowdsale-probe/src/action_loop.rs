//! Retry-Bounded Action Loop
//!
//! Re-issues a UI action (typically "click Continue") until a downstream
//! condition shows the action took effect, bounded by an attempt count
//! rather than wall-clock time.
//!
//! Each iteration sleeps, checks `is_done`, and only then, if the action's
//! precondition still holds, performs the action once. An action is never
//! issued in an iteration where `is_done` already held, which keeps a
//! second transaction from being signed.

use crate::result::{ProbeError, ProbeResult};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, trace, warn};

/// Default attempt ceiling for wizard navigation loops
pub const DEFAULT_MAX_ATTEMPTS: u32 = 200;

/// Default delay before each attempt
pub const DEFAULT_ATTEMPT_DELAY_MS: u64 = 300;

/// Configuration for an action loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Iteration ceiling
    pub max_attempts: u32,
    /// Sleep at the start of every iteration
    pub delay: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::from_millis(DEFAULT_ATTEMPT_DELAY_MS),
        }
    }
}

impl LoopConfig {
    /// Create a loop config
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Reject a zero ceiling
    pub fn validate(&self) -> ProbeResult<()> {
        if self.max_attempts == 0 {
            return Err(ProbeError::invalid_config(
                "action loop needs at least one attempt",
            ));
        }
        Ok(())
    }
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopExit {
    /// `is_done` held
    Done,
    /// Neither `is_done` nor the precondition held
    PreconditionLost,
    /// Ran out of attempts
    Exhausted,
}

/// What happened inside one loop run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopOutcome {
    /// Whether the downstream condition holds at exit
    pub done: bool,
    /// Exit reason
    pub exit: LoopExit,
    /// Iterations started
    pub iterations: u32,
    /// Actions issued
    pub actions: u32,
    /// Actions that returned `false` or an error
    pub action_failures: u32,
    /// Result of the most recent action, if any ran
    pub last_action_result: Option<bool>,
}

/// Resolve a boolean probe, treating errors as `false`
async fn holds<E, F, Fut>(probe: &mut F, label: &str, what: &str) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: Display,
{
    match probe().await {
        Ok(v) => v,
        Err(err) => {
            trace!(what, probe = label, error = %err, "probe failed, treating as false");
            false
        }
    }
}

/// Action loop with a description for logging
#[derive(Debug, Clone, Default)]
pub struct ActionLoop {
    config: LoopConfig,
    description: Option<String>,
}

impl ActionLoop {
    /// Create a loop
    #[must_use]
    pub const fn new(config: LoopConfig) -> Self {
        Self {
            config,
            description: None,
        }
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Get the config
    #[must_use]
    pub const fn config(&self) -> &LoopConfig {
        &self.config
    }

    fn what(&self) -> &str {
        self.description.as_deref().unwrap_or("action loop")
    }

    /// Run the loop.
    ///
    /// `precondition` answers "can the action still be performed?" (the
    /// button is still on screen); `is_done` answers "did it take effect?"
    /// (the next page's field is visible). When the precondition is lost or
    /// the ceiling is reached, `is_done` is evaluated once more so an
    /// already-completed transition reads as `done`.
    pub async fn run<A, AFut, AE, C, CFut, CE, D, DFut, DE>(
        &self,
        mut action: A,
        mut precondition: C,
        mut is_done: D,
    ) -> ProbeResult<LoopOutcome>
    where
        A: FnMut() -> AFut,
        AFut: Future<Output = Result<bool, AE>>,
        AE: Display,
        C: FnMut() -> CFut,
        CFut: Future<Output = Result<bool, CE>>,
        CE: Display,
        D: FnMut() -> DFut,
        DFut: Future<Output = Result<bool, DE>>,
        DE: Display,
    {
        self.config.validate()?;
        let what = self.what();

        let mut outcome = LoopOutcome {
            done: false,
            exit: LoopExit::Exhausted,
            iterations: 0,
            actions: 0,
            action_failures: 0,
            last_action_result: None,
        };
        let mut remaining = self.config.max_attempts;

        while remaining > 0 {
            remaining -= 1;
            outcome.iterations += 1;
            sleep(self.config.delay).await;

            if holds(&mut is_done, "is_done", what).await {
                outcome.done = true;
                outcome.exit = LoopExit::Done;
                debug!(what, iterations = outcome.iterations, actions = outcome.actions, "action took effect");
                return Ok(outcome);
            }

            if !holds(&mut precondition, "precondition", what).await {
                outcome.done = holds(&mut is_done, "is_done", what).await;
                outcome.exit = LoopExit::PreconditionLost;
                debug!(what, done = outcome.done, iterations = outcome.iterations, "precondition lost");
                return Ok(outcome);
            }

            outcome.actions += 1;
            match action().await {
                Ok(true) => outcome.last_action_result = Some(true),
                Ok(false) => {
                    outcome.action_failures += 1;
                    outcome.last_action_result = Some(false);
                    warn!(what, iteration = outcome.iterations, "action reported failure");
                }
                Err(err) => {
                    outcome.action_failures += 1;
                    outcome.last_action_result = Some(false);
                    warn!(what, iteration = outcome.iterations, error = %err, "action failed");
                }
            }
        }

        outcome.done = holds(&mut is_done, "is_done", what).await;
        if outcome.done {
            debug!(what, actions = outcome.actions, "last attempt took effect");
        } else {
            warn!(what, attempts = self.config.max_attempts, actions = outcome.actions, "action loop exhausted");
        }
        Ok(outcome)
    }
}

/// Repeat `action` until `is_done` holds, at most `max_attempts` times.
///
/// The precondition is taken to always hold. Returns `false` when the
/// ceiling is reached and `is_done` still fails its final check.
pub async fn retry_action<A, AFut, AE, D, DFut, DE>(
    action: A,
    is_done: D,
    max_attempts: u32,
    delay: Duration,
) -> ProbeResult<bool>
where
    A: FnMut() -> AFut,
    AFut: Future<Output = Result<bool, AE>>,
    AE: Display,
    D: FnMut() -> DFut,
    DFut: Future<Output = Result<bool, DE>>,
    DE: Display,
{
    let outcome = ActionLoop::new(LoopConfig::new(max_attempts, delay))
        .run(action, || async { Ok::<_, ProbeError>(true) }, is_done)
        .await?;
    Ok(outcome.done)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    mod loop_config {
        use super::*;

        #[test]
        fn test_default_matches_wizard_cadence() {
            let config = LoopConfig::default();
            assert_eq!(config.max_attempts, 200);
            assert_eq!(config.delay, Duration::from_millis(300));
        }

        #[test]
        fn test_zero_attempts_rejected() {
            assert!(LoopConfig::new(0, Duration::ZERO).validate().is_err());
        }
    }

    mod retry_action_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_done_on_second_check_acts_once() {
            let checks = AtomicU32::new(0);
            let actions = AtomicU32::new(0);
            let done = retry_action(
                || {
                    actions.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, String>(true) }
                },
                || {
                    let n = checks.fetch_add(1, Ordering::SeqCst) + 1;
                    async move { Ok::<_, String>(n >= 2) }
                },
                5,
                Duration::from_millis(300),
            )
            .await
            .unwrap();
            assert!(done);
            assert_eq!(actions.load(Ordering::SeqCst), 1);
            assert_eq!(checks.load(Ordering::SeqCst), 2);
        }

        #[tokio::test(start_paused = true)]
        async fn test_exhausted_returns_false() {
            let actions = AtomicU32::new(0);
            let done = retry_action(
                || {
                    actions.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, String>(true) }
                },
                || async { Ok::<_, String>(false) },
                4,
                Duration::from_millis(10),
            )
            .await
            .unwrap();
            assert!(!done);
            assert_eq!(actions.load(Ordering::SeqCst), 4);
        }

        #[tokio::test(start_paused = true)]
        async fn test_effective_last_action_counts_as_done() {
            let advanced = AtomicBool::new(false);
            let done = retry_action(
                || {
                    advanced.store(true, Ordering::SeqCst);
                    async { Ok::<_, String>(true) }
                },
                || {
                    let now = advanced.load(Ordering::SeqCst);
                    async move { Ok::<_, String>(now) }
                },
                1,
                Duration::from_millis(10),
            )
            .await
            .unwrap();
            assert!(done);
        }

        #[tokio::test(start_paused = true)]
        async fn test_already_done_never_acts() {
            let actions = AtomicU32::new(0);
            let done = retry_action(
                || {
                    actions.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, String>(true) }
                },
                || async { Ok::<_, String>(true) },
                3,
                Duration::from_millis(10),
            )
            .await
            .unwrap();
            assert!(done);
            assert_eq!(actions.load(Ordering::SeqCst), 0);
        }
    }

    mod action_loop_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_never_acts_after_done_observed() {
            let became_done = AtomicBool::new(false);
            let acted_after_done = AtomicBool::new(false);
            let checks = AtomicU32::new(0);

            let outcome = ActionLoop::new(LoopConfig::new(10, Duration::from_millis(5)))
                .run(
                    || {
                        if became_done.load(Ordering::SeqCst) {
                            acted_after_done.store(true, Ordering::SeqCst);
                        }
                        async { Ok::<_, String>(true) }
                    },
                    || async { Ok::<_, String>(true) },
                    || {
                        let n = checks.fetch_add(1, Ordering::SeqCst);
                        let done = n >= 3;
                        if done {
                            became_done.store(true, Ordering::SeqCst);
                        }
                        async move { Ok::<_, String>(done) }
                    },
                )
                .await
                .unwrap();

            assert_eq!(outcome.exit, LoopExit::Done);
            assert_eq!(outcome.iterations, 4);
            assert_eq!(outcome.actions, 3);
            assert!(outcome.actions <= outcome.iterations);
            assert!(!acted_after_done.load(Ordering::SeqCst));
        }

        #[tokio::test(start_paused = true)]
        async fn test_precondition_lost_rechecks_done() {
            let checks = AtomicU32::new(0);
            let outcome = ActionLoop::new(LoopConfig::new(10, Duration::from_millis(5)))
                .with_description("step 1 continue")
                .run(
                    || async { Ok::<_, String>(true) },
                    || async { Ok::<_, String>(false) },
                    || {
                        // false on the in-loop check, true on the recheck
                        let n = checks.fetch_add(1, Ordering::SeqCst);
                        async move { Ok::<_, String>(n >= 1) }
                    },
                )
                .await
                .unwrap();
            assert_eq!(outcome.exit, LoopExit::PreconditionLost);
            assert!(outcome.done);
            assert_eq!(outcome.actions, 0);
        }

        #[tokio::test(start_paused = true)]
        async fn test_precondition_lost_not_done() {
            let outcome = ActionLoop::default()
                .run(
                    || async { Ok::<_, String>(true) },
                    || async { Err::<bool, _>("button detached") },
                    || async { Ok::<_, String>(false) },
                )
                .await
                .unwrap();
            assert_eq!(outcome.exit, LoopExit::PreconditionLost);
            assert!(!outcome.done);
            assert_eq!(outcome.iterations, 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_failed_actions_are_counted_and_retried() {
            let calls = AtomicU32::new(0);
            let checks = AtomicU32::new(0);
            let outcome = ActionLoop::new(LoopConfig::new(10, Duration::from_millis(5)))
                .run(
                    || {
                        let n = calls.fetch_add(1, Ordering::SeqCst);
                        async move {
                            match n {
                                0 => Err("element not interactable".to_string()),
                                1 => Ok(false),
                                _ => Ok(true),
                            }
                        }
                    },
                    || async { Ok::<_, String>(true) },
                    || {
                        let n = checks.fetch_add(1, Ordering::SeqCst);
                        async move { Ok::<_, String>(n >= 3) }
                    },
                )
                .await
                .unwrap();
            assert!(outcome.done);
            assert_eq!(outcome.actions, 3);
            assert_eq!(outcome.action_failures, 2);
            assert_eq!(outcome.last_action_result, Some(true));
        }

        #[tokio::test(start_paused = true)]
        async fn test_iterations_never_exceed_ceiling() {
            let outcome = ActionLoop::new(LoopConfig::new(7, Duration::from_millis(1)))
                .run(
                    || async { Ok::<_, String>(false) },
                    || async { Ok::<_, String>(true) },
                    || async { Ok::<_, String>(false) },
                )
                .await
                .unwrap();
            assert_eq!(outcome.exit, LoopExit::Exhausted);
            assert!(!outcome.done);
            assert_eq!(outcome.iterations, 7);
            assert_eq!(outcome.actions, 7);
            assert_eq!(outcome.action_failures, 7);
        }

        #[tokio::test(start_paused = true)]
        async fn test_exhausted_keeps_exit_but_rechecks_done() {
            let actions = AtomicU32::new(0);
            let outcome = ActionLoop::new(LoopConfig::new(3, Duration::from_millis(5)))
                .run(
                    || {
                        actions.fetch_add(1, Ordering::SeqCst);
                        async { Ok::<_, String>(true) }
                    },
                    || async { Ok::<_, String>(true) },
                    || {
                        let n = actions.load(Ordering::SeqCst);
                        async move { Ok::<_, String>(n >= 3) }
                    },
                )
                .await
                .unwrap();
            assert_eq!(outcome.exit, LoopExit::Exhausted);
            assert!(outcome.done);
            assert_eq!(outcome.actions, 3);
        }

        #[tokio::test]
        async fn test_invalid_config_propagates() {
            let result = ActionLoop::new(LoopConfig::new(0, Duration::ZERO))
                .run(
                    || async { Ok::<_, String>(true) },
                    || async { Ok::<_, String>(true) },
                    || async { Ok::<_, String>(true) },
                )
                .await;
            assert!(matches!(result, Err(ProbeError::InvalidConfig { .. })));
        }
    }
}
