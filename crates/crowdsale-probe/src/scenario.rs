//! Scenario pipeline.
//!
//! A scenario is an ordered list of steps (open the wizard, fill step 2,
//! publish, wait for the tier to start, buy, reconcile). Steps run in
//! order; the first failing step halts the rest, which are recorded as
//! never started. Finishing a scenario yields a serializable report.

use crate::reconcile::AssertionResult;
use crate::result::{ProbeError, ProbeResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use tokio::time::Instant;
use tracing::{error, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

/// Lifecycle of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    /// Skipped because an earlier step failed
    NotStarted,
    /// Currently running
    Probing,
    /// Completed successfully
    Satisfied,
    /// A wait ran out of budget
    TimedOut,
    /// Any other failure
    Failed,
}

impl StepState {
    /// Whether the step ended without success
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::TimedOut | Self::Failed)
    }
}

/// Record of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step name
    pub name: String,
    /// Final state
    pub state: StepState,
    /// Time spent in the step
    pub elapsed_ms: u64,
    /// Failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A running scenario
#[derive(Debug)]
pub struct Scenario {
    name: String,
    run_id: Uuid,
    started_at: DateTime<Utc>,
    started: Instant,
    steps: Vec<StepRecord>,
    halted: bool,
    span: Span,
}

impl Scenario {
    /// Start a scenario
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let run_id = Uuid::new_v4();
        let span = info_span!("scenario", name = %name, run_id = %run_id);
        span.in_scope(|| info!("scenario started"));
        Self {
            name,
            run_id,
            started_at: Utc::now(),
            started: Instant::now(),
            steps: Vec::new(),
            halted: false,
            span,
        }
    }

    /// Scenario name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unique id of this run
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Whether a step has failed
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.halted
    }

    /// Steps recorded so far
    #[must_use]
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Run one step.
    ///
    /// When an earlier step failed, `work` is dropped without being polled,
    /// the step is recorded as [`StepState::NotStarted`] and
    /// [`ProbeError::Halted`] is returned.
    pub async fn step<T, Fut>(&mut self, name: impl Into<String>, work: Fut) -> ProbeResult<T>
    where
        Fut: Future<Output = ProbeResult<T>>,
    {
        let name = name.into();
        if self.halted {
            self.steps.push(StepRecord {
                name: name.clone(),
                state: StepState::NotStarted,
                elapsed_ms: 0,
                error: None,
            });
            return Err(ProbeError::Halted { step: name });
        }

        let index = self.steps.len();
        self.steps.push(StepRecord {
            name: name.clone(),
            state: StepState::Probing,
            elapsed_ms: 0,
            error: None,
        });

        let span = info_span!(parent: &self.span, "step", step = %name);
        let start = Instant::now();
        let result = work.instrument(span.clone()).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let record = &mut self.steps[index];
        record.elapsed_ms = elapsed_ms;
        let _entered = span.enter();
        match &result {
            Ok(_) => {
                record.state = StepState::Satisfied;
                info!(elapsed_ms, "step satisfied");
            }
            Err(err) => {
                record.state = if err.is_timeout() {
                    StepState::TimedOut
                } else {
                    StepState::Failed
                };
                record.error = Some(err.to_string());
                self.halted = true;
                error!(elapsed_ms, error = %err, "step failed, halting scenario");
            }
        }
        result
    }

    /// Record a synchronous check as a step
    pub async fn check(&mut self, name: impl Into<String>, result: AssertionResult) -> ProbeResult<()> {
        self.step(name, async move { result.into_result() }).await
    }

    /// Close the scenario
    #[must_use]
    pub fn finish(self) -> ScenarioReport {
        let passed = !self.halted;
        let duration_ms = self.started.elapsed().as_millis() as u64;
        self.span.in_scope(|| {
            if passed {
                info!(duration_ms, steps = self.steps.len(), "scenario passed");
            } else {
                warn!(duration_ms, steps = self.steps.len(), "scenario failed");
            }
        });
        ScenarioReport {
            name: self.name,
            run_id: self.run_id,
            started_at: self.started_at,
            duration_ms,
            passed,
            steps: self.steps,
        }
    }
}

/// Outcome of one scenario run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub name: String,
    /// Unique id of the run
    pub run_id: Uuid,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Total duration
    pub duration_ms: u64,
    /// Whether every step was satisfied
    pub passed: bool,
    /// Steps in execution order
    pub steps: Vec<StepRecord>,
}

impl ScenarioReport {
    /// The step that halted the scenario
    #[must_use]
    pub fn failed_step(&self) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.state.is_failure())
    }

    /// Count steps in a state
    #[must_use]
    pub fn count(&self, state: StepState) -> usize {
        self.steps.iter().filter(|s| s.state == state).count()
    }
}

/// Reports of a whole run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Suite name
    pub name: String,
    /// Scenario reports in run order
    pub scenarios: Vec<ScenarioReport>,
}

impl SuiteReport {
    /// Create an empty suite report
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scenarios: Vec::new(),
        }
    }

    /// Append a scenario report
    pub fn push(&mut self, report: ScenarioReport) {
        self.scenarios.push(report);
    }

    /// Check if all scenarios passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.scenarios.iter().all(|s| s.passed)
    }

    /// Get the number of passed scenarios
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.scenarios.iter().filter(|s| s.passed).count()
    }

    /// Get the number of failed scenarios
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.scenarios.len() - self.passed_count()
    }

    /// Get failed scenarios
    #[must_use]
    pub fn failures(&self) -> Vec<&ScenarioReport> {
        self.scenarios.iter().filter(|s| !s.passed).collect()
    }

    /// Process exit code: 0 when every scenario passed, 1 otherwise
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.all_passed())
    }

    /// Write the report as pretty JSON
    pub fn save_json(&self, path: &Path) -> ProbeResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Read a report written by [`Self::save_json`]
    pub fn load_json(path: &Path) -> ProbeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
