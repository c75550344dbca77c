//! Output formatting and progress reporting

use console::{style, Term};
use crowdsale_probe::{ScenarioReport, StepState, SuiteReport};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

/// Terminal reporter for check results
#[derive(Debug)]
pub struct Reporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(false, false)
    }
}

impl Reporter {
    /// Create a reporter writing to stdout
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stdout(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    /// Start a progress bar over `total` items (stderr, hidden when quiet)
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet || total < 2 {
            return;
        }
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// Advance the progress bar
    pub fn increment(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc(1);
        }
    }

    /// Remove the progress bar
    pub fn finish(&mut self) {
        if let Some(pb) = self.progress_bar.take() {
            pb.finish_and_clear();
        }
    }

    fn line(&self, text: &str) {
        match self.progress_bar {
            Some(ref pb) => pb.suspend(|| {
                let _ = self.term.write_line(text);
            }),
            None => {
                let _ = self.term.write_line(text);
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("✓ PASS").green().bold().to_string()
        } else {
            "PASS".to_string()
        };
        self.line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = if self.use_color {
            style("✗ FAIL").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };
        self.line(&format!("{prefix} {message}"));
    }

    /// Print a plain line
    pub fn info(&self, message: &str) {
        if !self.quiet {
            self.line(message);
        }
    }

    /// Print raw output regardless of quiet mode (YAML, JSON)
    pub fn raw(&self, text: &str) {
        let _ = self.term.write_str(text);
        if !text.ends_with('\n') {
            let _ = self.term.write_line("");
        }
    }
}

/// Machine-readable suite summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteSummary {
    /// Suite name
    pub name: String,
    /// Scenarios run
    pub total: usize,
    /// Scenarios passed
    pub passed: usize,
    /// Scenarios failed
    pub failed: usize,
    /// First failing step of each failed scenario
    pub failures: Vec<FailureSummary>,
}

/// One failed scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureSummary {
    /// Scenario name
    pub scenario: String,
    /// Step that halted it
    pub step: Option<String>,
    /// Final state of that step
    pub state: Option<StepState>,
    /// Error message
    pub error: Option<String>,
}

impl From<&SuiteReport> for SuiteSummary {
    fn from(suite: &SuiteReport) -> Self {
        Self {
            name: suite.name.clone(),
            total: suite.scenarios.len(),
            passed: suite.passed_count(),
            failed: suite.failed_count(),
            failures: suite
                .failures()
                .into_iter()
                .map(|s| {
                    let step = s.failed_step();
                    FailureSummary {
                        scenario: s.name.clone(),
                        step: step.map(|st| st.name.clone()),
                        state: step.map(|st| st.state),
                        error: step.and_then(|st| st.error.clone()),
                    }
                })
                .collect(),
        }
    }
}

fn state_label(state: StepState) -> &'static str {
    match state {
        StepState::NotStarted => "not started",
        StepState::Probing => "probing",
        StepState::Satisfied => "ok",
        StepState::TimedOut => "timed out",
        StepState::Failed => "failed",
    }
}

/// Text lines for one scenario; step detail only when `verbose`
#[must_use]
pub fn render_scenario(report: &ScenarioReport, verbose: bool) -> Vec<String> {
    let mut lines = vec![format!(
        "{} ({} steps, {} ms)",
        report.name,
        report.steps.len(),
        report.duration_ms
    )];
    for step in &report.steps {
        if verbose || step.state.is_failure() {
            let mut line = format!(
                "    {:<12} {} ({} ms)",
                state_label(step.state),
                step.name,
                step.elapsed_ms
            );
            if let Some(ref err) = step.error {
                line.push_str(&format!(": {err}"));
            }
            lines.push(line);
        }
    }
    lines
}

/// Closing tally line
#[must_use]
pub fn render_totals(suite: &SuiteReport) -> String {
    format!(
        "{}: {} passed, {} failed, {} total",
        suite.name,
        suite.passed_count(),
        suite.failed_count(),
        suite.scenarios.len()
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crowdsale_probe::StepRecord;

    fn step(name: &str, state: StepState, error: Option<&str>) -> StepRecord {
        StepRecord {
            name: name.into(),
            state,
            elapsed_ms: 5,
            error: error.map(String::from),
        }
    }

    fn failed_report() -> ScenarioReport {
        let json = serde_json::json!({
            "name": "dutch",
            "run_id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "started_at": "2018-05-21T13:30:00Z",
            "duration_ms": 15,
            "passed": false,
            "steps": [
                step("publish", StepState::Satisfied, None),
                step("buy", StepState::Failed, Some("Assertion failed: balance off")),
                step("finalize", StepState::NotStarted, None),
            ],
        });
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_summary_lists_failed_step() {
        let mut suite = SuiteReport::new("e2e");
        suite.push(failed_report());
        let summary = SuiteSummary::from(&suite);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].step.as_deref(), Some("buy"));
        assert_eq!(summary.failures[0].state, Some(StepState::Failed));
    }

    #[test]
    fn test_render_scenario_hides_passing_steps() {
        let report = failed_report();
        let lines = render_scenario(&report, false);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("failed"));
        assert!(lines[1].contains("buy"));
        assert!(lines[1].ends_with("Assertion failed: balance off"));
        assert_eq!(render_scenario(&report, true).len(), 4);
    }

    #[test]
    fn test_render_totals() {
        let suite = SuiteReport::new("empty");
        assert_eq!(render_totals(&suite), "empty: 0 passed, 0 failed, 0 total");
    }
}
