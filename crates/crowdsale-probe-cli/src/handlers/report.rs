//! Report command handler

use crate::commands::{ReportArgs, ReportFormat};
use crate::error::{CliError, CliResult};
use crate::output::{render_scenario, render_totals, Reporter, SuiteSummary};
use crowdsale_probe::{ScenarioReport, SuiteReport};
use std::path::Path;

/// Read a suite report, or a single scenario report wrapped as a suite
pub fn load_report(path: &Path) -> CliResult<SuiteReport> {
    let text = std::fs::read_to_string(path)?;
    if let Ok(suite) = serde_json::from_str::<SuiteReport>(&text) {
        return Ok(suite);
    }
    let scenario: ScenarioReport = serde_json::from_str(&text).map_err(|e| CliError::Report {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let mut suite = SuiteReport::new(scenario.name.clone());
    suite.push(scenario);
    Ok(suite)
}

/// Summarize a report; passes when every scenario passed
pub fn execute_report(reporter: &Reporter, args: &ReportArgs, verbose: bool) -> CliResult<bool> {
    let suite = load_report(&args.file)?;
    match args.format {
        ReportFormat::Json => {
            reporter.raw(&serde_json::to_string_pretty(&SuiteSummary::from(&suite))?);
        }
        ReportFormat::Text => {
            for scenario in &suite.scenarios {
                let mut lines = render_scenario(scenario, verbose).into_iter();
                let head = lines.next().unwrap_or_default();
                if scenario.passed {
                    reporter.success(&head);
                } else {
                    reporter.failure(&head);
                }
                for line in lines {
                    if scenario.passed {
                        reporter.info(&line);
                    } else {
                        reporter.failure(&line);
                    }
                }
            }
            reporter.info(&render_totals(&suite));
        }
    }
    Ok(suite.exit_code() == 0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"{
        "name": "minted",
        "run_id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
        "started_at": "2018-05-21T13:30:00Z",
        "duration_ms": 1200,
        "passed": true,
        "steps": [{ "name": "publish", "state": "satisfied", "elapsed_ms": 1200 }]
    }"#;

    #[test]
    fn test_single_scenario_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minted.json");
        std::fs::write(&path, SCENARIO).unwrap();
        let suite = load_report(&path).unwrap();
        assert_eq!(suite.name, "minted");
        assert_eq!(suite.exit_code(), 0);
    }

    #[test]
    fn test_suite_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.json");
        let body = format!(r#"{{ "name": "nightly", "scenarios": [{SCENARIO}] }}"#);
        std::fs::write(&path, body).unwrap();
        let suite = load_report(&path).unwrap();
        assert_eq!(suite.name, "nightly");
        assert_eq!(suite.scenarios.len(), 1);
    }

    #[test]
    fn test_garbage_is_report_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(load_report(&path), Err(CliError::Report { .. })));
    }
}
