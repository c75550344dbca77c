//! Validate command handler

use crate::commands::{FixtureKind, ValidateArgs};
use crate::error::{CliError, CliResult};
use crate::output::Reporter;
use crowdsale_probe::{load_fixture, CrowdsaleFixture, ProbeError, ProbeResult, UserFixture};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Expand arguments into paths. Arguments containing glob metacharacters
/// must match at least one file; plain paths are passed through.
pub fn expand_patterns(patterns: &[String]) -> CliResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        if !pattern.contains(['*', '?', '[']) {
            paths.push(PathBuf::from(pattern));
            continue;
        }
        let entries = glob::glob(pattern)
            .map_err(|e| CliError::invalid_argument(format!("pattern '{pattern}': {e}")))?;
        let before = paths.len();
        paths.extend(entries.filter_map(Result::ok).filter(|p| p.is_file()));
        if paths.len() == before {
            return Err(CliError::NoMatch {
                pattern: pattern.clone(),
            });
        }
    }
    Ok(paths)
}

/// Guess the fixture type: users carry an `account`, crowdsales carry `tiers`
fn detect_kind(path: &Path) -> ProbeResult<FixtureKind> {
    let text = std::fs::read_to_string(path).map_err(|e| ProbeError::fixture(path, e.to_string()))?;
    let value: serde_json::Value = serde_yaml_ng::from_str(&text)
        .map_err(|e| ProbeError::fixture(path, e.to_string()))?;
    if value.get("account").is_some() {
        Ok(FixtureKind::User)
    } else {
        Ok(FixtureKind::Crowdsale)
    }
}

/// Load and validate one fixture, returning a one-line description
pub fn validate_file(path: &Path, kind: Option<FixtureKind>) -> ProbeResult<String> {
    let kind = match kind {
        Some(k) => k,
        None => detect_kind(path)?,
    };
    debug!(path = %path.display(), ?kind, "validating fixture");
    match kind {
        FixtureKind::User => {
            let user: UserFixture = load_fixture(path)?;
            Ok(format!("user {} on network {}", user.account, user.network_id))
        }
        FixtureKind::Crowdsale => {
            let sale: CrowdsaleFixture = load_fixture(path)?;
            Ok(format!(
                "{:?} crowdsale '{}' ({}), {} tier(s)",
                sale.kind(),
                sale.name,
                sale.ticker,
                sale.tiers.len()
            ))
        }
    }
}

/// Validate every file; stop at the first invalid one
pub fn execute_validate(reporter: &mut Reporter, args: &ValidateArgs) -> CliResult<bool> {
    let paths = expand_patterns(&args.files)?;
    reporter.start_progress(paths.len() as u64, "validating fixtures");
    for path in &paths {
        let result = validate_file(path, args.kind);
        reporter.increment();
        match result {
            Ok(summary) => reporter.success(&format!("{}: {summary}", path.display())),
            Err(e) => {
                reporter.finish();
                reporter.failure(&path.display().to_string());
                return Err(e.into());
            }
        }
    }
    reporter.finish();
    reporter.info(&format!("{} fixture(s) valid", paths.len()));
    Ok(true)
}
