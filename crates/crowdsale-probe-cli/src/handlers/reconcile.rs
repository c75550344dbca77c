//! Reconcile command handler

use crate::commands::ReconcileArgs;
use crate::error::{CliError, CliResult};
use crate::output::Reporter;
use crowdsale_probe::{from_base_units, parse_display_amount, Reconciliation};

/// Build the comparison from the arguments
pub fn reconcile(args: &ReconcileArgs) -> CliResult<Reconciliation> {
    let observed = match args.base_units {
        Some(decimals) => {
            let raw: u128 = args.observed.trim().parse().map_err(|_| {
                CliError::invalid_argument(format!(
                    "observed '{}' is not an integer amount of base units",
                    args.observed
                ))
            })?;
            from_base_units(raw, decimals)
        }
        None => parse_display_amount(&args.observed)?,
    };
    Ok(Reconciliation::new(
        args.label.clone(),
        args.expected,
        observed,
        args.epsilon(),
    )?)
}

/// Print PASS or FAIL for one comparison
pub fn execute_reconcile(reporter: &Reporter, args: &ReconcileArgs) -> CliResult<bool> {
    let rec = reconcile(args)?;
    let result = rec.check();
    if result.passed {
        reporter.success(&rec.to_string());
    } else {
        reporter.failure(&result.message);
    }
    Ok(result.passed)
}
