//! Config command handler

use crate::commands::ConfigArgs;
use crate::error::CliResult;
use crate::output::Reporter;
use crowdsale_probe::HarnessConfig;

/// Print the effective harness configuration as YAML
pub fn execute_config(reporter: &Reporter, args: &ConfigArgs) -> CliResult<bool> {
    let config = HarnessConfig::resolve(args.file.as_deref())?;
    reporter.raw(&config.to_yaml()?);
    Ok(true)
}
