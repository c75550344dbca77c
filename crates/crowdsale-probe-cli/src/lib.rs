//! crowdsale-probe CLI library
//!
//! Offline companions to a scenario run: check fixtures before a run,
//! reconcile a single amount by hand and summarize the JSON reports a run
//! leaves behind.

#![warn(missing_docs)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod handlers;
mod output;

pub use commands::{
    Cli, ColorArg, Commands, ConfigArgs, FixtureKind, PrecisionArg, ReconcileArgs, ReportArgs,
    ReportFormat, ValidateArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{render_scenario, render_totals, FailureSummary, Reporter, SuiteSummary};
