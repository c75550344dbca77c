//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use crowdsale_probe::Precision;
use std::path::PathBuf;

/// cprobe: fixture validation, balance reconciliation and report summaries
/// for crowdsale wizard end-to-end runs
#[derive(Parser, Debug)]
#[command(name = "cprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (only failures are printed)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, value_enum, default_value_t = ColorArg::Auto, global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load and validate user or crowdsale fixtures
    Validate(ValidateArgs),

    /// Compare an expected amount with an observed one
    Reconcile(ReconcileArgs),

    /// Summarize a scenario or suite report
    Report(ReportArgs),

    /// Print the effective harness configuration
    Config(ConfigArgs),
}

/// Fixture type
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixtureKind {
    /// Wallet account (account, privateKey, networkID)
    User,
    /// Crowdsale with tiers
    Crowdsale,
}

/// Arguments for the validate command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Fixture files or glob patterns (.json, .yaml, .yml)
    #[arg(required = true)]
    pub files: Vec<String>,

    /// Fixture type; detected from the content when omitted
    #[arg(short, long, value_enum)]
    pub kind: Option<FixtureKind>,
}

/// Named tolerance classes
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrecisionArg {
    /// 1e-6, token accounting read from the contract
    Strict,
    /// 0.1, balances scraped from the page
    Display,
    /// 1, whole-token agreement
    Whole,
}

impl From<PrecisionArg> for Precision {
    fn from(arg: PrecisionArg) -> Self {
        match arg {
            PrecisionArg::Strict => Self::TokenAccounting,
            PrecisionArg::Display => Self::DisplayRounding,
            PrecisionArg::Whole => Self::WholeToken,
        }
    }
}

/// Arguments for the reconcile command
#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Amount computed from fixtures
    #[arg(long, allow_negative_numbers = true)]
    pub expected: f64,

    /// Amount read back, e.g. "1000000.05 TICK"
    #[arg(long, allow_hyphen_values = true)]
    pub observed: String,

    /// Explicit tolerance
    #[arg(long, conflicts_with = "precision")]
    pub epsilon: Option<f64>,

    /// Tolerance class
    #[arg(long, value_enum)]
    pub precision: Option<PrecisionArg>,

    /// Treat --observed as raw base units with this many decimals
    #[arg(long, value_name = "DECIMALS")]
    pub base_units: Option<u32>,

    /// Label printed with the result
    #[arg(long, default_value = "amount")]
    pub label: String,
}

impl ReconcileArgs {
    /// Epsilon implied by the flags; strict when neither is given
    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.epsilon.unwrap_or_else(|| {
            Precision::from(self.precision.unwrap_or(PrecisionArg::Strict)).epsilon()
        })
    }
}

/// Report output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// JSON summary
    Json,
}

/// Arguments for the report command
#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Report file written by a scenario run
    pub file: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Harness config file (YAML); defaults apply when omitted
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_reconcile() {
        let cli = Cli::try_parse_from([
            "cprobe",
            "reconcile",
            "--expected",
            "1000000",
            "--observed",
            "1000000.05 TICK",
            "--precision",
            "display",
        ])
        .unwrap();
        let Commands::Reconcile(args) = cli.command else {
            panic!("expected reconcile");
        };
        assert_eq!(args.epsilon(), 0.1);
        assert_eq!(args.observed, "1000000.05 TICK");
    }

    #[test]
    fn test_epsilon_conflicts_with_precision() {
        let err = Cli::try_parse_from([
            "cprobe",
            "reconcile",
            "--expected",
            "1",
            "--observed",
            "1",
            "--epsilon",
            "0.5",
            "--precision",
            "whole",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn test_default_epsilon_is_strict() {
        let cli =
            Cli::try_parse_from(["cprobe", "reconcile", "--expected", "1", "--observed", "1"])
                .unwrap();
        let Commands::Reconcile(args) = cli.command else {
            panic!("expected reconcile");
        };
        assert_eq!(args.epsilon(), 1e-6);
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["cprobe", "validate", "a.json", "-vv", "--color", "never"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.color, ColorArg::Never);
    }
}
