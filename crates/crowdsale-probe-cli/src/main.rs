//! cprobe: companion CLI for crowdsale wizard end-to-end runs
//!
//! ## Usage
//!
//! ```bash
//! cprobe validate fixtures/*.json           # Check fixtures before a run
//! cprobe reconcile --expected 1000 \
//!     --observed "1000.05 TICK" --precision display
//! cprobe report results/minted.json         # Summarize a run
//! cprobe config --file harness.yaml         # Show effective settings
//! ```

use clap::Parser;
use crowdsale_probe::{logging, LogConfig};
use crowdsale_probe_cli::{
    handlers, Cli, CliConfig, CliResult, ColorChoice, Commands, Reporter, Verbosity,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<bool> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_logging(config.verbosity);

    let use_color = config.color.should_color();
    console::set_colors_enabled(use_color);
    let mut reporter = Reporter::new(use_color, config.verbosity.is_quiet());

    match cli.command {
        Commands::Validate(args) => handlers::execute_validate(&mut reporter, &args),
        Commands::Reconcile(args) => handlers::execute_reconcile(&reporter, &args),
        Commands::Report(args) => {
            handlers::execute_report(&reporter, &args, config.verbosity.is_verbose())
        }
        Commands::Config(args) => handlers::execute_config(&reporter, &args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(ColorChoice::from(cli.color))
}

fn init_logging(verbosity: Verbosity) {
    let mut log = LogConfig::default();
    if let Some(filter) = verbosity.log_filter() {
        log.filter = filter.to_string();
    }
    // A bad CPROBE_LOG is not worth failing a command over
    if let Err(e) = logging::init(&log) {
        eprintln!("warning: {e}");
    }
}
