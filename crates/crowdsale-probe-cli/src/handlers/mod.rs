//! Command handlers
//!
//! Each handler returns whether its checks passed; `main` turns that into
//! the exit code. Errors are reserved for inputs that could not be read.

pub mod config;
pub mod reconcile;
pub mod report;
pub mod validate;

pub use config::execute_config;
pub use reconcile::{execute_reconcile, reconcile};
pub use report::{execute_report, load_report};
pub use validate::{execute_validate, expand_patterns, validate_file};
