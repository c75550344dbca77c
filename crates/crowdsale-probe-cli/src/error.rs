//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// A file pattern matched nothing or was malformed
    #[error("No files match '{pattern}'")]
    NoMatch {
        /// Pattern as given
        pattern: String,
    },

    /// Report could not be read as a suite or scenario report
    #[error("Report {path}: {message}")]
    Report {
        /// Report file
        path: String,
        /// Error message
        message: String,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Library error
    #[error(transparent)]
    Probe(#[from] crowdsale_probe::ProbeError),
}

impl CliError {
    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crowdsale_probe::ProbeError;

    #[test]
    fn test_probe_error_is_transparent() {
        let err: CliError = ProbeError::fixture("owner.json", "bad account").into();
        assert_eq!(err.to_string(), "Fixture owner.json: bad account");
    }

    #[test]
    fn test_invalid_argument() {
        let err = CliError::invalid_argument("observed is not a number");
        assert_eq!(err.to_string(), "Invalid argument: observed is not a number");
    }
}
