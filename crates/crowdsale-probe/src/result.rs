//! Result and error types for crowdsale-probe.
//!
//! Transient probe failures never appear here: the poller and the action
//! loop absorb them. A timeout is an outcome until a caller turns it into
//! [`ProbeError::Timeout`] with an explicit polarity.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for crowdsale-probe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors that can occur while driving a scenario
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Invalid poller, loop or harness configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// A condition that had to appear never did
    #[error("Timed out after {ms}ms ({attempts} attempts) waiting for {what}")]
    Timeout {
        /// What was waited for
        what: String,
        /// Budget in milliseconds
        ms: u64,
        /// Probe invocations made
        attempts: u32,
    },

    /// A condition that had to stay absent showed up
    #[error("Unexpected presence of {what}")]
    UnexpectedPresence {
        /// What showed up
        what: String,
    },

    /// Assertion failed
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// Browser driver failure
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Fixture could not be loaded or failed validation
    #[error("Fixture {}: {message}", path.display())]
    Fixture {
        /// Fixture file
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// A scenario step was skipped because an earlier step failed
    #[error("Scenario halted before step '{step}'")]
    Halted {
        /// Step that did not run
        step: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl ProbeError {
    /// Create a configuration error
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an assertion error
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailed {
            message: message.into(),
        }
    }

    /// Create a driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create a fixture error
    #[must_use]
    pub fn fixture(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Fixture {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from a wait running out of budget
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = ProbeError::Timeout {
            what: "button 'Continue'".into(),
            ms: 1500,
            attempts: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("1500ms"));
        assert!(msg.contains("4 attempts"));
        assert!(msg.contains("button 'Continue'"));
        assert!(err.is_timeout());
    }

    #[test]
    fn test_fixture_display_includes_path() {
        let err = ProbeError::fixture("scenarios/minted.json", "missing field `tiers`");
        assert_eq!(
            err.to_string(),
            "Fixture scenarios/minted.json: missing field `tiers`"
        );
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_io_from() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ProbeError = io.into();
        assert!(matches!(err, ProbeError::Io(_)));
    }
}
