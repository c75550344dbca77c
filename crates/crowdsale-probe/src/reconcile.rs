//! Reconciliation Comparator
//!
//! Epsilon-bounded comparison of an expected amount (computed from fixture
//! data) against an observed one (read back from the UI or the chain).
//! Display rounding, pending-state lag and gas costs make exact equality
//! unusable; each check picks an epsilon from its [`Precision`] class.

use crate::result::{ProbeError, ProbeResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// `|expected - observed| < epsilon`.
///
/// Strict: a difference equal to `epsilon` is outside tolerance. NaN never
/// compares within tolerance.
#[must_use]
pub fn within_tolerance(expected: f64, observed: f64, epsilon: f64) -> bool {
    (expected - observed).abs() < epsilon
}

/// Absolute change between two balance readings
#[must_use]
pub fn balance_delta(before: f64, after: f64) -> f64 {
    (before - after).abs()
}

/// Scale a raw on-chain amount down by `10^decimals`
#[must_use]
pub fn from_base_units(raw: u128, decimals: u32) -> f64 {
    match 10u128.checked_pow(decimals) {
        Some(scale) => raw as f64 / scale as f64,
        None => raw as f64 / 10f64.powi(decimals as i32),
    }
}

/// Parse a balance as the UI shows it, e.g. `"1234.5 TICK"`.
///
/// Only the first whitespace-separated token is numeric.
pub fn parse_display_amount(text: &str) -> ProbeResult<f64> {
    let token = text
        .split_whitespace()
        .next()
        .ok_or_else(|| ProbeError::assertion("empty balance text"))?;
    let cleaned = token.replace(',', "");
    cleaned
        .parse::<f64>()
        .map_err(|_| ProbeError::assertion(format!("balance '{text}' is not numeric")))
}

/// Precision class of a check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    /// Token accounting read straight from the contract
    TokenAccounting,
    /// Balances scraped from the contribution page
    DisplayRounding,
    /// Whole-token agreement
    WholeToken,
    /// Caller-chosen epsilon, for large-supply approximations
    Approximate(f64),
}

impl Precision {
    /// Epsilon for this class
    #[must_use]
    pub fn epsilon(self) -> f64 {
        match self {
            Self::TokenAccounting => 1e-6,
            Self::DisplayRounding => 0.1,
            Self::WholeToken => 1.0,
            Self::Approximate(e) => e,
        }
    }
}

impl Default for Precision {
    fn default() -> Self {
        Self::TokenAccounting
    }
}

/// Result of a check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionResult {
    /// Whether the check passed
    pub passed: bool,
    /// Human-readable message
    pub message: String,
}

impl AssertionResult {
    /// Create a passing result
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            passed: true,
            message: String::new(),
        }
    }

    /// Create a failing result
    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }

    /// Turn a failure into [`ProbeError::AssertionFailed`]
    pub fn into_result(self) -> ProbeResult<()> {
        if self.passed {
            Ok(())
        } else {
            Err(ProbeError::assertion(self.message))
        }
    }
}

/// One expected-vs-observed comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// What is being compared ("investor token balance")
    pub label: String,
    /// Value computed from fixtures
    pub expected: f64,
    /// Value read back
    pub observed: f64,
    /// Tolerance
    pub epsilon: f64,
}

impl Reconciliation {
    /// Create a comparison; a negative or NaN epsilon is a configuration error
    pub fn new(
        label: impl Into<String>,
        expected: f64,
        observed: f64,
        epsilon: f64,
    ) -> ProbeResult<Self> {
        if epsilon.is_nan() || epsilon < 0.0 {
            return Err(ProbeError::invalid_config(format!(
                "epsilon must be non-negative, got {epsilon}"
            )));
        }
        Ok(Self {
            label: label.into(),
            expected,
            observed,
            epsilon,
        })
    }

    /// Create a comparison with a class epsilon
    pub fn with_precision(
        label: impl Into<String>,
        expected: f64,
        observed: f64,
        precision: Precision,
    ) -> ProbeResult<Self> {
        Self::new(label, expected, observed, precision.epsilon())
    }

    /// Signed difference `observed - expected`
    #[must_use]
    pub fn difference(&self) -> f64 {
        self.observed - self.expected
    }

    /// Whether observed is within epsilon of expected
    #[must_use]
    pub fn holds(&self) -> bool {
        within_tolerance(self.expected, self.observed, self.epsilon)
    }

    /// Evaluate and log the comparison
    #[must_use]
    pub fn check(&self) -> AssertionResult {
        let passed = self.holds();
        debug!(
            label = %self.label,
            expected = self.expected,
            observed = self.observed,
            difference = self.difference(),
            epsilon = self.epsilon,
            passed,
            "reconciliation"
        );
        if passed {
            AssertionResult::pass()
        } else {
            AssertionResult::fail(self.to_string())
        }
    }

    /// [`Self::check`] as a `Result`
    pub fn verify(&self) -> ProbeResult<()> {
        self.check().into_result()
    }
}

impl fmt::Display for Reconciliation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {} got {} (difference {}, epsilon {})",
            self.label,
            self.expected,
            self.observed,
            self.difference(),
            self.epsilon
        )
    }
}
