//! Harness configuration.
//!
//! Loaded from YAML, then overridden from the environment:
//!
//! ```yaml
//! base_url: http://localhost:3000/
//! output_dir: results
//! date_format: mdy
//! poll:
//!   interval_ms: 300
//!   timeout_ms: 30000
//! action_loop:
//!   max_attempts: 200
//!   delay_ms: 300
//! log:
//!   filter: crowdsale_probe=debug
//!   json: false
//! ```
//!
//! Durations are signed in the file so a negative value is reported as a
//! configuration error instead of a parse error.

use crate::action_loop::{LoopConfig, DEFAULT_ATTEMPT_DELAY_MS, DEFAULT_MAX_ATTEMPTS};
use crate::fixture::DateFormat;
use crate::result::{ProbeError, ProbeResult};
use crate::session::SessionConfig;
use crate::wait::{PollConfig, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Overrides `base_url`
pub const ENV_BASE_URL: &str = "CPROBE_BASE_URL";

/// Overrides `log.filter`
pub const ENV_LOG: &str = "CPROBE_LOG";

/// Poller defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollSettings {
    /// Sleep between probes
    pub interval_ms: i64,
    /// Wait budget
    pub timeout_ms: i64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS as i64,
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS as i64,
        }
    }
}

/// Action-loop defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoopSettings {
    /// Iteration ceiling
    pub max_attempts: i64,
    /// Sleep before each iteration
    pub delay_ms: i64,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_attempts: i64::from(DEFAULT_MAX_ATTEMPTS),
            delay_ms: DEFAULT_ATTEMPT_DELAY_MS as i64,
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// `EnvFilter` directives
    pub filter: String,
    /// Emit JSON lines instead of text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// Top-level harness configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Wizard root URL
    pub base_url: String,
    /// Where reports are written
    pub output_dir: PathBuf,
    /// Date order of the browser's date inputs
    pub date_format: DateFormat,
    /// Poller defaults
    pub poll: PollSettings,
    /// Action-loop defaults
    pub action_loop: LoopSettings,
    /// Logging
    pub log: LogConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/".to_string(),
            output_dir: PathBuf::from("results"),
            date_format: DateFormat::default(),
            poll: PollSettings::default(),
            action_loop: LoopSettings::default(),
            log: LogConfig::default(),
        }
    }
}

fn millis(field: &str, value: i64) -> ProbeResult<Duration> {
    u64::try_from(value)
        .map(Duration::from_millis)
        .map_err(|_| ProbeError::invalid_config(format!("{field} must not be negative, got {value}")))
}

impl HarnessConfig {
    /// Parse and validate YAML
    pub fn from_yaml(yaml: &str) -> ProbeResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize as YAML
    pub fn to_yaml(&self) -> ProbeResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Read a config file
    pub fn load(path: &Path) -> ProbeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&text)?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// File (or defaults) with environment overrides applied
    pub fn resolve(path: Option<&Path>) -> ProbeResult<Self> {
        let mut config = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.is_empty()) {
            self.base_url = url;
        }
        if let Some(filter) = lookup(ENV_LOG).filter(|v| !v.is_empty()) {
            self.log.filter = filter;
        }
    }

    /// Reject values the poller or loop cannot run with
    pub fn validate(&self) -> ProbeResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(ProbeError::invalid_config("base_url must not be empty"));
        }
        self.poll_config()?.validate()?;
        self.loop_config()?.validate()
    }

    /// Default [`PollConfig`]
    pub fn poll_config(&self) -> ProbeResult<PollConfig> {
        Ok(PollConfig::new(
            millis("poll.interval_ms", self.poll.interval_ms)?,
            millis("poll.timeout_ms", self.poll.timeout_ms)?,
        ))
    }

    /// Default [`LoopConfig`]
    pub fn loop_config(&self) -> ProbeResult<LoopConfig> {
        let max_attempts = u32::try_from(self.action_loop.max_attempts).map_err(|_| {
            ProbeError::invalid_config(format!(
                "action_loop.max_attempts out of range: {}",
                self.action_loop.max_attempts
            ))
        })?;
        Ok(LoopConfig::new(
            max_attempts,
            millis("action_loop.delay_ms", self.action_loop.delay_ms)?,
        ))
    }

    /// Settings for a [`crate::session::Session`]
    pub fn session_config(&self) -> ProbeResult<SessionConfig> {
        Ok(SessionConfig {
            base_url: self.base_url.clone(),
            poll: self.poll_config()?,
            action_loop: self.loop_config()?,
        })
    }
}
