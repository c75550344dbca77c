//! crowdsale-probe: bounded waits for crowdsale wizard end-to-end tests
//!
//! The wizard, the wallet popup and the chain all settle on their own
//! schedule. Tests never assert on first read; they poll, retry and compare
//! within a tolerance.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     crowdsale-probe                               │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  Scenario ──step──► Session<D: Driver> ──► browser / mock         │
//! │     │                  │                                          │
//! │     │                  ├── poll_until      (Condition Poller)     │
//! │     │                  └── ActionLoop      (Retry-Bounded Loop)   │
//! │     └──check──► Reconciliation             (Comparator)           │
//! │                                                                   │
//! │  Fixtures (JSON/YAML) ──► expected amounts, tier times            │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! let session = Session::new(ScriptedDriver::new(), config.session_config()?);
//! let mut scenario = Scenario::new("minted happy path");
//! scenario
//!     .step("step 1", async {
//!         session.click_until("#continue", "#token-name").await?.done
//!             .then_some(())
//!             .ok_or_else(|| ProbeError::assertion("step 2 never rendered"))
//!     })
//!     .await?;
//! let report = scenario.finish();
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::float_cmp))]

mod action_loop;
#[cfg(feature = "browser")]
mod browser;
pub mod config;
mod fixture;
pub mod logging;
pub mod mock;
mod page_object;
mod reconcile;
mod result;
mod scenario;
mod session;
mod wait;

pub use action_loop::{
    retry_action, ActionLoop, LoopConfig, LoopExit, LoopOutcome, DEFAULT_ATTEMPT_DELAY_MS,
    DEFAULT_MAX_ATTEMPTS,
};
#[cfg(feature = "browser")]
pub use browser::{BrowserConfig, ChromiumDriver};
pub use config::{HarnessConfig, LogConfig};
pub use fixture::{
    is_address, load_fixture, CrowdsaleFixture, CrowdsaleKind, DateFormat, ReservedDimension,
    ReservedToken, TierFixture, UserFixture, Validate, WhitelistEntry,
};
pub use page_object::{PageObject, SimplePage, UrlMatcher, DEFAULT_PAGE_LOAD_TIMEOUT};
pub use reconcile::{
    balance_delta, from_base_units, parse_display_amount, within_tolerance, AssertionResult,
    Precision, Reconciliation,
};
pub use result::{ProbeError, ProbeResult};
pub use scenario::{Scenario, ScenarioReport, StepRecord, StepState, SuiteReport};
pub use session::{Displayed, Driver, Session, SessionConfig};
pub use wait::{
    poll_for_absence, poll_until, wait_until_passed, wait_until_passed_with, PollConfig,
    PollOutcome, Poller, Probe, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS,
};

/// Common imports for scenario code
pub mod prelude {
    pub use super::action_loop::*;
    pub use super::fixture::*;
    pub use super::mock::{ClickEffect, ScriptedDriver};
    pub use super::page_object::*;
    pub use super::reconcile::*;
    pub use super::result::*;
    pub use super::scenario::*;
    pub use super::session::*;
    pub use super::wait::*;
    pub use super::HarnessConfig;
}
