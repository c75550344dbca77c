//! Browser session and driver abstraction.
//!
//! One [`Session`] owns one driver. Every probe and action borrows the
//! session, so a scenario's steps share the browser without globals, and
//! parallel scenarios need one session each.

use crate::action_loop::{ActionLoop, LoopConfig, LoopOutcome};
use crate::page_object::{PageObject, UrlMatcher};
use crate::reconcile::parse_display_amount;
use crate::result::{ProbeError, ProbeResult};
use crate::wait::{poll_for_absence, poll_until, PollConfig, PollOutcome, Probe};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// Abstract browser driver.
///
/// Methods take `&self`; implementations keep any mutable state behind
/// their own synchronization. An `Err` from a read is treated as transient
/// by the poller.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Navigate to an absolute URL
    async fn navigate(&self, url: &str) -> ProbeResult<()>;

    /// Current page URL
    async fn current_url(&self) -> ProbeResult<String>;

    /// Reload the current page
    async fn refresh(&self) -> ProbeResult<()>;

    /// Whether an element matching `selector` is rendered and visible
    async fn is_displayed(&self, selector: &str) -> ProbeResult<bool>;

    /// Whether the element accepts input
    async fn is_enabled(&self, selector: &str) -> ProbeResult<bool>;

    /// Click; `false` when nothing clickable matched
    async fn click(&self, selector: &str) -> ProbeResult<bool>;

    /// Replace the element's value; `false` when nothing matched
    async fn fill(&self, selector: &str, value: &str) -> ProbeResult<bool>;

    /// Text content, `None` when nothing matched
    async fn text(&self, selector: &str) -> ProbeResult<Option<String>>;
}

/// Defaults a session applies to its waits and loops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Wizard root, e.g. `http://localhost:3000/`
    pub base_url: String,
    /// Default wait interval and timeout
    pub poll: PollConfig,
    /// Default action-loop ceiling and delay
    pub action_loop: LoopConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/".to_string(),
            poll: PollConfig::default(),
            action_loop: LoopConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Join a path onto the base URL
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// A driver plus the defaults every wait uses
#[derive(Debug)]
pub struct Session<D: Driver> {
    driver: D,
    config: SessionConfig,
}

impl<D: Driver> Session<D> {
    /// Create a session
    pub fn new(driver: D, config: SessionConfig) -> Self {
        Self { driver, config }
    }

    /// Borrow the driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Get the config
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Give the driver back
    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Session poll settings with a specific timeout and label
    #[must_use]
    pub fn poll_config(&self, what: &str, timeout: Duration) -> PollConfig {
        self.config
            .poll
            .clone()
            .with_timeout(timeout)
            .with_description(what)
    }

    /// Navigate to a path below the base URL
    pub async fn open(&self, path: &str) -> ProbeResult<()> {
        let url = self.config.url(path);
        info!(%url, "open");
        self.driver.navigate(&url).await
    }

    /// Navigate to a page object and wait for its ready marker
    pub async fn open_page<P: PageObject + ?Sized>(&self, page: &P) -> ProbeResult<()> {
        self.open(page.url_path()).await?;
        self.wait_displayed(page.ready_selector(), page.load_timeout())
            .await?
            .require_present(format!("{} ready", page.page_name()))?;
        debug!(page = page.page_name(), "page ready");
        Ok(())
    }

    /// Poll until `selector` is displayed
    pub async fn wait_displayed(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> ProbeResult<PollOutcome<bool>> {
        let driver = &self.driver;
        let config = self.poll_config(selector, timeout);
        poll_until(|| driver.is_displayed(selector), |v| *v, &config).await
    }

    /// Poll until `selector` is no longer displayed (loaders, spinners)
    pub async fn wait_gone(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> ProbeResult<PollOutcome<bool>> {
        let driver = &self.driver;
        let config = self.poll_config(&format!("{selector} gone"), timeout);
        poll_until(|| driver.is_displayed(selector), |v| !*v, &config).await
    }

    /// Poll until `selector` has non-empty text
    pub async fn wait_text(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> ProbeResult<PollOutcome<String>> {
        let driver = &self.driver;
        let config = self.poll_config(&format!("{selector} text"), timeout);
        poll_until(
            || async move {
                driver.text(selector).await.and_then(|text| {
                    text.map(|t| t.trim().to_string())
                        .ok_or_else(|| ProbeError::driver(format!("no element {selector}")))
                })
            },
            |text: &String| !text.is_empty(),
            &config,
        )
        .await
    }

    /// Read a displayed amount such as `"1234.5 TICK"` once it is rendered
    pub async fn read_amount(&self, selector: &str, timeout: Duration) -> ProbeResult<f64> {
        let text = self
            .wait_text(selector, timeout)
            .await?
            .require_present(format!("amount in {selector}"))?;
        parse_display_amount(&text)
    }

    /// `true` when `selector` stays hidden for the whole window
    pub async fn confirm_absent(&self, selector: &str, window: Duration) -> ProbeResult<bool> {
        let driver = &self.driver;
        let config = self.poll_config(&format!("{selector} absent"), window);
        poll_for_absence(|| driver.is_displayed(selector), |v| *v, &config).await
    }

    /// Click `button` while it is on screen until `next` shows up.
    ///
    /// Covers the wizard's "Continue" buttons, whose first click is
    /// sometimes swallowed while the page re-renders.
    pub async fn click_until(&self, button: &str, next: &str) -> ProbeResult<LoopOutcome> {
        self.click_until_with(button, next, self.config.action_loop)
            .await
    }

    /// [`Self::click_until`] with an explicit loop config
    pub async fn click_until_with(
        &self,
        button: &str,
        next: &str,
        config: LoopConfig,
    ) -> ProbeResult<LoopOutcome> {
        let driver = &self.driver;
        ActionLoop::new(config)
            .with_description(format!("click {button} until {next}"))
            .run(
                || driver.click(button),
                || driver.is_displayed(button),
                || driver.is_displayed(next),
            )
            .await
    }

    /// Wait for the browser to land on a URL matching `matcher` and return
    /// the captured parameters (e.g. the crowdsale address on `/manage/:address`)
    pub async fn wait_for_url(
        &self,
        matcher: &UrlMatcher,
        timeout: Duration,
    ) -> ProbeResult<HashMap<String, String>> {
        let driver = &self.driver;
        let config = self.poll_config(matcher.pattern(), timeout);
        poll_until(
            || driver.current_url(),
            |url: &String| matcher.matches(url),
            &config,
        )
        .await?
        .require_present(format!("url {}", matcher.pattern()))
        .map(|url| matcher.captures(&url).unwrap_or_default())
    }

    /// Visibility of `selector` as a reusable [`Probe`]
    pub fn displayed(&self, selector: impl Into<String>) -> Displayed<'_, D> {
        Displayed {
            driver: &self.driver,
            selector: selector.into(),
        }
    }

    /// Fill a field and read it back
    pub async fn fill_checked(&self, selector: &str, value: &str) -> ProbeResult<bool> {
        if !self.driver.fill(selector, value).await? {
            return Ok(false);
        }
        Ok(self.driver.text(selector).await?.as_deref() == Some(value))
    }
}

/// Element visibility probe bound to a session's driver
#[derive(Debug)]
pub struct Displayed<'a, D: Driver> {
    driver: &'a D,
    selector: String,
}

#[async_trait]
impl<D: Driver> Probe for Displayed<'_, D> {
    type Output = bool;

    async fn sample(&self) -> ProbeResult<bool> {
        self.driver.is_displayed(&self.selector).await
    }

    fn description(&self) -> String {
        format!("{} displayed", self.selector)
    }
}
