//! Scripted in-memory driver.
//!
//! Stands in for a browser in unit tests and dry runs. Elements can be made
//! to appear or disappear after a number of reads, clicks can be swallowed
//! before they take effect, and reads can fail transiently, which is the
//! behaviour the poller and the action loop exist to absorb.

use crate::result::{ProbeError, ProbeResult};
use crate::session::Driver;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Visibility change applied after a number of reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flip {
    ShowAfter(u32),
    HideAfter(u32),
}

#[derive(Debug, Clone, Default)]
struct MockElement {
    displayed: bool,
    enabled: bool,
    text: Option<String>,
    flip: Option<Flip>,
    reads: u32,
    failures_left: u32,
}

impl MockElement {
    fn visible() -> Self {
        Self {
            displayed: true,
            enabled: true,
            ..Self::default()
        }
    }
}

/// What a click on an element does to the page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickEffect {
    after: u32,
    show: Vec<String>,
    hide: Vec<String>,
    navigate: Option<String>,
}

impl ClickEffect {
    /// Effect applied on the `n`th click; earlier clicks are swallowed
    #[must_use]
    pub fn after(n: u32) -> Self {
        Self {
            after: n.max(1),
            ..Self::default()
        }
    }

    /// Effect of the first click
    #[must_use]
    pub fn immediate() -> Self {
        Self::after(1)
    }

    /// Make an element visible
    #[must_use]
    pub fn show(mut self, selector: impl Into<String>) -> Self {
        self.show.push(selector.into());
        self
    }

    /// Hide an element
    #[must_use]
    pub fn hide(mut self, selector: impl Into<String>) -> Self {
        self.hide.push(selector.into());
        self
    }

    /// Change the current URL
    #[must_use]
    pub fn navigate(mut self, url: impl Into<String>) -> Self {
        self.navigate = Some(url.into());
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    url: String,
    elements: HashMap<String, MockElement>,
    effects: HashMap<String, ClickEffect>,
    clicks: HashMap<String, u32>,
    fills: Vec<(String, String)>,
    navigations: Vec<String>,
    refreshes: u32,
}

impl MockState {
    /// Count a read and apply scheduled changes. `Err` while failures remain.
    fn read(&mut self, selector: &str) -> ProbeResult<Option<&MockElement>> {
        let Some(el) = self.elements.get_mut(selector) else {
            return Ok(None);
        };
        if el.failures_left > 0 {
            el.failures_left -= 1;
            return Err(ProbeError::driver(format!("stale element {selector}")));
        }
        match el.flip {
            Some(Flip::ShowAfter(n)) if el.reads >= n => el.displayed = true,
            Some(Flip::HideAfter(n)) if el.reads >= n => el.displayed = false,
            _ => {}
        }
        el.reads += 1;
        Ok(Some(&*el))
    }

    fn set_displayed(&mut self, selector: &str, displayed: bool) {
        let el = self
            .elements
            .entry(selector.to_string())
            .or_insert_with(MockElement::visible);
        el.displayed = displayed;
        el.flip = None;
    }
}

/// In-memory [`Driver`] with scripted behaviour
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    state: Mutex<MockState>,
}

impl ScriptedDriver {
    /// Empty page at `about:blank`
    #[must_use]
    pub fn new() -> Self {
        let driver = Self::default();
        driver.lock().url = "about:blank".to_string();
        driver
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&mut self) -> &mut MockState {
        self.state.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an element, visible or hidden
    #[must_use]
    pub fn with_element(mut self, selector: impl Into<String>, displayed: bool) -> Self {
        let el = MockElement {
            displayed,
            ..MockElement::visible()
        };
        self.state_mut().elements.insert(selector.into(), el);
        self
    }

    /// Add a hidden element that shows up after `reads` reads
    #[must_use]
    pub fn with_element_shown_after(mut self, selector: impl Into<String>, reads: u32) -> Self {
        let el = MockElement {
            displayed: false,
            flip: Some(Flip::ShowAfter(reads)),
            ..MockElement::visible()
        };
        self.state_mut().elements.insert(selector.into(), el);
        self
    }

    /// Add a visible element that goes away after `reads` reads
    #[must_use]
    pub fn with_element_hidden_after(mut self, selector: impl Into<String>, reads: u32) -> Self {
        let el = MockElement {
            flip: Some(Flip::HideAfter(reads)),
            ..MockElement::visible()
        };
        self.state_mut().elements.insert(selector.into(), el);
        self
    }

    /// Add a visible element with text
    #[must_use]
    pub fn with_text(mut self, selector: impl Into<String>, text: impl Into<String>) -> Self {
        let el = MockElement {
            text: Some(text.into()),
            ..MockElement::visible()
        };
        self.state_mut().elements.insert(selector.into(), el);
        self
    }

    /// Mark an existing element disabled
    #[must_use]
    pub fn with_disabled(mut self, selector: &str) -> Self {
        if let Some(el) = self.state_mut().elements.get_mut(selector) {
            el.enabled = false;
        }
        self
    }

    /// Make the next `n` reads of an existing element fail
    #[must_use]
    pub fn with_transient_failures(mut self, selector: &str, n: u32) -> Self {
        if let Some(el) = self.state_mut().elements.get_mut(selector) {
            el.failures_left = n;
        }
        self
    }

    /// Attach a click effect
    #[must_use]
    pub fn with_click_effect(mut self, selector: impl Into<String>, effect: ClickEffect) -> Self {
        self.state_mut().effects.insert(selector.into(), effect);
        self
    }

    /// Show or hide an element while a test is running
    pub fn set_displayed(&self, selector: &str, displayed: bool) {
        self.lock().set_displayed(selector, displayed);
    }

    /// Replace an element's text while a test is running
    pub fn set_text(&self, selector: &str, text: impl Into<String>) {
        let mut state = self.lock();
        let el = state
            .elements
            .entry(selector.to_string())
            .or_insert_with(MockElement::visible);
        el.text = Some(text.into());
    }

    /// Clicks received by `selector`
    #[must_use]
    pub fn click_count(&self, selector: &str) -> u32 {
        self.lock().clicks.get(selector).copied().unwrap_or(0)
    }

    /// Reads of `selector` that returned a value
    #[must_use]
    pub fn read_count(&self, selector: &str) -> u32 {
        self.lock().elements.get(selector).map_or(0, |el| el.reads)
    }

    /// `(selector, value)` pairs in fill order
    #[must_use]
    pub fn fills(&self) -> Vec<(String, String)> {
        self.lock().fills.clone()
    }

    /// URLs navigated to, in order
    #[must_use]
    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    /// Page reloads
    #[must_use]
    pub fn refreshes(&self) -> u32 {
        self.lock().refreshes
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    async fn navigate(&self, url: &str) -> ProbeResult<()> {
        let mut state = self.lock();
        state.url = url.to_string();
        state.navigations.push(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> ProbeResult<String> {
        Ok(self.lock().url.clone())
    }

    async fn refresh(&self) -> ProbeResult<()> {
        self.lock().refreshes += 1;
        Ok(())
    }

    async fn is_displayed(&self, selector: &str) -> ProbeResult<bool> {
        Ok(self.lock().read(selector)?.is_some_and(|el| el.displayed))
    }

    async fn is_enabled(&self, selector: &str) -> ProbeResult<bool> {
        Ok(self
            .lock()
            .read(selector)?
            .is_some_and(|el| el.displayed && el.enabled))
    }

    async fn click(&self, selector: &str) -> ProbeResult<bool> {
        let mut state = self.lock();
        let clickable = state
            .elements
            .get(selector)
            .is_some_and(|el| el.displayed && el.enabled);
        if !clickable {
            return Ok(false);
        }
        let count = {
            let c = state.clicks.entry(selector.to_string()).or_insert(0);
            *c += 1;
            *c
        };
        if let Some(effect) = state.effects.get(selector).cloned() {
            if count == effect.after {
                for s in &effect.show {
                    state.set_displayed(s, true);
                }
                for s in &effect.hide {
                    state.set_displayed(s, false);
                }
                if let Some(url) = effect.navigate {
                    state.url = url;
                }
            }
        }
        Ok(true)
    }

    async fn fill(&self, selector: &str, value: &str) -> ProbeResult<bool> {
        let mut state = self.lock();
        let Some(el) = state.elements.get_mut(selector) else {
            return Ok(false);
        };
        if !el.enabled {
            return Ok(false);
        }
        el.text = Some(value.to_string());
        state.fills.push((selector.to_string(), value.to_string()));
        Ok(true)
    }

    async fn text(&self, selector: &str) -> ProbeResult<Option<String>> {
        Ok(self.lock().read(selector)?.and_then(|el| el.text.clone()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_element_reads_as_absent() {
        let d = ScriptedDriver::new();
        assert!(!d.is_displayed("#nope").await.unwrap());
        assert!(!d.click("#nope").await.unwrap());
        assert_eq!(d.text("#nope").await.unwrap(), None);
        assert_eq!(d.current_url().await.unwrap(), "about:blank");
    }

    #[tokio::test]
    async fn test_show_after_reads() {
        let d = ScriptedDriver::new().with_element_shown_after("#x", 2);
        assert!(!d.is_displayed("#x").await.unwrap());
        assert!(!d.is_displayed("#x").await.unwrap());
        assert!(d.is_displayed("#x").await.unwrap());
        assert_eq!(d.read_count("#x"), 3);
    }

    #[tokio::test]
    async fn test_transient_failures_then_value() {
        let d = ScriptedDriver::new()
            .with_text("#rate", "100")
            .with_transient_failures("#rate", 1);
        assert!(d.text("#rate").await.is_err());
        assert_eq!(d.text("#rate").await.unwrap().as_deref(), Some("100"));
    }

    #[tokio::test]
    async fn test_swallowed_clicks() {
        let d = ScriptedDriver::new()
            .with_element("#next", true)
            .with_click_effect(
                "#next",
                ClickEffect::after(3).show("#done").navigate("http://w/2"),
            );
        assert!(d.click("#next").await.unwrap());
        assert!(d.click("#next").await.unwrap());
        assert!(!d.is_displayed("#done").await.unwrap());
        assert!(d.click("#next").await.unwrap());
        assert!(d.is_displayed("#done").await.unwrap());
        assert_eq!(d.current_url().await.unwrap(), "http://w/2");
        assert_eq!(d.click_count("#next"), 3);
    }

    #[tokio::test]
    async fn test_disabled_element() {
        let d = ScriptedDriver::new()
            .with_element("#publish", true)
            .with_disabled("#publish");
        assert!(!d.is_enabled("#publish").await.unwrap());
        assert!(!d.click("#publish").await.unwrap());
        assert!(!d.fill("#publish", "x").await.unwrap());
    }

    #[tokio::test]
    async fn test_runtime_mutation() {
        let d = ScriptedDriver::new();
        d.set_text(".balance", "5 TICK");
        assert_eq!(d.text(".balance").await.unwrap().as_deref(), Some("5 TICK"));
        d.set_displayed(".balance", false);
        assert!(!d.is_displayed(".balance").await.unwrap());
        d.refresh().await.unwrap();
        assert_eq!(d.refreshes(), 1);
    }

    #[tokio::test]
    async fn test_fill_records_value() {
        let d = ScriptedDriver::new().with_element("#name", true);
        assert!(d.fill("#name", "Crowdsale").await.unwrap());
        assert_eq!(d.fills(), vec![("#name".to_string(), "Crowdsale".to_string())]);
    }
}
