//! Chromium driver over the DevTools protocol.
//!
//! Compiled with the `browser` feature. Element queries run as small
//! JavaScript snippets evaluated in the page, so selectors are plain CSS.

use crate::result::{ProbeError, ProbeResult};
use crate::session::Driver;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Launch options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserConfig {
    /// Run without a window
    pub headless: bool,
    /// Chromium sandbox (disable inside containers)
    pub sandbox: bool,
    /// Explicit chromium binary
    pub chromium_path: Option<PathBuf>,
    /// Window width
    pub viewport_width: u32,
    /// Window height
    pub viewport_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: true,
            chromium_path: None,
            viewport_width: 1280,
            viewport_height: 1024,
        }
    }
}

impl BrowserConfig {
    /// Show the browser window
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Disable the sandbox
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Use a specific chromium binary
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }
}

fn cdp_err(e: impl std::fmt::Display) -> ProbeError {
    ProbeError::driver(e.to_string())
}

/// JSON-quote a string for splicing into a script
fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// CDP event task, aborted when dropped
#[derive(Debug)]
struct HandlerTask(tokio::task::JoinHandle<()>);

impl Drop for HandlerTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// [`Driver`] backed by one chromium tab
#[derive(Debug)]
pub struct ChromiumDriver {
    browser: Arc<Mutex<Browser>>,
    page: Arc<Mutex<Page>>,
    handler: HandlerTask,
}

impl ChromiumDriver {
    /// Launch chromium and open a blank tab
    pub async fn launch(config: BrowserConfig) -> ProbeResult<Self> {
        let mut builder = CdpConfig::builder().window_size(config.viewport_width, config.viewport_height);
        if !config.headless {
            builder = builder.with_head();
        }
        if !config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = config.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let cdp_config = builder.build().map_err(cdp_err)?;

        let (browser, mut events) = Browser::launch(cdp_config).await.map_err(cdp_err)?;
        let handler = HandlerTask(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = event {
                    warn!(error = %e, "cdp handler stopped");
                    break;
                }
            }
        }));
        let page = browser.new_page("about:blank").await.map_err(cdp_err)?;
        debug!(headless = config.headless, "chromium launched");

        Ok(Self {
            browser: Arc::new(Mutex::new(browser)),
            page: Arc::new(Mutex::new(page)),
            handler,
        })
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> ProbeResult<T> {
        let page = self.page.lock().await;
        let result = page.evaluate(script).await.map_err(cdp_err)?;
        result.into_value().map_err(cdp_err)
    }

    /// Close the browser; the event handler stops when `self` drops
    pub async fn close(self) -> ProbeResult<()> {
        let mut browser = self.browser.lock().await;
        browser.close().await.map_err(cdp_err)?;
        debug!("chromium closed");
        Ok(())
    }
}

#[async_trait]
impl Driver for ChromiumDriver {
    async fn navigate(&self, url: &str) -> ProbeResult<()> {
        let page = self.page.lock().await;
        page.goto(url)
            .await
            .map_err(|e| ProbeError::driver(format!("navigate to {url}: {e}")))?;
        Ok(())
    }

    async fn current_url(&self) -> ProbeResult<String> {
        let page = self.page.lock().await;
        Ok(page.url().await.map_err(cdp_err)?.unwrap_or_default())
    }

    async fn refresh(&self) -> ProbeResult<()> {
        let page = self.page.lock().await;
        page.reload().await.map_err(cdp_err)?;
        Ok(())
    }

    async fn is_displayed(&self, selector: &str) -> ProbeResult<bool> {
        self.eval(format!(
            "(() => {{ const el = document.querySelector({sel}); if (!el) return false; \
             const r = el.getBoundingClientRect(); const s = getComputedStyle(el); \
             return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none'; }})()",
            sel = js_string(selector)
        ))
        .await
    }

    async fn is_enabled(&self, selector: &str) -> ProbeResult<bool> {
        self.eval(format!(
            "(() => {{ const el = document.querySelector({sel}); return !!el && !el.disabled; }})()",
            sel = js_string(selector)
        ))
        .await
    }

    async fn click(&self, selector: &str) -> ProbeResult<bool> {
        self.eval(format!(
            "(() => {{ const el = document.querySelector({sel}); if (!el || el.disabled) return false; \
             el.click(); return true; }})()",
            sel = js_string(selector)
        ))
        .await
    }

    async fn fill(&self, selector: &str, value: &str) -> ProbeResult<bool> {
        // React-controlled inputs ignore plain `value` writes; go through the
        // native setter and fire `input` so the wizard's state updates.
        self.eval(format!(
            "(() => {{ const el = document.querySelector({sel}); if (!el || el.disabled) return false; \
             const proto = Object.getPrototypeOf(el); \
             const setter = Object.getOwnPropertyDescriptor(proto, 'value'); \
             if (setter && setter.set) {{ setter.set.call(el, {val}); }} else {{ el.value = {val}; }} \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return true; }})()",
            sel = js_string(selector),
            val = js_string(value)
        ))
        .await
    }

    async fn text(&self, selector: &str) -> ProbeResult<Option<String>> {
        self.eval(format!(
            "(() => {{ const el = document.querySelector({sel}); if (!el) return null; \
             return ('value' in el && el.value !== undefined && el.tagName !== 'BUTTON') ? String(el.value) : el.textContent; }})()",
            sel = js_string(selector)
        ))
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = BrowserConfig::default()
            .with_headless(false)
            .with_no_sandbox()
            .with_chromium_path("/usr/bin/chromium");
        assert!(!config.headless);
        assert!(!config.sandbox);
        assert_eq!(config.chromium_path, Some(PathBuf::from("/usr/bin/chromium")));
    }

    #[tokio::test]
    async fn test_handler_task_aborted_on_drop() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let task = HandlerTask(tokio::spawn(async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        }));
        drop(task);
        // the sender only goes away if the task was cancelled
        let closed = tokio::time::timeout(std::time::Duration::from_secs(5), rx).await;
        assert!(matches!(closed, Ok(Err(_))));
    }

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string("input[name=\"x\"]"), r#""input[name=\"x\"]""#);
    }
}
