//! Page objects for the wizard's steps.
//!
//! A page object knows where a page lives, which element marks it as
//! rendered, and the selectors a scenario needs on it. Concrete wizard
//! pages are plain data built with [`SimplePage`].

use std::collections::HashMap;
use std::time::Duration;

/// Default time a page gets to render its ready marker (wizard steps wait
/// up to three minutes on a slow node)
pub const DEFAULT_PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(180);

/// A page or step of the wizard.
///
/// ```ignore
/// struct ManagePage { address: String }
///
/// impl PageObject for ManagePage {
///     fn url_path(&self) -> &str { &self.address }
///     fn ready_selector(&self) -> &str { "#manage-title" }
/// }
///
/// session.open_page(&ManagePage { address }).await?;
/// ```
pub trait PageObject {
    /// Path below the session's base URL
    fn url_path(&self) -> &str;

    /// Element that is visible once the page has rendered
    fn ready_selector(&self) -> &str;

    /// How long to wait for the ready marker
    fn load_timeout(&self) -> Duration {
        DEFAULT_PAGE_LOAD_TIMEOUT
    }

    /// Name for logs
    fn page_name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Data-only page object with named selectors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimplePage {
    name: String,
    url_path: String,
    ready_selector: String,
    load_timeout: Duration,
    selectors: HashMap<String, String>,
}

impl SimplePage {
    /// Create a page
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        url_path: impl Into<String>,
        ready_selector: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            url_path: url_path.into(),
            ready_selector: ready_selector.into(),
            load_timeout: DEFAULT_PAGE_LOAD_TIMEOUT,
            selectors: HashMap::new(),
        }
    }

    /// Register a named selector
    #[must_use]
    pub fn with_selector(mut self, name: impl Into<String>, selector: impl Into<String>) -> Self {
        let _ = self.selectors.insert(name.into(), selector.into());
        self
    }

    /// Set the load timeout
    #[must_use]
    pub const fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Look up a named selector
    #[must_use]
    pub fn selector(&self, name: &str) -> Option<&str> {
        self.selectors.get(name).map(String::as_str)
    }

    /// Registered selector names, sorted
    #[must_use]
    pub fn selector_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.selectors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl PageObject for SimplePage {
    fn url_path(&self) -> &str {
        &self.url_path
    }

    fn ready_selector(&self) -> &str {
        &self.ready_selector
    }

    fn load_timeout(&self) -> Duration {
        self.load_timeout
    }

    fn page_name(&self) -> &str {
        &self.name
    }
}

/// Path pattern such as `/manage/:address` or `/invest/*`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlMatcher {
    pattern: String,
    segments: Vec<UrlSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum UrlSegment {
    Literal(String),
    Wildcard,
    Parameter(String),
}

/// Path segments of a URL, without scheme, host, query or fragment
fn path_segments(url: &str) -> Vec<&str> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| {
        rest.find('/').map_or("", |i| &rest[i..])
    });
    let path = rest.split(['?', '#']).next().unwrap_or_default();
    path.split('/').filter(|s| !s.is_empty()).collect()
}

impl UrlMatcher {
    /// Parse a pattern
    #[must_use]
    pub fn new(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                "*" => UrlSegment::Wildcard,
                _ => s.strip_prefix(':').map_or_else(
                    || UrlSegment::Literal(s.to_string()),
                    |name| UrlSegment::Parameter(name.to_string()),
                ),
            })
            .collect();
        Self {
            pattern: pattern.to_string(),
            segments,
        }
    }

    /// Whether a full URL or a bare path matches
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        let parts = path_segments(url);
        parts.len() == self.segments.len()
            && self.segments.iter().zip(&parts).all(|(seg, part)| match seg {
                UrlSegment::Literal(lit) => lit == part,
                UrlSegment::Wildcard | UrlSegment::Parameter(_) => true,
            })
    }

    /// Named parameters of a matching URL; `None` when it does not match
    #[must_use]
    pub fn captures(&self, url: &str) -> Option<HashMap<String, String>> {
        if !self.matches(url) {
            return None;
        }
        let parts = path_segments(url);
        Some(
            self.segments
                .iter()
                .zip(parts)
                .filter_map(|(seg, part)| match seg {
                    UrlSegment::Parameter(name) => Some((name.clone(), part.to_string())),
                    _ => None,
                })
                .collect(),
        )
    }

    /// Get the pattern
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}
