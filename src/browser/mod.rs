//! Browser-automation seam: locators, page/element handles and session launchers.
//!
//! Everything above this module talks to [`Launcher`], [`Page`] and [`Element`]
//! only, so the pipeline runs unchanged against a live WebDriver session or a
//! saved HTML document.

pub mod fixture;
pub mod wait;
pub mod webdriver;

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

pub use fixture::{FixtureLauncher, FixtureSite};
pub use wait::BoundedWait;
pub use webdriver::WebDriverLauncher;

/// How to locate an element in a rendered document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// Class name; whitespace-separated names must all be present.
    Class(String),
    /// CSS selector.
    Css(String),
    /// XPath expression (WebDriver backend only).
    XPath(String),
    /// Elements of `tag` whose own text contains `needle`.
    OwnText { tag: String, needle: String },
}

impl Locator {
    pub fn class(name: impl Into<String>) -> Self {
        Locator::Class(name.into())
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn own_text(tag: impl Into<String>, needle: impl Into<String>) -> Self {
        Locator::OwnText { tag: tag.into(), needle: needle.into() }
    }

    /// CSS form of the locator, if it has one.
    pub fn to_css(&self) -> Option<String> {
        match self {
            Locator::Class(name) => {
                let classes: Vec<&str> = name.split_whitespace().collect();
                Some(format!(".{}", classes.join(".")))
            }
            Locator::Css(selector) => Some(selector.clone()),
            Locator::XPath(_) | Locator::OwnText { .. } => None,
        }
    }

    /// XPath form of the locator, if it has one.
    pub fn to_xpath(&self) -> Option<String> {
        match self {
            Locator::XPath(expr) => Some(expr.clone()),
            Locator::OwnText { tag, needle } => {
                Some(format!("//{}[contains(text(), '{}')]", tag, needle))
            }
            Locator::Class(_) | Locator::Css(_) => None,
        }
    }
}

impl FromStr for Locator {
    type Err = String;

    /// Parses `css:<selector>`, `xpath:<expr>` or a bare class name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (locator, body) = if let Some(rest) = s.strip_prefix("css:") {
            (Locator::Css(rest.trim().to_string()), rest)
        } else if let Some(rest) = s.strip_prefix("xpath:") {
            (Locator::XPath(rest.trim().to_string()), rest)
        } else {
            (Locator::Class(s.to_string()), s)
        };

        if body.trim().is_empty() {
            return Err(format!("Empty selector: '{}'", s));
        }

        Ok(locator)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Class(name) => write!(f, "{}", name),
            Locator::Css(selector) => write!(f, "css:{}", selector),
            Locator::XPath(expr) => write!(f, "xpath:{}", expr),
            Locator::OwnText { tag, needle } => write!(f, "{} containing '{}'", tag, needle),
        }
    }
}

/// Failures raised by a browser backend.
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    /// The browser or its driver could not be started.
    #[error("Failed to start browser session: {0}")]
    SessionCreation(String),

    /// Loading a URL failed.
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// Nothing matched the locator. Expected during extraction.
    #[error("No element matches {0}")]
    NotFound(Locator),

    /// A bounded wait ran out of time.
    #[error("Timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },

    /// The backend cannot evaluate this kind of locator.
    #[error("Locator {0} is not supported by this backend")]
    Unsupported(Locator),

    /// Any other browser command failure.
    #[error("Browser command failed: {0}")]
    Command(String),
}

impl BrowserError {
    /// True when the error only signals an absent element.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BrowserError::NotFound(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BrowserError::Timeout { .. })
    }
}

/// Handle to a node in a live document. Only valid while its session is open.
#[async_trait(?Send)]
pub trait Element: Sized {
    /// First descendant matching the locator.
    async fn find(&self, locator: &Locator) -> Result<Self, BrowserError>;

    /// All descendants matching the locator, in document order.
    async fn find_all(&self, locator: &Locator) -> Result<Vec<Self>, BrowserError>;

    /// Visible text, trimmed.
    async fn text(&self) -> Result<String, BrowserError>;

    async fn attr(&self, name: &str) -> Result<Option<String>, BrowserError>;
}

/// One browser session showing one document at a time.
#[async_trait(?Send)]
pub trait Page: Sized {
    type Element: Element;

    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    /// All elements in the document matching the locator, in document order.
    async fn find_all(&self, locator: &Locator) -> Result<Vec<Self::Element>, BrowserError>;

    /// Scrolls half-way down so lazily rendered content gets loaded.
    async fn scroll_to_middle(&self) -> Result<(), BrowserError>;

    /// Ends the session. Consumes the page so it is released at most once.
    async fn close(self) -> Result<(), BrowserError>;
}

/// Driver provisioning: opens new browser sessions.
#[async_trait(?Send)]
pub trait Launcher {
    type Page: Page;

    async fn launch(&self) -> Result<Self::Page, BrowserError>;
}

/// Closes a session, logging instead of failing when the browser misbehaves.
pub async fn release<P: Page>(page: P, role: &str) {
    match page.close().await {
        Ok(()) => debug!("Closed {} session", role),
        Err(e) => warn!("Failed to close {} session: {}", role, e),
    }
}
