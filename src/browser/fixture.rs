//! Offline browser backend serving saved HTML documents.
//!
//! Pages are parsed with `scraper`; element handles keep a detached copy of
//! their subtree. Used by the `--offline` mode and by the test suite.

use crate::browser::{BrowserError, Element, Launcher, Locator, Page};
use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use tracing::debug;

/// Saved documents keyed by URL.
#[derive(Debug, Clone, Default)]
pub struct FixtureSite {
    pages: HashMap<String, String>,
    broken: HashMap<String, String>,
}

impl FixtureSite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `html` at `url`.
    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    /// Makes navigation to `url` fail with `reason`.
    pub fn with_broken_page(mut self, url: impl Into<String>, reason: impl Into<String>) -> Self {
        self.broken.insert(url.into(), reason.into());
        self
    }

    /// Serves the contents of a saved HTML file at `url`.
    pub fn with_file(self, url: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let html = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read HTML file: {}", path.display()))?;
        Ok(self.with_page(url, html))
    }

    fn load(&self, url: &str) -> Result<&str, BrowserError> {
        if let Some(reason) = self.broken.get(url) {
            return Err(BrowserError::Navigation { url: url.to_string(), reason: reason.clone() });
        }

        self.pages.get(url).map(String::as_str).ok_or_else(|| BrowserError::Navigation {
            url: url.to_string(),
            reason: "no saved document for this URL".to_string(),
        })
    }
}

/// Session bookkeeping shared by a launcher and its pages.
#[derive(Debug, Default)]
pub struct SessionStats {
    launched: Cell<usize>,
    closed: Cell<usize>,
}

impl SessionStats {
    pub fn launched(&self) -> usize {
        self.launched.get()
    }

    pub fn closed(&self) -> usize {
        self.closed.get()
    }

    /// Sessions launched but not yet closed.
    pub fn open(&self) -> usize {
        self.launched.get() - self.closed.get()
    }
}

/// Launches in-process sessions over a [`FixtureSite`].
pub struct FixtureLauncher {
    site: Rc<FixtureSite>,
    stats: Rc<SessionStats>,
    refuse: bool,
}

impl FixtureLauncher {
    pub fn new(site: FixtureSite) -> Self {
        Self { site: Rc::new(site), stats: Rc::new(SessionStats::default()), refuse: false }
    }

    /// A launcher whose browser never starts.
    pub fn unavailable() -> Self {
        Self { refuse: true, ..Self::new(FixtureSite::new()) }
    }

    pub fn stats(&self) -> Rc<SessionStats> {
        Rc::clone(&self.stats)
    }
}

#[async_trait(?Send)]
impl Launcher for FixtureLauncher {
    type Page = FixturePage;

    async fn launch(&self) -> Result<FixturePage, BrowserError> {
        if self.refuse {
            return Err(BrowserError::SessionCreation("fixture browser unavailable".to_string()));
        }

        self.stats.launched.set(self.stats.launched.get() + 1);
        debug!("Launched fixture session #{}", self.stats.launched.get());

        Ok(FixturePage {
            site: Rc::clone(&self.site),
            stats: Rc::clone(&self.stats),
            document: RefCell::new(None),
        })
    }
}

/// A session showing one saved document.
pub struct FixturePage {
    site: Rc<FixtureSite>,
    stats: Rc<SessionStats>,
    document: RefCell<Option<Rc<Html>>>,
}

impl FixturePage {
    fn document(&self) -> Result<Rc<Html>, BrowserError> {
        self.document
            .borrow()
            .clone()
            .ok_or_else(|| BrowserError::Command("no document loaded".to_string()))
    }
}

#[async_trait(?Send)]
impl Page for FixturePage {
    type Element = FixtureElement;

    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        let html = self.site.load(url)?;
        *self.document.borrow_mut() = Some(Rc::new(Html::parse_document(html)));
        Ok(())
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<FixtureElement>, BrowserError> {
        let document = self.document()?;
        let found = matching(document.root_element(), locator)?;
        Ok(found.into_iter().map(FixtureElement::capture).collect())
    }

    async fn scroll_to_middle(&self) -> Result<(), BrowserError> {
        self.document().map(|_| ())
    }

    async fn close(self) -> Result<(), BrowserError> {
        self.stats.closed.set(self.stats.closed.get() + 1);
        Ok(())
    }
}

/// Detached copy of a matched element and its subtree.
#[derive(Debug, Clone)]
pub struct FixtureElement {
    fragment: Rc<Html>,
}

impl FixtureElement {
    fn capture(element: ElementRef<'_>) -> Self {
        Self { fragment: Rc::new(Html::parse_fragment(&element.html())) }
    }

    fn root(&self) -> Result<ElementRef<'_>, BrowserError> {
        self.fragment
            .root_element()
            .children()
            .find_map(ElementRef::wrap)
            .ok_or_else(|| BrowserError::Command("stale element".to_string()))
    }
}

#[async_trait(?Send)]
impl Element for FixtureElement {
    async fn find(&self, locator: &Locator) -> Result<Self, BrowserError> {
        matching(self.root()?, locator)?
            .into_iter()
            .next()
            .map(FixtureElement::capture)
            .ok_or_else(|| BrowserError::NotFound(locator.clone()))
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<Self>, BrowserError> {
        let found = matching(self.root()?, locator)?;
        Ok(found.into_iter().map(FixtureElement::capture).collect())
    }

    async fn text(&self) -> Result<String, BrowserError> {
        let raw: String = self.root()?.text().collect();
        Ok(raw.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    async fn attr(&self, name: &str) -> Result<Option<String>, BrowserError> {
        Ok(self.root()?.value().attr(name).map(String::from))
    }
}

/// Descendants of `root` matching `locator`, in document order.
fn matching<'a>(root: ElementRef<'a>, locator: &Locator) -> Result<Vec<ElementRef<'a>>, BrowserError> {
    match locator {
        Locator::Class(_) | Locator::Css(_) => {
            let css = locator.to_css().unwrap_or_default();
            let selector = parse_selector(&css)?;
            Ok(root.select(&selector).collect())
        }
        Locator::OwnText { tag, needle } => {
            let selector = parse_selector(tag)?;
            Ok(root.select(&selector).filter(|el| owns_text(el, needle)).collect())
        }
        Locator::XPath(_) => Err(BrowserError::Unsupported(locator.clone())),
    }
}

fn parse_selector(css: &str) -> Result<Selector, BrowserError> {
    Selector::parse(css)
        .map_err(|e| BrowserError::Command(format!("invalid selector '{}': {:?}", css, e)))
}

/// True if one of the element's own text nodes contains `needle`.
fn owns_text(element: &ElementRef<'_>, needle: &str) -> bool {
    element.children().filter_map(|child| child.value().as_text()).any(|text| text.contains(needle))
}
