//! Product description lookup through a short-lived secondary session.

use crate::browser::{release, BoundedWait, BrowserError, Launcher, Locator, Page};
use crate::catalog::extractor::{first_text_of, Lookup};
use crate::catalog::selectors::{description, Field, SelectorMap};
use tracing::{debug, trace, warn};

/// Opens each product page in its own session and reads the description.
pub struct DescriptionFetcher<'a, L: Launcher> {
    launcher: &'a L,
    selectors: &'a SelectorMap,
    wait: BoundedWait,
}

impl<'a, L: Launcher> DescriptionFetcher<'a, L> {
    pub fn new(launcher: &'a L, selectors: &'a SelectorMap, wait: BoundedWait) -> Self {
        Self { launcher, selectors, wait }
    }

    /// Description text, or the sentinel when none could be read. Never fails.
    pub async fn fetch(&self, product_url: &str) -> String {
        match self.try_fetch(product_url).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                debug!("No description found at {}", product_url);
                Field::Description.sentinel_text()
            }
            Err(e) => {
                warn!("Failed to get product description from {}: {}", product_url, e);
                Field::Description.sentinel_text()
            }
        }
    }

    /// The secondary session never outlives this call.
    async fn try_fetch(&self, product_url: &str) -> Result<Option<String>, BrowserError> {
        let page = self.launcher.launch().await?;
        let outcome = self.read(&page, product_url).await;
        release(page, "description").await;
        outcome
    }

    /// Only the primary selector gets a bounded wait. Configured fallbacks and
    /// the built-in tiers are looked up once each, after that wait has ended.
    async fn read<P: Page>(&self, page: &P, product_url: &str) -> Result<Option<String>, BrowserError> {
        page.goto(product_url).await?;

        if let Err(e) = page.scroll_to_middle().await {
            debug!("Could not scroll product page: {}", e);
        }

        let configured = self.selectors.chain(Field::Description);
        let mut failure = None;

        // Give the primary selector time to render before falling back.
        if let Some(primary) = configured.first() {
            match self.wait.for_elements(page, primary).await {
                Ok(found) => match first_text_of(&found).await {
                    Lookup::Found(text) => return Ok(Some(text)),
                    Lookup::Failed(e) => failure = Some(e),
                    Lookup::Empty | Lookup::Absent => {}
                },
                Err(e) => trace!("Primary description selector unavailable: {}", e),
            }
        }

        let fallbacks = configured.iter().skip(1).chain(description::TIERS.iter());
        for locator in fallbacks {
            match self.lookup(page, locator).await {
                Lookup::Found(text) => {
                    trace!("Description found via {}", locator);
                    return Ok(Some(text));
                }
                Lookup::Failed(e) => failure = Some(e),
                Lookup::Empty | Lookup::Absent => {}
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    async fn lookup<P: Page>(&self, page: &P, locator: &Locator) -> Lookup {
        match page.find_all(locator).await {
            Ok(found) => first_text_of(&found).await,
            Err(e) if e.is_not_found() => Lookup::Absent,
            Err(e) => Lookup::Failed(e),
        }
    }
}
