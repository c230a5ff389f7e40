//! Field extraction from a single product card.
//!
//! Every field is resolved on its own: a miss substitutes the field's sentinel
//! and an unexpected browser error is logged and defaulted, so one broken field
//! never stops its siblings.

use crate::browser::{BrowserError, Element, Locator};
use crate::catalog::models::CardFields;
use crate::catalog::selectors::{Field, SelectorMap};
use tracing::{trace, warn};
use url::Url;

/// Outcome of a lookup chain.
#[derive(Debug)]
pub enum Lookup {
    /// First non-empty text.
    Found(String),
    /// Something matched, but its text was blank.
    Empty,
    /// Nothing matched.
    Absent,
    /// Nothing usable was found and at least one lookup failed unexpectedly.
    Failed(BrowserError),
}

/// First non-empty text among `elements`.
pub async fn first_text_of<E: Element>(elements: &[E]) -> Lookup {
    if elements.is_empty() {
        return Lookup::Absent;
    }

    let mut failure = None;
    for element in elements {
        match element.text().await {
            Ok(text) if !text.trim().is_empty() => return Lookup::Found(text.trim().to_string()),
            Ok(_) => {}
            Err(e) => failure = Some(e),
        }
    }

    failure.map_or(Lookup::Empty, Lookup::Failed)
}

/// Tries each locator inside `root` in order; the first non-empty text wins.
pub async fn first_text<E: Element>(root: &E, chain: &[Locator]) -> Lookup {
    let mut matched = false;
    let mut failure = None;

    for locator in chain {
        match root.find(locator).await {
            Ok(element) => match element.text().await {
                Ok(text) if !text.trim().is_empty() => {
                    return Lookup::Found(text.trim().to_string());
                }
                Ok(_) => matched = true,
                Err(e) => failure = Some(e),
            },
            Err(e) if e.is_not_found() => {}
            Err(e) => failure = Some(e),
        }
    }

    match (matched, failure) {
        (true, _) => Lookup::Empty,
        (false, Some(e)) => Lookup::Failed(e),
        (false, None) => Lookup::Absent,
    }
}

/// Why a card produced no record.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("No field selector matched the product card")]
    Unmatched,

    #[error("Product card could not be read: {0}")]
    Container(#[source] BrowserError),
}

/// Per-card bookkeeping used to tell an unmatched card from a sparse one.
#[derive(Debug, Default)]
struct Tally {
    matched: usize,
    failures: Vec<(Field, BrowserError)>,
}

impl Tally {
    fn verdict(mut self) -> Result<(), ExtractError> {
        if self.matched > 0 {
            return Ok(());
        }

        if self.failures.is_empty() {
            Err(ExtractError::Unmatched)
        } else {
            let (_, first) = self.failures.swap_remove(0);
            Err(ExtractError::Container(first))
        }
    }
}

/// Reads the card-level fields of a listing.
pub struct FieldExtractor<'a> {
    selectors: &'a SelectorMap,
    base: Option<Url>,
}

impl<'a> FieldExtractor<'a> {
    /// `page_url` is used to resolve relative product links.
    pub fn new(selectors: &'a SelectorMap, page_url: &str) -> Self {
        Self { selectors, base: Url::parse(page_url).ok() }
    }

    /// Extracts all card fields. Fails only when the card matched nothing at all.
    pub async fn extract<E: Element>(&self, card: &E) -> Result<CardFields, ExtractError> {
        let mut tally = Tally::default();

        let title = self.text_field(card, Field::Title, &mut tally).await;
        let author = self.text_field(card, Field::Author, &mut tally).await;
        let current_price = self.text_field(card, Field::CurrentPrice, &mut tally).await;
        let list_price = self.text_field(card, Field::ListPrice, &mut tally).await;
        let discount = self.text_field(card, Field::Discount, &mut tally).await;
        let (rating, review_count) = self.rating(card, &mut tally).await;
        let stock_status = self.text_field(card, Field::StockStatus, &mut tally).await;
        let stock_locations = self.stock_locations(card, &mut tally).await;
        let product_url = self.product_url(card, &mut tally).await;

        tally.verdict()?;

        Ok(CardFields {
            title,
            author,
            current_price,
            list_price,
            discount,
            rating,
            review_count,
            stock_status,
            stock_locations,
            product_url,
        })
    }

    async fn text_field<E: Element>(&self, scope: &E, field: Field, tally: &mut Tally) -> String {
        match first_text(scope, self.selectors.chain(field)).await {
            Lookup::Found(text) => {
                tally.matched += 1;
                text
            }
            Lookup::Empty => {
                tally.matched += 1;
                trace!("{} is blank", field);
                field.sentinel_text()
            }
            Lookup::Absent => {
                trace!("{} not present", field);
                field.sentinel_text()
            }
            Lookup::Failed(e) => {
                warn!("Failed to read {}: {}", field, e);
                tally.failures.push((field, e));
                field.sentinel_text()
            }
        }
    }

    /// Score and review count live inside one container; without it both default.
    async fn rating<E: Element>(&self, card: &E, tally: &mut Tally) -> (String, String) {
        let defaults = || (Field::Rating.sentinel_text(), Field::ReviewCount.sentinel_text());

        match card.find(&self.selectors.rating_container).await {
            Ok(container) => {
                tally.matched += 1;
                let rating = self.text_field(&container, Field::Rating, tally).await;
                let review_count = self.text_field(&container, Field::ReviewCount, tally).await;
                (rating, review_count)
            }
            Err(e) if e.is_not_found() => {
                trace!("No rating container");
                defaults()
            }
            Err(e) => {
                warn!("Failed to read rating container: {}", e);
                tally.failures.push((Field::Rating, e));
                defaults()
            }
        }
    }

    /// Text of every stock pill, in document order. Never a sentinel.
    async fn stock_locations<E: Element>(&self, card: &E, tally: &mut Tally) -> Vec<String> {
        for locator in self.selectors.chain(Field::StockLocations) {
            let pills = match card.find_all(locator).await {
                Ok(pills) if !pills.is_empty() => pills,
                Ok(_) => continue,
                Err(e) if e.is_not_found() => continue,
                Err(e) => {
                    warn!("Failed to read stock locations: {}", e);
                    tally.failures.push((Field::StockLocations, e));
                    continue;
                }
            };

            tally.matched += 1;
            let mut locations = Vec::with_capacity(pills.len());
            for pill in &pills {
                match pill.text().await {
                    Ok(text) => locations.push(text.trim().to_string()),
                    Err(e) => warn!("Skipping unreadable stock pill: {}", e),
                }
            }
            return locations;
        }

        Vec::new()
    }

    async fn product_url<E: Element>(&self, card: &E, tally: &mut Tally) -> String {
        let field = Field::ProductUrl;

        for locator in self.selectors.chain(field) {
            let link = match card.find(locator).await {
                Ok(link) => link,
                Err(e) if e.is_not_found() => continue,
                Err(e) => {
                    warn!("Failed to read product link: {}", e);
                    tally.failures.push((field, e));
                    continue;
                }
            };

            tally.matched += 1;
            match link.attr("href").await {
                Ok(Some(href)) if !href.trim().is_empty() => {
                    match resolve_href(self.base.as_ref(), href.trim()) {
                        Some(url) => return url,
                        None => warn!("Unusable product link: {}", href.trim()),
                    }
                }
                Ok(_) => trace!("Product link without href"),
                Err(e) => {
                    warn!("Failed to read product link href: {}", e);
                    tally.failures.push((field, e));
                }
            }
        }

        field.sentinel_text()
    }
}

/// Resolves a link against the catalog page URL. `None` when it is not a valid URL.
fn resolve_href(base: Option<&Url>, href: &str) -> Option<String> {
    let resolved = match base {
        Some(base) => base.join(href),
        None => Url::parse(href),
    };
    resolved.ok().map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fixture::{FixtureElement, FixtureLauncher, FixtureSite};
    use crate::browser::{Launcher, Page};
    use crate::catalog::selectors::tests::make_test_catalog;

    const URL: &str = "https://shop.test/books/new";

    const FULL_CARD: &str = r#"
        <div class="product-card">
            <a class="product-anchor" href="/p/dune/PLID1"><h3 class="product-title">Dune</h3></a>
            <div class="product-author">Frank Herbert</div>
            <span class="price">R 199</span>
            <span class="list-price">R 250</span>
            <div class="discount-badge">20% off</div>
            <div class="rating-container">
                <span class="rating-score">4.8</span>
                <span class="rating-count">(1203)</span>
            </div>
            <div class="stock-status">In stock</div>
            <span class="stock-pill">JHB</span>
            <span class="stock-pill">CPT</span>
        </div>
    "#;

    async fn card_from(html: &str) -> FixtureElement {
        let page_html = format!("<html><body>{}</body></html>", html);
        let launcher = FixtureLauncher::new(FixtureSite::new().with_page(URL, page_html));
        let page = launcher.launch().await.unwrap();
        page.goto(URL).await.unwrap();
        page.find_all(&Locator::class("product-card")).await.unwrap().remove(0)
    }

    fn selectors() -> SelectorMap {
        SelectorMap::from_catalog(&make_test_catalog()).unwrap()
    }

    #[tokio::test]
    async fn test_extract_all_fields_present() {
        let selectors = selectors();
        let extractor = FieldExtractor::new(&selectors, URL);
        let card = card_from(FULL_CARD).await;

        let fields = extractor.extract(&card).await.unwrap();
        assert_eq!(fields.title, "Dune");
        assert_eq!(fields.author, "Frank Herbert");
        assert_eq!(fields.current_price, "R 199");
        assert_eq!(fields.list_price, "R 250");
        assert_eq!(fields.discount, "20% off");
        assert_eq!(fields.rating, "4.8");
        assert_eq!(fields.review_count, "(1203)");
        assert_eq!(fields.stock_status, "In stock");
        assert_eq!(fields.stock_locations, vec!["JHB", "CPT"]);
        assert_eq!(fields.product_url, "https://shop.test/p/dune/PLID1");

        let record = fields.into_record("A desert planet.".to_string());
        assert!(record.sentinel_fields().is_empty());
    }

    #[tokio::test]
    async fn test_missing_list_price_is_isolated() {
        let selectors = selectors();
        let extractor = FieldExtractor::new(&selectors, URL);
        let card = card_from(&FULL_CARD.replace(r#"<span class="list-price">R 250</span>"#, "")).await;

        let fields = extractor.extract(&card).await.unwrap();
        assert_eq!(fields.list_price, "No list price");
        assert_eq!(fields.title, "Dune");
        assert_eq!(fields.current_price, "R 199");
        assert_eq!(fields.discount, "20% off");
        assert_eq!(fields.rating, "4.8");
        assert_eq!(fields.stock_locations, vec!["JHB", "CPT"]);
    }

    #[tokio::test]
    async fn test_missing_rating_container_defaults_both() {
        let selectors = selectors();
        let extractor = FieldExtractor::new(&selectors, URL);
        let html = FULL_CARD.replace("rating-container", "reviews-wrapper");
        let card = card_from(&html).await;

        let fields = extractor.extract(&card).await.unwrap();
        assert_eq!(fields.rating, "No rating");
        assert_eq!(fields.review_count, "No reviews");
        assert_eq!(fields.author, "Frank Herbert");
    }

    #[tokio::test]
    async fn test_missing_review_count_only() {
        let selectors = selectors();
        let extractor = FieldExtractor::new(&selectors, URL);
        let card = card_from(&FULL_CARD.replace(r#"<span class="rating-count">(1203)</span>"#, ""))
            .await;

        let fields = extractor.extract(&card).await.unwrap();
        assert_eq!(fields.rating, "4.8");
        assert_eq!(fields.review_count, "No reviews");
    }

    #[tokio::test]
    async fn test_no_stock_pills_is_empty_list() {
        let selectors = selectors();
        let extractor = FieldExtractor::new(&selectors, URL);
        let card = card_from(&FULL_CARD.replace("stock-pill", "unrelated")).await;

        let fields = extractor.extract(&card).await.unwrap();
        assert!(fields.stock_locations.is_empty());
        assert_eq!(fields.stock_status, "In stock");
    }

    #[tokio::test]
    async fn test_blank_text_uses_sentinel() {
        let selectors = selectors();
        let extractor = FieldExtractor::new(&selectors, URL);
        let html = FULL_CARD.replace(">Frank Herbert<", ">   <");
        let card = card_from(&html).await;

        let fields = extractor.extract(&card).await.unwrap();
        assert_eq!(fields.author, "No author found");
    }

    #[tokio::test]
    async fn test_fallback_selector_used_when_primary_missing() {
        let mut catalog = make_test_catalog();
        catalog.fallbacks.insert("title".to_string(), vec!["css:h3".to_string()]);
        let selectors = SelectorMap::from_catalog(&catalog).unwrap();
        let extractor = FieldExtractor::new(&selectors, URL);

        let html = FULL_CARD.replace(r#"class="product-title""#, r#"class="renamed""#);
        let card = card_from(&html).await;

        let fields = extractor.extract(&card).await.unwrap();
        assert_eq!(fields.title, "Dune");
    }

    #[tokio::test]
    async fn test_unexpected_field_error_is_defaulted() {
        let mut catalog = make_test_catalog();
        // The offline backend cannot evaluate XPath, which surfaces as an unexpected error.
        catalog.elements.insert("discount".to_string(), "xpath://div[@class='x']".to_string());
        let selectors = SelectorMap::from_catalog(&catalog).unwrap();
        let extractor = FieldExtractor::new(&selectors, URL);
        let card = card_from(FULL_CARD).await;

        let fields = extractor.extract(&card).await.unwrap();
        assert_eq!(fields.discount, "No discount");
        assert_eq!(fields.title, "Dune");
        assert_eq!(fields.list_price, "R 250");
    }

    #[tokio::test]
    async fn test_unmatched_card() {
        let selectors = selectors();
        let extractor = FieldExtractor::new(&selectors, URL);
        let card = card_from(r#"<div class="product-card"><p>Sponsored</p></div>"#).await;

        let err = extractor.extract(&card).await.unwrap_err();
        assert!(matches!(err, ExtractError::Unmatched));
    }

    #[tokio::test]
    async fn test_card_with_only_failures_is_container_error() {
        let mut catalog = make_test_catalog();
        for key in ["title", "author", "current_price", "list_price", "discount", "stock_status"] {
            catalog.elements.insert(key.to_string(), "xpath://span".to_string());
        }
        catalog.elements.insert("rating_container".to_string(), "xpath://div".to_string());
        catalog.elements.insert("stock_locations".to_string(), "xpath://li".to_string());
        catalog.elements.insert("product_link".to_string(), "xpath://a".to_string());
        let selectors = SelectorMap::from_catalog(&catalog).unwrap();
        let extractor = FieldExtractor::new(&selectors, URL);
        let card = card_from(FULL_CARD).await;

        let err = extractor.extract(&card).await.unwrap_err();
        assert!(matches!(err, ExtractError::Container(BrowserError::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_missing_link_uses_sentinel() {
        let selectors = selectors();
        let extractor = FieldExtractor::new(&selectors, URL);
        let card = card_from(&FULL_CARD.replace(r#" href="/p/dune/PLID1""#, "")).await;

        let fields = extractor.extract(&card).await.unwrap();
        assert_eq!(fields.product_url, "No product URL");
        assert!(!fields.has_product_url());
    }

    #[tokio::test]
    async fn test_first_text_of() {
        let card = card_from(FULL_CARD).await;
        let pills = card.find_all(&Locator::class("stock-pill")).await.unwrap();

        assert!(matches!(first_text_of(&pills).await, Lookup::Found(ref t) if t == "JHB"));
        assert!(matches!(first_text_of::<FixtureElement>(&[]).await, Lookup::Absent));
    }

    #[tokio::test]
    async fn test_relative_link_resolved_against_page() {
        let selectors = selectors();
        let extractor = FieldExtractor::new(&selectors, URL);
        let card = card_from(&FULL_CARD.replace("/p/dune/PLID1", "dune/PLID1")).await;

        let fields = extractor.extract(&card).await.unwrap();
        assert_eq!(fields.product_url, "https://shop.test/books/dune/PLID1");
    }

    #[tokio::test]
    async fn test_unusable_link_uses_sentinel() {
        let selectors = selectors();
        let extractor = FieldExtractor::new(&selectors, URL);
        let card = card_from(&FULL_CARD.replace("/p/dune/PLID1", "http://[broken")).await;

        let fields = extractor.extract(&card).await.unwrap();
        assert_eq!(fields.product_url, "No product URL");
        assert_eq!(fields.title, "Dune");
    }

    #[test]
    fn test_resolve_href() {
        let base = Url::parse(URL).unwrap();
        let base = Some(&base);
        assert_eq!(resolve_href(base, "https://other.test/p/1").as_deref(), Some("https://other.test/p/1"));
        assert_eq!(resolve_href(base, "/p/1").as_deref(), Some("https://shop.test/p/1"));
        assert_eq!(resolve_href(base, "//cdn.test/p/1").as_deref(), Some("https://cdn.test/p/1"));
        assert_eq!(resolve_href(base, "p/1").as_deref(), Some("https://shop.test/books/p/1"));
        assert_eq!(resolve_href(base, "../p/1").as_deref(), Some("https://shop.test/p/1"));
        assert_eq!(resolve_href(base, "http://[broken"), None);
    }

    #[test]
    fn test_resolve_href_without_base() {
        assert_eq!(resolve_href(None, "https://shop.test/p/1").as_deref(), Some("https://shop.test/p/1"));
        assert_eq!(resolve_href(None, "/p/1"), None);

        let base = Url::parse("https://shop.test?x=1").unwrap();
        assert_eq!(resolve_href(Some(&base), "/p/1").as_deref(), Some("https://shop.test/p/1"));
    }
}
