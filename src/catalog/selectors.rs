//! Listing fields, their sentinels and the selectors used to find them.
//!
//! Catalog markup changes without notice. When extraction starts returning
//! sentinels, capture the page, update `catalog.toml` (or add a fallback
//! there) and extend the fixtures.

use crate::browser::Locator;
use crate::config::{CatalogSettings, ConfigError};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Element keys that are not record fields.
pub mod keys {
    /// One product card on the catalog page.
    pub const PRODUCT_CARD: &str = "product_card";

    /// Wrapper holding the rating score and review count.
    pub const RATING_CONTAINER: &str = "rating_container";
}

/// Built-in description lookups tried after the configured ones.
pub mod description {
    use super::*;

    /// Product-description container, any element with "description" in its
    /// class, then any div whose own text mentions "Description".
    pub static TIERS: LazyLock<[Locator; 3]> = LazyLock::new(|| {
        [
            Locator::css("div[data-test='product-description']"),
            Locator::css("div[class*='description']"),
            Locator::own_text("div", "Description"),
        ]
    });
}

/// The fixed set of fields every listing record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Title,
    Author,
    CurrentPrice,
    ListPrice,
    Discount,
    Rating,
    ReviewCount,
    StockStatus,
    StockLocations,
    ProductUrl,
    Description,
}

impl Field {
    /// All fields in record order.
    pub const ALL: [Field; 11] = [
        Field::Title,
        Field::Author,
        Field::CurrentPrice,
        Field::ListPrice,
        Field::Discount,
        Field::Rating,
        Field::ReviewCount,
        Field::StockStatus,
        Field::StockLocations,
        Field::ProductUrl,
        Field::Description,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Author => "author",
            Field::CurrentPrice => "current_price",
            Field::ListPrice => "list_price",
            Field::Discount => "discount",
            Field::Rating => "rating",
            Field::ReviewCount => "review_count",
            Field::StockStatus => "stock_status",
            Field::StockLocations => "stock_locations",
            Field::ProductUrl => "product_url",
            Field::Description => "description",
        }
    }

    /// Element key in the catalog configuration.
    pub fn element_key(&self) -> &'static str {
        match self {
            Field::ProductUrl => "product_link",
            other => other.name(),
        }
    }

    /// Placeholder used when the field cannot be read.
    ///
    /// `stock_locations` has none: it falls back to an empty list.
    pub fn sentinel(&self) -> Option<&'static str> {
        match self {
            Field::Title => Some("No title found"),
            Field::Author => Some("No author found"),
            Field::CurrentPrice => Some("No price found"),
            Field::ListPrice => Some("No list price"),
            Field::Discount => Some("No discount"),
            Field::Rating => Some("No rating"),
            Field::ReviewCount => Some("No reviews"),
            Field::StockStatus => Some("Stock status unknown"),
            Field::StockLocations => None,
            Field::ProductUrl => Some("No product URL"),
            Field::Description => Some("No description found"),
        }
    }

    /// Sentinel as an owned string; empty for `stock_locations`.
    pub fn sentinel_text(&self) -> String {
        self.sentinel().unwrap_or_default().to_string()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Catalog selectors resolved and validated up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorMap {
    pub product_card: Locator,
    pub rating_container: Locator,
    chains: HashMap<Field, Vec<Locator>>,
}

impl SelectorMap {
    /// Builds the map, failing on any missing or unparsable selector.
    pub fn from_catalog(catalog: &CatalogSettings) -> Result<Self, ConfigError> {
        let product_card = required(catalog, keys::PRODUCT_CARD)?;
        let rating_container = required(catalog, keys::RATING_CONTAINER)?;

        let mut chains = HashMap::new();
        for field in Field::ALL {
            let key = field.element_key();
            let mut chain = vec![required(catalog, key)?];

            for extra in catalog.fallbacks.get(key).into_iter().flatten() {
                chain.push(parse(key, extra)?);
            }

            chains.insert(field, chain);
        }

        Ok(Self { product_card, rating_container, chains })
    }

    /// Primary selector followed by configured fallbacks.
    pub fn chain(&self, field: Field) -> &[Locator] {
        self.chains.get(&field).map(Vec::as_slice).unwrap_or_default()
    }
}

fn required(catalog: &CatalogSettings, key: &str) -> Result<Locator, ConfigError> {
    let raw =
        catalog.elements.get(key).ok_or_else(|| ConfigError::MissingElement(key.to_string()))?;
    parse(key, raw)
}

fn parse(key: &str, raw: &str) -> Result<Locator, ConfigError> {
    raw.parse().map_err(|reason| ConfigError::InvalidSelector { key: key.to_string(), reason })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Catalog settings matching the HTML produced by the test fixtures.
    pub(crate) fn make_test_catalog() -> CatalogSettings {
        let mut catalog = CatalogSettings::default();
        catalog.urls.insert("new_books".to_string(), "https://shop.test/books/new".to_string());

        for (key, value) in [
            ("product_card", "product-card"),
            ("title", "product-title"),
            ("author", "product-author"),
            ("current_price", "price"),
            ("list_price", "list-price"),
            ("discount", "discount-badge"),
            ("rating_container", "rating-container"),
            ("rating", "rating-score"),
            ("review_count", "rating-count"),
            ("stock_status", "stock-status"),
            ("stock_locations", "stock-pill"),
            ("product_link", "product-anchor"),
            ("description", "css:div[data-test='product-description'] div[class*='description']"),
        ] {
            catalog.elements.insert(key.to_string(), value.to_string());
        }

        catalog
    }

    #[test]
    fn test_field_names_and_keys() {
        assert_eq!(Field::ALL.len(), 11);
        assert_eq!(Field::CurrentPrice.name(), "current_price");
        assert_eq!(Field::ProductUrl.name(), "product_url");
        assert_eq!(Field::ProductUrl.element_key(), "product_link");
        assert_eq!(Field::Title.element_key(), "title");
        assert_eq!(Field::StockLocations.to_string(), "stock_locations");
    }

    #[test]
    fn test_sentinels() {
        assert_eq!(Field::ListPrice.sentinel(), Some("No list price"));
        assert_eq!(Field::Rating.sentinel(), Some("No rating"));
        assert_eq!(Field::ReviewCount.sentinel(), Some("No reviews"));
        assert_eq!(Field::Description.sentinel(), Some("No description found"));
        assert!(Field::StockLocations.sentinel().is_none());
        assert_eq!(Field::StockLocations.sentinel_text(), "");

        for field in Field::ALL {
            if field != Field::StockLocations {
                assert!(!field.sentinel_text().is_empty(), "{} has no sentinel", field);
            }
        }
    }

    #[test]
    fn test_description_tiers() {
        assert_eq!(description::TIERS.len(), 3);
        assert_eq!(description::TIERS[2], Locator::own_text("div", "Description"));
    }

    #[test]
    fn test_selector_map_from_catalog() {
        let map = SelectorMap::from_catalog(&make_test_catalog()).unwrap();

        assert_eq!(map.product_card, Locator::class("product-card"));
        assert_eq!(map.rating_container, Locator::class("rating-container"));
        assert_eq!(map.chain(Field::Title), &[Locator::class("product-title")]);
        assert_eq!(map.chain(Field::ProductUrl), &[Locator::class("product-anchor")]);
        assert!(matches!(map.chain(Field::Description)[0], Locator::Css(_)));
    }

    #[test]
    fn test_selector_map_fallbacks_in_order() {
        let mut catalog = make_test_catalog();
        catalog
            .fallbacks
            .insert("title".to_string(), vec!["css:h3".to_string(), "name".to_string()]);

        let map = SelectorMap::from_catalog(&catalog).unwrap();
        assert_eq!(
            map.chain(Field::Title),
            &[Locator::class("product-title"), Locator::css("h3"), Locator::class("name")]
        );
    }

    #[test]
    fn test_selector_map_missing_key() {
        let mut catalog = make_test_catalog();
        catalog.elements.remove("discount");

        let err = SelectorMap::from_catalog(&catalog).unwrap_err();
        assert!(matches!(err, ConfigError::MissingElement(ref key) if key == "discount"));

        let mut catalog = make_test_catalog();
        catalog.elements.remove("product_card");
        assert!(SelectorMap::from_catalog(&catalog).is_err());
    }

    #[test]
    fn test_selector_map_invalid_selector() {
        let mut catalog = make_test_catalog();
        catalog.elements.insert("author".to_string(), "css:".to_string());

        let err = SelectorMap::from_catalog(&catalog).unwrap_err();
        assert!(err.to_string().contains("'author'"));

        let mut catalog = make_test_catalog();
        catalog.fallbacks.insert("author".to_string(), vec!["xpath:".to_string()]);
        assert!(SelectorMap::from_catalog(&catalog).is_err());
    }
}
