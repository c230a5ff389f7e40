//! Catalog listing extraction: selectors, record model, field extraction and the card walker.

pub mod description;
pub mod extractor;
pub mod models;
pub mod selectors;
pub mod walker;

pub use description::DescriptionFetcher;
pub use extractor::{ExtractError, FieldExtractor};
pub use models::{CardFields, FieldValue, ListingRecord};
pub use selectors::{Field, SelectorMap};
pub use walker::ListingWalker;
