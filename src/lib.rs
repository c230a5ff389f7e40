//! listing-scraper - browser-driven catalog listing scraper
//!
//! Opens a catalog page in a real browser, waits for the product cards to
//! render and extracts a fixed set of fields from each card, optionally
//! following every product link for its description.

pub mod browser;
pub mod catalog;
pub mod commands;
pub mod config;

pub use catalog::{Field, FieldValue, ListingRecord};
pub use config::Config;
