//! CLI command implementations.

pub mod scrape;

pub use scrape::{RunPlan, RunReport, RunState, ScrapeCommand};
