//! Walks located product cards and yields one record per card.

use crate::browser::{Element, Launcher};
use crate::catalog::description::DescriptionFetcher;
use crate::catalog::extractor::FieldExtractor;
use crate::catalog::models::ListingRecord;
use crate::catalog::selectors::Field;
use std::iter::Enumerate;
use std::vec::IntoIter;
use tracing::{info, warn};

/// Lazy, single-pass sequence of records in document order.
///
/// Cards that cannot be extracted are logged and skipped. When a description
/// fetcher is set, each card opens (and closes) its own secondary session.
pub struct ListingWalker<'a, E: Element, L: Launcher> {
    cards: Enumerate<IntoIter<E>>,
    extractor: FieldExtractor<'a>,
    descriptions: Option<DescriptionFetcher<'a, L>>,
    skipped: usize,
}

impl<'a, E: Element, L: Launcher> ListingWalker<'a, E, L> {
    pub fn new(
        cards: Vec<E>,
        extractor: FieldExtractor<'a>,
        descriptions: Option<DescriptionFetcher<'a, L>>,
    ) -> Self {
        Self { cards: cards.into_iter().enumerate(), extractor, descriptions, skipped: 0 }
    }

    /// Next record, or `None` once every card has been visited.
    pub async fn next(&mut self) -> Option<ListingRecord> {
        for (index, card) in self.cards.by_ref() {
            let position = index + 1;
            info!("Processing product {}", position);

            let fields = match self.extractor.extract(&card).await {
                Ok(fields) => fields,
                Err(e) => {
                    warn!("Failed to extract product details for product {}: {}", position, e);
                    self.skipped += 1;
                    continue;
                }
            };

            let description = match &self.descriptions {
                Some(fetcher) if fields.has_product_url() => fetcher.fetch(&fields.product_url).await,
                _ => Field::Description.sentinel_text(),
            };

            return Some(fields.into_record(description));
        }

        None
    }

    /// Cards skipped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
