//! Data model for extracted listings.

use crate::catalog::selectors::Field;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value of one record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

/// Everything read from one product card, before the description is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardFields {
    pub title: String,
    pub author: String,
    pub current_price: String,
    pub list_price: String,
    pub discount: String,
    pub rating: String,
    pub review_count: String,
    pub stock_status: String,
    pub stock_locations: Vec<String>,
    pub product_url: String,
}

impl CardFields {
    /// True when a real product link was found.
    pub fn has_product_url(&self) -> bool {
        Some(self.product_url.as_str()) != Field::ProductUrl.sentinel()
    }

    /// Completes the record with its description.
    pub fn into_record(self, description: String) -> ListingRecord {
        ListingRecord {
            title: self.title,
            author: self.author,
            current_price: self.current_price,
            list_price: self.list_price,
            discount: self.discount,
            rating: self.rating,
            review_count: self.review_count,
            stock_status: self.stock_status,
            stock_locations: self.stock_locations,
            product_url: self.product_url,
            description,
        }
    }
}

/// One fully populated listing. Fields that could not be read hold their sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub title: String,
    pub author: String,
    pub current_price: String,
    pub list_price: String,
    pub discount: String,
    pub rating: String,
    pub review_count: String,
    pub stock_status: String,
    pub stock_locations: Vec<String>,
    pub product_url: String,
    pub description: String,
}

impl ListingRecord {
    /// Value of a single field.
    pub fn get(&self, field: Field) -> FieldValue {
        let text = match field {
            Field::Title => &self.title,
            Field::Author => &self.author,
            Field::CurrentPrice => &self.current_price,
            Field::ListPrice => &self.list_price,
            Field::Discount => &self.discount,
            Field::Rating => &self.rating,
            Field::ReviewCount => &self.review_count,
            Field::StockStatus => &self.stock_status,
            Field::StockLocations => return FieldValue::List(self.stock_locations.clone()),
            Field::ProductUrl => &self.product_url,
            Field::Description => &self.description,
        };
        FieldValue::Text(text.clone())
    }

    /// All fields in record order.
    pub fn fields(&self) -> Vec<(Field, FieldValue)> {
        Field::ALL.iter().map(|&field| (field, self.get(field))).collect()
    }

    /// Fields currently holding their sentinel.
    pub fn sentinel_fields(&self) -> Vec<Field> {
        Field::ALL
            .iter()
            .copied()
            .filter(|field| match (field.sentinel(), self.get(*field)) {
                (Some(sentinel), FieldValue::Text(text)) => text == sentinel,
                _ => false,
            })
            .collect()
    }
}
