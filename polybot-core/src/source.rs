//! Boundary contracts for the REST side of the venue

use async_trait::async_trait;

use crate::error::FetchResult;
use crate::market::{BookData, CatalogEntry};

/// One page of the paginated market catalog
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogPage {
    pub records: Vec<CatalogEntry>,
    /// Cursor for the next page; `None` once the catalog is exhausted
    pub next_cursor: Option<String>,
}

impl CatalogPage {
    pub fn new(records: Vec<CatalogEntry>, next_cursor: Option<String>) -> Self {
        Self {
            records,
            next_cursor,
        }
    }

    /// True when no further page should be requested after this one
    pub fn is_last(&self) -> bool {
        self.records.is_empty() || self.next_cursor.as_deref().map_or(true, str::is_empty)
    }
}

/// Source of the market catalog, with cursor continuation
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_catalog_page(&self, cursor: Option<&str>) -> FetchResult<CatalogPage>;
}

/// Source of best-of-book data for a single outcome token
#[async_trait]
pub trait BookSource: Send + Sync {
    async fn fetch_book(&self, token_id: &str) -> FetchResult<BookData>;
}
