//! Market Snapshot Fetcher and Order Book Fetcher
//!
//! Stateless request/response helpers over the catalog and book sources.

use tracing::{debug, info, warn};

use polybot_core::{BookData, BookSource, CatalogEntry, CatalogSource, FetchResult};

/// Fetch the catalog, following cursors until exhausted or `max_records` reached
///
/// A failure on the first page is returned to the caller. A failure on a later
/// page ends pagination with the records gathered so far.
pub async fn fetch_snapshot(
    source: &dyn CatalogSource,
    max_records: usize,
) -> FetchResult<Vec<CatalogEntry>> {
    let mut records: Vec<CatalogEntry> = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = match source.fetch_catalog_page(cursor.as_deref()).await {
            Ok(page) => page,
            Err(e) if pages == 0 => return Err(e),
            Err(e) => {
                warn!(
                    "Catalog page {} failed, keeping {} records: {}",
                    pages + 1,
                    records.len(),
                    e
                );
                break;
            }
        };
        pages += 1;

        if page.records.is_empty() {
            debug!("Catalog page {} is empty, stopping", pages);
            break;
        }

        let is_last = page.is_last();
        records.extend(page.records);

        if is_last || records.len() >= max_records {
            break;
        }
        cursor = page.next_cursor;
    }

    records.truncate(max_records);
    info!("Fetched {} markets over {} page(s)", records.len(), pages);
    Ok(records)
}

/// Fetch book data for one token
pub async fn fetch_book(source: &dyn BookSource, token_id: &str) -> FetchResult<BookData> {
    source.fetch_book(token_id).await
}

/// Best-effort book fetch: a failure degrades to `None` for that market only
pub async fn fetch_book_or_none(
    source: &dyn BookSource,
    market_id: &str,
    token_id: &str,
) -> Option<BookData> {
    match fetch_book(source, token_id).await {
        Ok(book) => Some(book),
        Err(e) => {
            debug!("No orderbook for market {} (token {}): {}", market_id, token_id, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use polybot_core::{CatalogPage, FetchError};
    use serde_json::json;

    /// Serves fixed-size pages from a numbered catalog
    struct PagedCatalog {
        page_size: usize,
        pages: usize,
        fail_on_page: Option<usize>,
        requested: Mutex<Vec<Option<String>>>,
    }

    impl PagedCatalog {
        fn new(page_size: usize, pages: usize) -> Self {
            Self {
                page_size,
                pages,
                fail_on_page: None,
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CatalogSource for PagedCatalog {
        async fn fetch_catalog_page(&self, cursor: Option<&str>) -> FetchResult<CatalogPage> {
            self.requested.lock().push(cursor.map(String::from));
            let index: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);

            if self.fail_on_page == Some(index) {
                return Err(FetchError::network("connection reset"));
            }

            let records = (0..self.page_size)
                .map(|i| CatalogEntry::new(json!({ "id": format!("m{}-{}", index, i) })))
                .collect();
            let next = (index + 1 < self.pages).then(|| (index + 1).to_string());
            Ok(CatalogPage::new(records, next))
        }
    }

    #[tokio::test]
    async fn test_cap_truncates_third_page() {
        let catalog = PagedCatalog::new(40, 5);
        let records = fetch_snapshot(&catalog, 100).await.unwrap();

        assert_eq!(records.len(), 100);
        assert_eq!(catalog.requested.lock().len(), 3);
        assert_eq!(records[99].market_id().as_deref(), Some("m2-19"));
    }

    #[tokio::test]
    async fn test_stops_when_cursor_absent() {
        let catalog = PagedCatalog::new(10, 2);
        let records = fetch_snapshot(&catalog, 100).await.unwrap();

        assert_eq!(records.len(), 20);
        assert_eq!(
            *catalog.requested.lock(),
            vec![None, Some("1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_stops_on_empty_page() {
        let catalog = PagedCatalog::new(0, 3);
        let records = fetch_snapshot(&catalog, 100).await.unwrap();

        assert!(records.is_empty());
        assert_eq!(catalog.requested.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_first_page_failure_is_an_error() {
        let mut catalog = PagedCatalog::new(10, 3);
        catalog.fail_on_page = Some(0);

        let err = fetch_snapshot(&catalog, 100).await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
    }

    #[tokio::test]
    async fn test_later_page_failure_keeps_partial() {
        let mut catalog = PagedCatalog::new(10, 3);
        catalog.fail_on_page = Some(1);

        let records = fetch_snapshot(&catalog, 100).await.unwrap();
        assert_eq!(records.len(), 10);
    }
}
