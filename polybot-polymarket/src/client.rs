//! Polymarket CLOB REST client
//!
//! Fetches the paginated market catalog and per-token order books. Both
//! endpoints are public, so no credentials are involved.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use polybot_core::{BookData, BookSource, CatalogPage, CatalogSource, FetchError, FetchResult};

use crate::types::{ClobMarketsResponse, ClobOrderbookResponse, CLOB_API_BASE};

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Polymarket CLOB API client
#[derive(Clone)]
pub struct ClobClient {
    client: Client,
    base_url: String,
}

impl ClobClient {
    /// Create a client against the production CLOB
    pub fn new() -> FetchResult<Self> {
        Self::with_base_url(CLOB_API_BASE)
    }

    /// Create a client against a custom base URL
    pub fn with_base_url(base_url: impl Into<String>) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetchError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one page of markets, continuing from `cursor` if given
    #[instrument(skip(self))]
    pub async fn get_markets(&self, cursor: Option<&str>) -> FetchResult<CatalogPage> {
        let url = format!("{}/markets", self.base_url);
        debug!("Fetching Polymarket markets from: {} (cursor: {:?})", url, cursor);

        let mut request = self.client.get(&url);
        if let Some(cursor) = cursor {
            request = request.query(&[("next_cursor", cursor)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::network(format!("Failed to fetch markets: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::api(status, body));
        }

        let markets: ClobMarketsResponse = response
            .json()
            .await
            .map_err(|e| FetchError::parse(format!("Failed to parse markets response: {}", e)))?;

        Ok(markets.into_page())
    }

    /// Fetch the order book for a single outcome token
    #[instrument(skip(self))]
    pub async fn get_orderbook(&self, token_id: &str) -> FetchResult<BookData> {
        let url = format!("{}/book", self.base_url);
        debug!("Fetching Polymarket orderbook for token {}", token_id);

        let response = self
            .client
            .get(&url)
            .query(&[("token_id", token_id)])
            .send()
            .await
            .map_err(|e| FetchError::network(format!("Failed to fetch orderbook: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::api(status, body));
        }

        let book: ClobOrderbookResponse = response
            .json()
            .await
            .map_err(|e| FetchError::parse(format!("Failed to parse orderbook response: {}", e)))?;

        Ok(book.to_book_data())
    }
}

#[async_trait]
impl CatalogSource for ClobClient {
    async fn fetch_catalog_page(&self, cursor: Option<&str>) -> FetchResult<CatalogPage> {
        self.get_markets(cursor).await
    }
}

#[async_trait]
impl BookSource for ClobClient {
    async fn fetch_book(&self, token_id: &str) -> FetchResult<BookData> {
        self.get_orderbook(token_id).await
    }
}

impl std::fmt::Debug for ClobClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClobClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ClobClient::with_base_url("http://localhost:8080/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_default_base_url() {
        let client = ClobClient::new().unwrap();
        assert_eq!(client.base_url(), CLOB_API_BASE);
    }
}
