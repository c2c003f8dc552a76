//! Polymarket CLOB wire types

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use polybot_core::{BookData, CatalogEntry, CatalogPage, PriceLevel};

/// Base URL for the Polymarket CLOB API
pub const CLOB_API_BASE: &str = "https://clob.polymarket.com";

/// Cursor value the CLOB returns once pagination is exhausted
pub const END_CURSOR: &str = "LTE=";

/// Response from GET /markets
#[derive(Debug, Clone, Deserialize)]
pub struct ClobMarketsResponse {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub count: Option<u64>,
}

impl ClobMarketsResponse {
    /// Convert to a catalog page, mapping the end sentinel to "no cursor"
    pub fn into_page(self) -> CatalogPage {
        let next_cursor = self
            .next_cursor
            .filter(|cursor| !cursor.is_empty() && cursor != END_CURSOR);

        CatalogPage::new(
            self.data
                .into_iter()
                .map(|market| CatalogEntry::new(with_market_id(market)))
                .collect(),
            next_cursor,
        )
    }
}

/// CLOB markets carry no separate `id`; their condition id serves as one
fn with_market_id(mut market: Value) -> Value {
    if let Value::Object(fields) = &mut market {
        if !fields.contains_key("id") {
            if let Some(condition_id) = fields.get("condition_id").cloned() {
                fields.insert("id".to_string(), condition_id);
            }
        }
    }
    market
}

/// Response from GET /book
#[derive(Debug, Clone, Deserialize)]
pub struct ClobOrderbookResponse {
    /// Market identifier
    #[serde(default)]
    pub market: Option<String>,
    /// Asset/token ID
    #[serde(default)]
    pub asset_id: Option<String>,
    /// Hash of the order book state
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Bid levels (buy orders)
    #[serde(default)]
    pub bids: Vec<ClobOrderLevel>,
    /// Ask levels (sell orders)
    #[serde(default)]
    pub asks: Vec<ClobOrderLevel>,
}

/// A single level in the CLOB order book
#[derive(Debug, Clone, Deserialize)]
pub struct ClobOrderLevel {
    /// Price as string (0.00 - 1.00)
    pub price: String,
    /// Size/quantity as string
    pub size: String,
}

impl ClobOrderbookResponse {
    /// Convert to `BookData`, dropping levels that fail to parse
    pub fn to_book_data(&self) -> BookData {
        BookData::new(convert_levels(&self.bids), convert_levels(&self.asks))
    }
}

fn convert_levels(levels: &[ClobOrderLevel]) -> Vec<PriceLevel> {
    levels
        .iter()
        .filter_map(|level| {
            let price = Decimal::from_str(&level.price).ok()?;
            let size = Decimal::from_str(&level.size).ok()?;
            Some(PriceLevel::new(price, size))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_markets_response_end_cursor() {
        let json = r#"{"data": [{"condition_id": "c1"}], "next_cursor": "LTE=", "limit": 1, "count": 1}"#;
        let page = serde_json::from_str::<ClobMarketsResponse>(json)
            .unwrap()
            .into_page();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].market_id().as_deref(), Some("c1"));
        assert_eq!(page.next_cursor, None);
        assert!(page.is_last());

        let json = r#"{"data": [{"condition_id": "c1"}], "next_cursor": "MTAw"}"#;
        let page = serde_json::from_str::<ClobMarketsResponse>(json)
            .unwrap()
            .into_page();
        assert_eq!(page.next_cursor.as_deref(), Some("MTAw"));
        assert!(!page.is_last());
    }

    #[test]
    fn test_orderbook_conversion_skips_bad_levels() {
        let json = r#"{
            "market": "0xabc",
            "asset_id": "123",
            "bids": [{"price": "0.60", "size": "100.0"}, {"price": "oops", "size": "1"}],
            "asks": [{"price": "0.65", "size": "100.0"}]
        }"#;
        let book = serde_json::from_str::<ClobOrderbookResponse>(json)
            .unwrap()
            .to_book_data();
        assert_eq!(book.bids.len(), 1);
        assert_eq!(book.best_bid(), Some(dec!(0.60)));
        assert_eq!(book.best_ask(), Some(dec!(0.65)));
    }
}
