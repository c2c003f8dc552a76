//! Market data structures: raw catalog entries, order book data and the
//! reconciled `MarketRecord` held by the state table.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MergeError;

/// Fractional digits kept for derived prices (spread, midpoint)
pub const PRICE_PRECISION: u32 = 8;

/// One entry of the venue catalog, kept exactly as received
///
/// Accepts both the camelCase (`conditionId`, `tokens[].id`) and the CLOB
/// snake_case (`condition_id`, `tokens[].token_id`) spellings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogEntry(Value);

/// Identity fields extracted from a valid catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketKeys {
    pub market_id: String,
    pub condition_id: String,
    pub token_ids: Vec<String>,
}

impl CatalogEntry {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    /// The unmodified catalog payload
    pub fn raw(&self) -> &Value {
        &self.0
    }

    pub fn into_raw(self) -> Value {
        self.0
    }

    /// Market id, if present and non-empty. Numeric ids are stringified.
    pub fn market_id(&self) -> Option<String> {
        non_empty_id(self.0.get("id"))
    }

    pub fn condition_id(&self) -> Option<String> {
        non_empty_id(self.0.get("conditionId")).or_else(|| non_empty_id(self.0.get("condition_id")))
    }

    /// Check the entry carries everything a `MarketRecord` needs
    ///
    /// Tokens without an id are skipped; the entry is only rejected when none remain.
    pub fn validate(&self) -> Result<MarketKeys, MergeError> {
        let market_id = self.market_id().ok_or(MergeError::MissingMarketId)?;

        let condition_id = self.condition_id().ok_or_else(|| MergeError::MissingConditionId {
            market_id: market_id.clone(),
        })?;

        let tokens = match self.0.get("tokens").and_then(Value::as_array) {
            Some(tokens) if !tokens.is_empty() => tokens,
            _ => return Err(MergeError::NoTokens { market_id }),
        };

        let token_ids: Vec<String> = tokens
            .iter()
            .filter_map(|token| {
                non_empty_id(token.get("id")).or_else(|| non_empty_id(token.get("token_id")))
            })
            .collect();

        if token_ids.is_empty() {
            return Err(MergeError::NoValidTokenIds { market_id });
        }

        Ok(MarketKeys {
            market_id,
            condition_id,
            token_ids,
        })
    }
}

impl From<Value> for CatalogEntry {
    fn from(raw: Value) -> Self {
        Self(raw)
    }
}

fn non_empty_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read a decimal that may be encoded as a JSON number or a numeric string
pub fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        // Going through the textual form avoids binary float noise
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        _ => None,
    }
}

/// A single price level in an order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// Bid/ask levels for one outcome token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookData {
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

impl BookData {
    pub fn new(bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> Self {
        Self { bids, asks }
    }

    /// Build from a JSON payload with `bids`/`asks` arrays of `{price, size}`.
    /// Malformed levels are skipped.
    pub fn from_value(value: &Value) -> Self {
        Self {
            bids: levels_from_value(value.get("bids")),
            asks: levels_from_value(value.get("asks")),
        }
    }

    /// Highest bid price, regardless of the order levels arrived in
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.iter().map(|l| l.price).max()
    }

    /// Lowest ask price
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.iter().map(|l| l.price).min()
    }
}

fn levels_from_value(value: Option<&Value>) -> Vec<PriceLevel> {
    value
        .and_then(Value::as_array)
        .map(|levels| {
            levels
                .iter()
                .filter_map(|level| {
                    let price = decimal_from_value(level.get("price")?)?;
                    let size = level
                        .get("size")
                        .and_then(decimal_from_value)
                        .unwrap_or(Decimal::ZERO);
                    Some(PriceLevel::new(price, size))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// The reconciled state of one tracked market
///
/// Only the merge path of the state table creates these; everything handed
/// out to callers is a copy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketRecord {
    pub market_id: String,
    pub condition_id: String,
    /// Outcome token ids; the first one is the reference ("yes") outcome
    pub token_ids: Vec<String>,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    /// Unmodified catalog payload
    pub raw: Value,
    pub last_update: DateTime<Utc>,
}

impl MarketRecord {
    /// Build a record from a validated entry and optional book data
    pub fn from_parts(
        keys: MarketKeys,
        entry: CatalogEntry,
        book: Option<&BookData>,
        last_update: DateTime<Utc>,
    ) -> Self {
        Self {
            market_id: keys.market_id,
            condition_id: keys.condition_id,
            token_ids: keys.token_ids,
            best_bid: book.and_then(BookData::best_bid),
            best_ask: book.and_then(BookData::best_ask),
            raw: entry.into_raw(),
            last_update,
        }
    }

    /// Reference token used for book pricing
    pub fn reference_token(&self) -> Option<&str> {
        self.token_ids.first().map(String::as_str)
    }

    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => Some((ask - bid).round_dp(PRICE_PRECISION)),
            _ => None,
        }
    }

    pub fn midpoint(&self) -> Option<Decimal> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => {
                Some(((bid + ask) / Decimal::TWO).round_dp(PRICE_PRECISION))
            }
            _ => None,
        }
    }

    pub fn question(&self) -> &str {
        self.raw
            .get("question")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn active(&self) -> bool {
        self.raw.get("active").and_then(Value::as_bool).unwrap_or(true)
    }

    pub fn closed(&self) -> bool {
        self.raw.get("closed").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn volume_24h(&self) -> Decimal {
        self.raw
            .get("volume24h")
            .and_then(decimal_from_value)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn last_price(&self) -> Option<Decimal> {
        self.raw.get("lastPrice").and_then(decimal_from_value)
    }
}

/// Flattened view of a record with every derived field resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSummary {
    pub market_id: String,
    pub condition_id: String,
    pub question: String,
    pub token_ids: Vec<String>,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub spread: Option<Decimal>,
    pub midpoint: Option<Decimal>,
    pub last_price: Option<Decimal>,
    pub volume_24h: Decimal,
    pub active: bool,
    pub closed: bool,
    pub last_update: DateTime<Utc>,
}

impl From<&MarketRecord> for MarketSummary {
    fn from(record: &MarketRecord) -> Self {
        Self {
            market_id: record.market_id.clone(),
            condition_id: record.condition_id.clone(),
            question: record.question().to_string(),
            token_ids: record.token_ids.clone(),
            best_bid: record.best_bid,
            best_ask: record.best_ask,
            spread: record.spread(),
            midpoint: record.midpoint(),
            last_price: record.last_price(),
            volume_24h: record.volume_24h(),
            active: record.active(),
            closed: record.closed(),
            last_update: record.last_update,
        }
    }
}
