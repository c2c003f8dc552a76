//! Market State Table
//!
//! The authoritative in-memory view of every tracked market. All writes go
//! through [`MarketStateTable::merge`], which replaces a record and updates the
//! lookup indexes in a single critical section; the lock is never held across
//! an await point.
//!
//! Records for markets that drop out of the catalog are not evicted. They stay
//! readable with their last merged values until overwritten.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, warn};

use polybot_core::{BookData, CatalogEntry, MarketRecord, MergeError};

#[derive(Debug, Default)]
struct TableInner {
    /// market_id -> record
    markets: HashMap<String, MarketRecord>,
    /// condition_id -> market_id
    by_condition: HashMap<String, String>,
    /// token_id -> market_id
    by_token: HashMap<String, String>,
}

/// In-memory table of tracked markets
#[derive(Debug, Default)]
pub struct MarketStateTable {
    inner: RwLock<TableInner>,
}

impl MarketStateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a catalog entry and optional book data, stamping the record with now
    pub fn merge(
        &self,
        entry: CatalogEntry,
        book: Option<&BookData>,
    ) -> Result<MarketRecord, MergeError> {
        self.merge_at(entry, book, Utc::now())
    }

    /// Merge with an explicit update timestamp
    ///
    /// Invalid entries leave the table untouched. A valid entry fully replaces
    /// any previous record for the same market id.
    pub fn merge_at(
        &self,
        entry: CatalogEntry,
        book: Option<&BookData>,
        at: DateTime<Utc>,
    ) -> Result<MarketRecord, MergeError> {
        let keys = entry.validate()?;
        let record = MarketRecord::from_parts(keys, entry, book, at);

        let mut guard = self.inner.write();
        let inner = &mut *guard;

        if let Some(previous) = inner.markets.get(&record.market_id) {
            if previous.condition_id != record.condition_id {
                let stale = previous.condition_id.clone();
                if inner.by_condition.get(&stale) == Some(&record.market_id) {
                    inner.by_condition.remove(&stale);
                }
            }
        }

        if let Some(owner) = inner.by_condition.get(&record.condition_id) {
            if owner != &record.market_id {
                warn!(
                    "Condition {} moved from market {} to {}",
                    record.condition_id, owner, record.market_id
                );
            }
        }
        inner
            .by_condition
            .insert(record.condition_id.clone(), record.market_id.clone());

        for token_id in &record.token_ids {
            inner
                .by_token
                .insert(token_id.clone(), record.market_id.clone());
        }

        inner
            .markets
            .insert(record.market_id.clone(), record.clone());

        debug!("Merged market {}", record.market_id);
        Ok(record)
    }

    /// Re-merge the market that owns `token_id` with fresh book data
    ///
    /// Goes through the same merge contract as the poll cycle, reusing the
    /// stored catalog payload. Returns `None` if no market owns the token or
    /// the token is not the market's reference token.
    pub fn merge_book_for_token(&self, token_id: &str, book: &BookData) -> Option<MarketRecord> {
        let current = self.get_by_token(token_id)?;
        if current.reference_token() != Some(token_id) {
            debug!(
                "Ignoring book for non-reference token {} of market {}",
                token_id, current.market_id
            );
            return None;
        }

        match self.merge(CatalogEntry::new(current.raw), Some(book)) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Failed to re-merge market for token {}: {}", token_id, e);
                None
            }
        }
    }

    /// Look up by market id first, then by condition id
    pub fn get(&self, market_or_condition_id: &str) -> Option<MarketRecord> {
        let inner = self.inner.read();
        inner
            .markets
            .get(market_or_condition_id)
            .or_else(|| {
                inner
                    .by_condition
                    .get(market_or_condition_id)
                    .and_then(|market_id| inner.markets.get(market_id))
            })
            .cloned()
    }

    /// Look up the market that owns an outcome token
    pub fn get_by_token(&self, token_id: &str) -> Option<MarketRecord> {
        let inner = self.inner.read();
        inner
            .by_token
            .get(token_id)
            .and_then(|market_id| inner.markets.get(market_id))
            .cloned()
    }

    /// Snapshot copy of every record; order is not significant
    pub fn list_all(&self) -> Vec<MarketRecord> {
        self.inner.read().markets.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Table statistics
    pub fn stats(&self) -> TableStats {
        let inner = self.inner.read();

        let priced = inner
            .markets
            .values()
            .filter(|r| r.best_bid.is_some() && r.best_ask.is_some())
            .count();

        TableStats {
            total: inner.markets.len(),
            priced,
            tokens_indexed: inner.by_token.len(),
            oldest_update: inner.markets.values().map(|r| r.last_update).min(),
            newest_update: inner.markets.values().map(|r| r.last_update).max(),
        }
    }
}

/// State table statistics
#[derive(Debug, Clone, Serialize)]
pub struct TableStats {
    pub total: usize,
    /// Records with both a best bid and a best ask
    pub priced: usize,
    pub tokens_indexed: usize,
    pub oldest_update: Option<DateTime<Utc>>,
    pub newest_update: Option<DateTime<Utc>>,
}
