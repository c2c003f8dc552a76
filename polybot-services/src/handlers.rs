//! Built-in stream handlers and relays
//!
//! - [`BookEventHandler`] merges streamed books into the state table and
//!   notifies subscribers, the low-latency path alongside the poll cycle.
//! - [`EventRelay`] forwards raw stream events to the event store.
//! - [`SnapshotRelay`] is a subscriber that stores and publishes every merged
//!   record.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use polybot_core::{BookData, MarketRecord, MarketSummary, StreamEvent};

use crate::event_store::{EventStore, MARKET_EVENTS_CHANNEL, MARKET_UPDATES_CHANNEL};
use crate::notifier::{MarketSubscriber, SubscriberNotifier};
use crate::state_table::MarketStateTable;
use crate::stream_manager::EventHandler;

/// Merges `l2_book`/`book` events for the reference token of a tracked market
pub struct BookEventHandler {
    table: Arc<MarketStateTable>,
    notifier: Arc<SubscriberNotifier>,
}

impl BookEventHandler {
    pub fn new(table: Arc<MarketStateTable>, notifier: Arc<SubscriberNotifier>) -> Self {
        Self { table, notifier }
    }
}

#[async_trait]
impl EventHandler for BookEventHandler {
    async fn handle(&self, event: &StreamEvent) -> anyhow::Result<()> {
        let Some(asset_id) = event.asset_id() else {
            debug!("Ignoring {} event without asset id", event.event_type);
            return Ok(());
        };

        let has_levels = ["bids", "asks"]
            .iter()
            .any(|side| event.payload.get(side).is_some_and(Value::is_array));
        if !has_levels {
            debug!("Ignoring {} event for {} without book levels", event.event_type, asset_id);
            return Ok(());
        }

        let book = BookData::from_value(&event.payload);
        if let Some(record) = self.table.merge_book_for_token(asset_id, &book) {
            self.notifier.notify_all(&record).await;
        }
        Ok(())
    }
}

/// Publishes each event on `market_events` and stores it under
/// `market:{market}:{timestamp}` with a TTL
pub struct EventRelay {
    store: Arc<dyn EventStore>,
    ttl: Duration,
}

impl EventRelay {
    pub fn new(store: Arc<dyn EventStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Storage key for an event; `None` if it names no market or asset
    pub fn event_key(event: &StreamEvent) -> Option<String> {
        let market = event.market().or_else(|| event.asset_id())?;
        let timestamp = event
            .timestamp()
            .unwrap_or_else(|| Utc::now().timestamp_millis().to_string());
        Some(format!("market:{}:{}", market, timestamp))
    }
}

#[async_trait]
impl EventHandler for EventRelay {
    async fn handle(&self, event: &StreamEvent) -> anyhow::Result<()> {
        self.store
            .publish(MARKET_EVENTS_CHANNEL, event.payload.clone())
            .await?;

        if let Some(key) = Self::event_key(event) {
            self.store
                .set(&key, event.payload.clone(), Some(self.ttl))
                .await?;
        }
        Ok(())
    }
}

/// Runs several handlers for one event type, in order
///
/// Every handler runs even if an earlier one fails; the first error is returned.
pub struct HandlerChain {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl HandlerChain {
    pub fn new(handlers: Vec<Arc<dyn EventHandler>>) -> Self {
        Self { handlers }
    }
}

#[async_trait]
impl EventHandler for HandlerChain {
    async fn handle(&self, event: &StreamEvent) -> anyhow::Result<()> {
        let mut first_error = None;
        for handler in &self.handlers {
            if let Err(e) = handler.handle(event).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Stores each merged record as `market:{market_id}` and publishes it on
/// `market_updates`
pub struct SnapshotRelay {
    store: Arc<dyn EventStore>,
}

impl SnapshotRelay {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MarketSubscriber for SnapshotRelay {
    async fn notify(&self, market_id: &str, record: &MarketRecord) -> anyhow::Result<()> {
        let snapshot = serde_json::to_value(MarketSummary::from(record))?;
        self.store
            .set(&format!("market:{}", market_id), snapshot.clone(), None)
            .await?;
        self.store.publish(MARKET_UPDATES_CHANNEL, snapshot).await?;
        Ok(())
    }
}
