//! Event store and pub/sub relay
//!
//! Key-value storage with per-key TTL plus named publish channels. The
//! in-memory implementation backs the HTTP and WebSocket surfaces of a
//! single process.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;

/// Channel carrying relayed stream events
pub const MARKET_EVENTS_CHANNEL: &str = "market_events";

/// Channel carrying merged market snapshots
pub const MARKET_UPDATES_CHANNEL: &str = "market_updates";

/// A message published on a named channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedEvent {
    pub channel: String,
    pub payload: Value,
}

/// Storage and fan-out backend for relayed market data
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Publish on a channel; returns the number of live receivers
    async fn publish(&self, channel: &str, payload: Value) -> anyhow::Result<usize>;

    /// Store a value, replacing any previous one. `None` means no expiry.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> anyhow::Result<()>;

    async fn get(&self, key: &str) -> anyhow::Result<Option<Value>>;

    /// Live keys starting with `prefix`, sorted
    async fn keys_with_prefix(&self, prefix: &str) -> anyhow::Result<Vec<String>>;

    /// Drop expired keys, returning how many were removed
    async fn purge_expired(&self) -> anyhow::Result<usize>;

    /// Receive everything published from now on, across all channels
    fn subscribe(&self) -> broadcast::Receiver<PublishedEvent>;
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: Value,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-process event store; expired keys are hidden on read and removed by
/// `purge_expired`
#[derive(Debug)]
pub struct MemoryEventStore {
    values: DashMap<String, StoredValue>,
    broadcast_tx: broadcast::Sender<PublishedEvent>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// `capacity` bounds how far a slow receiver may lag before losing messages
    pub fn with_capacity(capacity: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(capacity);
        Self {
            values: DashMap::new(),
            broadcast_tx,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn publish(&self, channel: &str, payload: Value) -> anyhow::Result<usize> {
        let event = PublishedEvent {
            channel: channel.to_string(),
            payload,
        };
        // No receivers is not an error
        Ok(self.broadcast_tx.send(event).unwrap_or(0))
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> anyhow::Result<()> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.values
            .insert(key.to_string(), StoredValue { value, expires_at });
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let now = Instant::now();
        let value = match self.values.get(key) {
            Some(stored) if stored.is_live(now) => return Ok(Some(stored.value.clone())),
            Some(_) => None,
            None => return Ok(None),
        };
        self.values.remove_if(key, |_, stored| !stored.is_live(now));
        Ok(value)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .values
            .iter()
            .filter(|entry| entry.key().starts_with(prefix) && entry.value().is_live(now))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn purge_expired(&self) -> anyhow::Result<usize> {
        let now = Instant::now();
        let before = self.values.len();
        self.values.retain(|_, stored| stored.is_live(now));
        let purged = before.saturating_sub(self.values.len());
        if purged > 0 {
            debug!("Purged {} expired event store keys", purged);
        }
        Ok(purged)
    }

    fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.broadcast_tx.subscribe()
    }
}
