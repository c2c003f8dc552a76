//! Subscriber Notifier
//!
//! Fans each merged record out to registered subscribers, one at a time and
//! in registration order. A subscriber that errors or panics is logged and
//! skipped; the rest still run.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::RwLock;
use tracing::error;

use polybot_core::MarketRecord;

/// Receives market updates after every merge
#[async_trait]
pub trait MarketSubscriber: Send + Sync {
    async fn notify(&self, market_id: &str, record: &MarketRecord) -> anyhow::Result<()>;
}

/// Ordered list of subscribers
#[derive(Default)]
pub struct SubscriberNotifier {
    subscribers: RwLock<Vec<Arc<dyn MarketSubscriber>>>,
}

impl SubscriberNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn MarketSubscriber>) {
        self.subscribers.write().push(subscriber);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Invoke every subscriber for one record
    ///
    /// Returns the number of subscribers that completed successfully.
    pub async fn notify_all(&self, record: &MarketRecord) -> usize {
        // Snapshot so the lock is not held while subscribers run
        let subscribers: Vec<Arc<dyn MarketSubscriber>> = self.subscribers.read().clone();
        let mut delivered = 0;

        for subscriber in subscribers {
            let call = subscriber.notify(&record.market_id, record);
            match AssertUnwindSafe(call).catch_unwind().await {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    error!("Error in market update subscriber for {}: {}", record.market_id, e)
                }
                Err(_) => error!("Market update subscriber panicked for {}", record.market_id),
            }
        }

        delivered
    }
}

impl std::fmt::Debug for SubscriberNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
