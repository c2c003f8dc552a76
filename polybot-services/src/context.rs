//! Ingestion context
//!
//! Built once at process start and shared by reference with the HTTP layer
//! and background tasks.

use std::sync::Arc;

use tracing::info;

use polybot_core::{BookSource, CatalogSource, FetchResult, StreamConnector};
use polybot_polymarket::{ClobClient, WsConnector};

use crate::config::IngestConfig;
use crate::event_store::{EventStore, MemoryEventStore};
use crate::handlers::{BookEventHandler, EventRelay, HandlerChain, SnapshotRelay};
use crate::notifier::SubscriberNotifier;
use crate::scheduler::{SchedulerConfig, UpdateScheduler};
use crate::state_table::MarketStateTable;
use crate::stream_manager::{EventHandler, StreamConnectionManager};

/// Stream event types whose payloads carry book levels
pub const BOOK_EVENT_TYPES: [&str; 2] = ["l2_book", "book"];

/// Every long-lived component of the ingestion engine
pub struct IngestContext {
    pub config: IngestConfig,
    pub table: Arc<MarketStateTable>,
    pub notifier: Arc<SubscriberNotifier>,
    pub scheduler: Arc<UpdateScheduler>,
    pub stream: Arc<StreamConnectionManager>,
    pub store: Arc<dyn EventStore>,
}

impl IngestContext {
    /// Build against the live venue
    pub fn new(config: IngestConfig) -> FetchResult<Self> {
        let client = Arc::new(ClobClient::with_base_url(&config.rest_url)?);
        Ok(Self::with_sources(
            config,
            client.clone(),
            client,
            Arc::new(WsConnector::new()),
            Arc::new(MemoryEventStore::new()),
        ))
    }

    /// Build against arbitrary sources
    pub fn with_sources(
        config: IngestConfig,
        catalog: Arc<dyn CatalogSource>,
        books: Arc<dyn BookSource>,
        connector: Arc<dyn StreamConnector>,
        store: Arc<dyn EventStore>,
    ) -> Self {
        let table = Arc::new(MarketStateTable::new());
        let notifier = Arc::new(SubscriberNotifier::new());
        notifier.subscribe(Arc::new(SnapshotRelay::new(store.clone())));

        let scheduler = Arc::new(UpdateScheduler::new(
            catalog,
            books,
            table.clone(),
            notifier.clone(),
            SchedulerConfig::from(&config),
        ));

        let stream = Arc::new(StreamConnectionManager::new(config.clone(), connector));
        let relay: Arc<dyn EventHandler> =
            Arc::new(EventRelay::new(store.clone(), config.event_ttl));
        let books_handler: Arc<dyn EventHandler> =
            Arc::new(BookEventHandler::new(table.clone(), notifier.clone()));

        for channel in &config.channels {
            if BOOK_EVENT_TYPES.contains(&channel.as_str()) {
                stream.register_handler(
                    channel.clone(),
                    Arc::new(HandlerChain::new(vec![books_handler.clone(), relay.clone()])),
                );
            } else {
                stream.register_handler(channel.clone(), relay.clone());
            }
        }

        info!(
            "Ingestion context ready ({} channels, {} subscribers)",
            config.channels.len(),
            notifier.subscriber_count()
        );

        Self {
            config,
            table,
            notifier,
            scheduler,
            stream,
            store,
        }
    }

    /// Stop the scheduler (awaiting its task) and close the stream
    pub async fn shutdown(&self) {
        self.scheduler.stop().await;
        self.stream.close().await;
    }
}
