//! Market-data ingestion services
//!
//! The state table, poll scheduler, subscriber fan-out and streaming
//! connection manager, plus the relays that forward their output to the
//! event store.

pub mod config;
pub mod context;
pub mod event_store;
pub mod fetcher;
pub mod handlers;
pub mod notifier;
pub mod scheduler;
pub mod state_table;
pub mod stream_manager;

pub use config::IngestConfig;
pub use context::{IngestContext, BOOK_EVENT_TYPES};
pub use event_store::{
    EventStore, MemoryEventStore, PublishedEvent, MARKET_EVENTS_CHANNEL, MARKET_UPDATES_CHANNEL,
};
pub use fetcher::{fetch_book, fetch_book_or_none, fetch_snapshot};
pub use handlers::{BookEventHandler, EventRelay, HandlerChain, SnapshotRelay};
pub use notifier::{MarketSubscriber, SubscriberNotifier};
pub use scheduler::{
    CycleOutcome, CycleReport, SchedulerConfig, SchedulerState, SchedulerStatus, UpdateScheduler,
};
pub use state_table::{MarketStateTable, TableStats};
pub use stream_manager::{EventHandler, StreamConnectionManager, StreamHealth};
