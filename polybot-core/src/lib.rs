//! Core types for the Polybot market-data engine
//!
//! Shared data structures and the boundary contracts (catalog, book and
//! streaming sources) that the venue adapters implement and the ingestion
//! services consume.

pub mod error;
pub mod market;
pub mod source;
pub mod stream;

pub use error::{ConfigError, FetchError, FetchResult, MergeError, StreamError, StreamResult};
pub use market::{
    decimal_from_value, BookData, CatalogEntry, MarketKeys, MarketRecord, MarketSummary, PriceLevel,
    PRICE_PRECISION,
};
pub use source::{BookSource, CatalogPage, CatalogSource};
pub use stream::{
    ConnectionState, ControlKind, ControlMessage, StreamConnector, StreamEvent, TransportSink,
    TransportSource,
};
