//! Error types for the ingestion engine
//!
//! Each enum maps to one containment boundary: fetch errors are retried on the
//! next cycle, merge errors skip a single catalog entry, stream errors drive
//! reconnection, and config errors abort startup.

use thiserror::Error;

/// Failure retrieving the catalog or an order book from the venue
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl FetchError {
    pub fn network(msg: impl Into<String>) -> Self {
        FetchError::Network(msg.into())
    }

    pub fn api(status: u16, body: impl Into<String>) -> Self {
        FetchError::Api {
            status,
            body: body.into(),
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        FetchError::Parse(msg.into())
    }
}

/// A catalog entry that cannot become a `MarketRecord`, classified by the missing field
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("market entry is missing an id")]
    MissingMarketId,

    #[error("market {market_id} is missing a condition id")]
    MissingConditionId { market_id: String },

    #[error("market {market_id} has no tokens")]
    NoTokens { market_id: String },

    #[error("market {market_id} has no valid token ids")]
    NoValidTokenIds { market_id: String },
}

/// Streaming connection failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Transport could not be opened, or failed while in use
    #[error("Connection error: {0}")]
    Connection(String),

    /// Control message attempted while no connection is open
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// The connection was closed explicitly via `close()`
    #[error("Connection closed")]
    Closed,

    #[error("Reconnect attempts exhausted after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("Serialization error: {0}")]
    Serialize(String),
}

impl StreamError {
    pub fn connection(msg: impl Into<String>) -> Self {
        StreamError::Connection(msg.into())
    }

    pub fn subscription(msg: impl Into<String>) -> Self {
        StreamError::Subscription(msg.into())
    }
}

/// Startup configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(String),

    #[error("Invalid value for {field}: {error}")]
    Invalid { field: String, error: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, error: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            error: error.into(),
        }
    }
}

/// Result type alias for fetch operations
pub type FetchResult<T> = Result<T, FetchError>;

/// Result type alias for streaming operations
pub type StreamResult<T> = Result<T, StreamError>;
