//! Polymarket adapters for the Polybot market-data engine
//!
//! - [`ClobClient`] implements the catalog and book sources over the public
//!   CLOB REST API.
//! - [`WsConnector`] implements the streaming transport over WebSocket.

pub mod client;
pub mod types;
pub mod websocket;

pub use client::ClobClient;
pub use types::{ClobMarketsResponse, ClobOrderbookResponse, CLOB_API_BASE, END_CURSOR};
pub use websocket::{WsConnector, WsSink, WsSource};
