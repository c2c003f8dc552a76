//! Streaming protocol types and transport contracts

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StreamResult;

/// Lifecycle of a streaming connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Reconnect attempts exhausted; terminal for this connection instance
    Failed,
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Disconnected
    }
}

/// Kind of a subscription control message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    Subscribe,
    Unsubscribe,
}

/// Subscribe/unsubscribe request sent over the stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    #[serde(rename = "type")]
    pub kind: ControlKind,
    pub channel: String,
    pub market: String,
}

impl ControlMessage {
    pub fn subscribe(channel: impl Into<String>) -> Self {
        Self {
            kind: ControlKind::Subscribe,
            channel: channel.into(),
            market: "all".to_string(),
        }
    }

    pub fn unsubscribe(channel: impl Into<String>) -> Self {
        Self {
            kind: ControlKind::Unsubscribe,
            channel: channel.into(),
            market: "all".to_string(),
        }
    }
}

/// A structured inbound event
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub event_type: String,
    pub payload: Value,
}

impl StreamEvent {
    /// Read the declared type from `type`, falling back to `event_type`.
    /// Returns `None` for payloads that are not objects or carry no type.
    pub fn from_value(payload: Value) -> Option<Self> {
        let event_type = payload
            .get("type")
            .or_else(|| payload.get("event_type"))
            .and_then(Value::as_str)?
            .to_string();

        Some(Self {
            event_type,
            payload,
        })
    }

    /// Market id or condition id the event refers to, if any
    pub fn market(&self) -> Option<&str> {
        self.payload.get("market").and_then(Value::as_str)
    }

    /// Outcome token the event refers to, if any
    pub fn asset_id(&self) -> Option<&str> {
        self.payload
            .get("asset_id")
            .or_else(|| self.payload.get("token_id"))
            .and_then(Value::as_str)
    }

    /// Event timestamp as sent by the venue, stringified
    pub fn timestamp(&self) -> Option<String> {
        match self.payload.get("timestamp")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Write half of a streaming transport
#[async_trait]
pub trait TransportSink: Send {
    async fn send(&mut self, text: String) -> StreamResult<()>;

    async fn close(&mut self) -> StreamResult<()>;
}

/// Read half of a streaming transport
#[async_trait]
pub trait TransportSource: Send {
    /// Next text message; `Ok(None)` once the peer has closed the stream
    async fn recv(&mut self) -> StreamResult<Option<String>>;
}

/// Opens streaming transports
#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn connect(
        &self,
        url: &str,
    ) -> StreamResult<(Box<dyn TransportSink>, Box<dyn TransportSource>)>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_control_message_wire_format() {
        let json = serde_json::to_value(ControlMessage::subscribe("l2_book")).unwrap();
        assert_eq!(
            json,
            json!({"type": "subscribe", "channel": "l2_book", "market": "all"})
        );

        let json = serde_json::to_value(ControlMessage::unsubscribe("trades")).unwrap();
        assert_eq!(json["type"], "unsubscribe");
    }

    #[test]
    fn test_event_type_fallback() {
        let event = StreamEvent::from_value(json!({"event_type": "book", "asset_id": "t1"})).unwrap();
        assert_eq!(event.event_type, "book");
        assert_eq!(event.asset_id(), Some("t1"));

        assert!(StreamEvent::from_value(json!({"price": "0.5"})).is_none());
        assert!(StreamEvent::from_value(json!("PONG")).is_none());
    }

    #[test]
    fn test_timestamp_accepts_numbers() {
        let event = StreamEvent::from_value(json!({"type": "trades", "timestamp": 1700000000123u64})).unwrap();
        assert_eq!(event.timestamp().as_deref(), Some("1700000000123"));
    }
}
