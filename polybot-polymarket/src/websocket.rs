//! WebSocket transport for the Polymarket event stream
//!
//! Wraps a tokio-tungstenite connection split into its write and read halves
//! so the connection manager can send control messages while a listener is
//! blocked on the next inbound message.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use polybot_core::{StreamConnector, StreamError, StreamResult, TransportSink, TransportSource};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens WebSocket transports with tokio-tungstenite
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StreamConnector for WsConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> StreamResult<(Box<dyn TransportSink>, Box<dyn TransportSource>)> {
        info!("[Polymarket WS] Connecting to {}", url);

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| StreamError::connection(format!("Failed to connect to {}: {}", url, e)))?;

        let (write, read) = ws_stream.split();
        Ok((Box::new(WsSink { write }), Box::new(WsSource { read })))
    }
}

/// Write half
pub struct WsSink {
    write: SplitSink<WsStream, Message>,
}

#[async_trait]
impl TransportSink for WsSink {
    async fn send(&mut self, text: String) -> StreamResult<()> {
        self.write
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| StreamError::connection(format!("Failed to send message: {}", e)))
    }

    async fn close(&mut self) -> StreamResult<()> {
        self.write
            .close()
            .await
            .map_err(|e| StreamError::connection(format!("Failed to close connection: {}", e)))
    }
}

/// Read half
pub struct WsSource {
    read: SplitStream<WsStream>,
}

#[async_trait]
impl TransportSource for WsSource {
    async fn recv(&mut self) -> StreamResult<Option<String>> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => {
                    // Keepalive replies carry no event
                    if text.as_str() == "PONG" || text.as_str().is_empty() {
                        continue;
                    }
                    return Ok(Some(text.as_str().to_string()));
                }
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Ok(Some(text)),
                    Err(_) => debug!("[Polymarket WS] Dropping non-UTF8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    info!("[Polymarket WS] Connection closed by server: {:?}", frame);
                    return Ok(None);
                }
                // Ping/pong and raw frames are handled by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(StreamError::connection(e.to_string())),
                None => return Ok(None),
            }
        }
    }
}
