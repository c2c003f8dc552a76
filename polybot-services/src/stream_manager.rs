//! Stream Connection Manager
//!
//! Owns one streaming connection: opens it, subscribes the configured
//! channels, reads inbound messages and dispatches them to the handler
//! registered for their event type. A dropped connection is retried with a
//! fixed delay up to `max_reconnect_attempts` times, after which the manager
//! enters `Failed` and `listen()` returns an error.
//!
//! The transport is split into independently locked halves so that
//! `subscribe`/`unsubscribe` and `close` never wait on a pending read.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, instrument, warn};

use polybot_core::{
    ConnectionState, ControlMessage, StreamConnector, StreamError, StreamEvent, StreamResult,
    TransportSink, TransportSource,
};

use crate::config::IngestConfig;

/// Processes inbound events of one type
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &StreamEvent) -> anyhow::Result<()>;
}

/// Connection health snapshot
#[derive(Debug, Clone, Serialize)]
pub struct StreamHealth {
    pub state: ConnectionState,
    pub connected: bool,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
    pub message_count: u64,
    pub last_message_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct StreamMetrics {
    last_message_epoch_ms: AtomicU64,
    message_count: AtomicU64,
}

impl StreamMetrics {
    fn record_message(&self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        self.last_message_epoch_ms.store(now, Ordering::SeqCst);
        self.message_count.fetch_add(1, Ordering::SeqCst);
    }

    fn last_message_time(&self) -> Option<DateTime<Utc>> {
        match self.last_message_epoch_ms.load(Ordering::SeqCst) {
            0 => None,
            ms => DateTime::from_timestamp((ms / 1000) as i64, ((ms % 1000) * 1_000_000) as u32),
        }
    }
}

/// Manages a single streaming connection and its event handlers
pub struct StreamConnectionManager {
    config: IngestConfig,
    connector: Arc<dyn StreamConnector>,
    sink: Mutex<Option<Box<dyn TransportSink>>>,
    source: Mutex<Option<Box<dyn TransportSource>>>,
    handlers: RwLock<HashMap<String, Arc<dyn EventHandler>>>,
    state: RwLock<ConnectionState>,
    reconnect_attempts: AtomicU32,
    metrics: StreamMetrics,
    shutdown: watch::Sender<bool>,
}

impl StreamConnectionManager {
    pub fn new(config: IngestConfig, connector: Arc<dyn StreamConnector>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            connector,
            sink: Mutex::new(None),
            source: Mutex::new(None),
            handlers: RwLock::new(HashMap::new()),
            state: RwLock::new(ConnectionState::Disconnected),
            reconnect_attempts: AtomicU32::new(0),
            metrics: StreamMetrics::default(),
            shutdown,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::SeqCst)
    }

    pub fn health(&self) -> StreamHealth {
        let state = self.state();
        StreamHealth {
            state,
            connected: state == ConnectionState::Connected,
            reconnect_attempts: self.reconnect_attempts(),
            max_reconnect_attempts: self.config.max_reconnect_attempts,
            message_count: self.metrics.message_count.load(Ordering::SeqCst),
            last_message_time: self.metrics.last_message_time(),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let mut current = self.state.write();
        if *current != state {
            debug!("Stream state {:?} -> {:?}", *current, state);
            *current = state;
        }
    }

    /// Register the handler for an event type, replacing any previous one
    pub fn register_handler(&self, event_type: impl Into<String>, handler: Arc<dyn EventHandler>) {
        let event_type = event_type.into();
        if self
            .handlers
            .write()
            .insert(event_type.clone(), handler)
            .is_some()
        {
            debug!("Replaced stream handler for {}", event_type);
        }
    }

    /// Open the connection and subscribe every configured channel
    ///
    /// Fails with `StreamError::Closed` once `close()` has been called.
    #[instrument(skip(self), fields(url = %self.config.ws_url))]
    pub async fn connect(&self) -> StreamResult<()> {
        if self.is_closed() {
            return Err(StreamError::Closed);
        }
        self.set_state(ConnectionState::Connecting);

        match self.open().await {
            Ok(()) => Ok(()),
            Err(StreamError::Closed) => {
                info!("Market stream closed while connecting");
                Err(StreamError::Closed)
            }
            Err(e) => {
                error!("Failed to connect to market stream: {}", e);
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Open a transport, store both halves and send channel subscriptions in order
    ///
    /// A transport that opens after `close()` is shut again and never stored.
    async fn open(&self) -> StreamResult<()> {
        info!("Connecting to {}", self.config.ws_url);
        let (mut sink, source) = self.connector.connect(&self.config.ws_url).await?;

        if self.is_closed() {
            discard(sink.as_mut()).await;
            return Err(StreamError::Closed);
        }

        for channel in &self.config.channels {
            send_control(sink.as_mut(), &ControlMessage::subscribe(channel.as_str())).await?;
            debug!("Subscribed to channel {}", channel);
        }

        // close() raises the flag before taking these locks, so checking it
        // under both locks means close() either sees this transport or we see the flag
        let mut sink_slot = self.sink.lock().await;
        let mut source_slot = self.source.lock().await;
        if self.is_closed() {
            discard(sink.as_mut()).await;
            return Err(StreamError::Closed);
        }
        *sink_slot = Some(sink);
        *source_slot = Some(source);

        self.reconnect_attempts.store(0, Ordering::SeqCst);
        self.set_state(ConnectionState::Connected);
        drop(source_slot);
        drop(sink_slot);
        info!(
            "Connected to market stream ({} channels)",
            self.config.channels.len()
        );
        Ok(())
    }

    pub async fn subscribe(&self, channel: &str) -> StreamResult<()> {
        self.send(&ControlMessage::subscribe(channel)).await
    }

    pub async fn unsubscribe(&self, channel: &str) -> StreamResult<()> {
        self.send(&ControlMessage::unsubscribe(channel)).await
    }

    async fn send(&self, message: &ControlMessage) -> StreamResult<()> {
        if !self.is_connected() {
            return Err(StreamError::subscription(format!(
                "cannot {:?} {}: stream is {:?}",
                message.kind,
                message.channel,
                self.state()
            )));
        }

        let mut sink = self.sink.lock().await;
        let sink = sink
            .as_mut()
            .ok_or_else(|| StreamError::subscription("no open transport"))?;
        send_control(sink.as_mut(), message)
            .await
            .map_err(|e| StreamError::subscription(e.to_string()))
    }

    /// Read and dispatch messages until `close()` is called
    ///
    /// Reconnects on transport loss. Returns `ReconnectExhausted` once every
    /// allowed attempt has failed.
    pub async fn listen(&self) -> StreamResult<()> {
        let mut shutdown = self.shutdown.subscribe();

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            if !self.is_connected() {
                self.reconnect().await?;
                continue;
            }

            let next = {
                let mut guard = self.source.lock().await;
                let Some(source) = guard.as_mut() else {
                    self.set_state(ConnectionState::Disconnected);
                    continue;
                };
                tokio::select! {
                    message = source.recv() => Some(message),
                    _ = shutdown.changed() => None,
                }
            };

            match next {
                None => continue,
                Some(Ok(Some(text))) => {
                    self.metrics.record_message();
                    self.dispatch(&text).await;
                }
                Some(Ok(None)) => {
                    info!("Market stream closed by server");
                    self.drop_transport().await;
                }
                Some(Err(e)) => {
                    warn!("Market stream error: {}", e);
                    self.drop_transport().await;
                }
            }
        }

        // Shutdown can interrupt a reconnect before any state change
        self.set_state(ConnectionState::Disconnected);
        info!("Stopped listening to market stream");
        Ok(())
    }

    /// Retry with a fixed delay until connected, shut down, or out of attempts
    #[instrument(skip(self))]
    async fn reconnect(&self) -> StreamResult<()> {
        let mut shutdown = self.shutdown.subscribe();
        self.set_state(ConnectionState::Reconnecting);
        let max = self.config.max_reconnect_attempts;

        while self.reconnect_attempts() < max {
            if *shutdown.borrow_and_update() {
                return Ok(());
            }

            let attempt = self.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
            info!("Reconnecting to market stream (attempt {}/{})", attempt, max);

            match self.open().await {
                Ok(()) | Err(StreamError::Closed) => return Ok(()),
                Err(e) => warn!("Reconnect attempt {}/{} failed: {}", attempt, max, e),
            }

            if attempt < max {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                    _ = shutdown.changed() => return Ok(()),
                }
            }
        }

        let attempts = self.reconnect_attempts();
        self.set_state(ConnectionState::Failed);
        error!("Giving up on market stream after {} reconnect attempts", attempts);
        Err(StreamError::ReconnectExhausted { attempts })
    }

    async fn drop_transport(&self) {
        self.sink.lock().await.take();
        self.source.lock().await.take();
        self.set_state(ConnectionState::Disconnected);
    }

    /// Parse one inbound text message and route it to handlers
    ///
    /// Returns how many events were handled successfully. Oversized, malformed,
    /// untyped and unknown messages are dropped.
    pub async fn dispatch(&self, text: &str) -> usize {
        if text.len() > self.config.max_message_size {
            warn!(
                "Dropping {} byte stream message (limit {})",
                text.len(),
                self.config.max_message_size
            );
            return 0;
        }

        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                warn!("Dropping malformed stream message: {}", e);
                return 0;
            }
        };

        let payloads = match value {
            Value::Array(items) => items,
            other => vec![other],
        };

        let mut handled = 0;
        for payload in payloads {
            let Some(event) = StreamEvent::from_value(payload) else {
                debug!("Dropping stream message without a type");
                continue;
            };
            if self.dispatch_event(&event).await {
                handled += 1;
            }
        }
        handled
    }

    async fn dispatch_event(&self, event: &StreamEvent) -> bool {
        if !self
            .config
            .allowed_event_types
            .iter()
            .any(|t| t == &event.event_type)
        {
            warn!("Dropping stream event of unknown type {}", event.event_type);
            return false;
        }

        if event.event_type == "error" {
            warn!("Market stream reported an error: {}", event.payload);
        }

        let handler = self.handlers.read().get(&event.event_type).cloned();
        let Some(handler) = handler else {
            return false;
        };

        match AssertUnwindSafe(handler.handle(event)).catch_unwind().await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!("Error handling {} event: {}", event.event_type, e);
                false
            }
            Err(_) => {
                error!("Handler for {} events panicked", event.event_type);
                false
            }
        }
    }

    /// Stop listening and close the transport. Safe to call more than once.
    ///
    /// Closing is final: later `connect()` calls fail with `StreamError::Closed`.
    pub async fn close(&self) {
        self.shutdown.send_replace(true);

        if let Some(mut sink) = self.sink.lock().await.take() {
            if let Err(e) = sink.close().await {
                debug!("Error closing market stream: {}", e);
            }
        }
        self.source.lock().await.take();
        self.set_state(ConnectionState::Disconnected);
        info!("Market stream closed");
    }
}

async fn discard(sink: &mut dyn TransportSink) {
    if let Err(e) = sink.close().await {
        debug!("Error closing discarded market stream: {}", e);
    }
}

async fn send_control(sink: &mut dyn TransportSink, message: &ControlMessage) -> StreamResult<()> {
    let json = serde_json::to_string(message).map_err(|e| StreamError::Serialize(e.to_string()))?;
    sink.send(json).await
}

impl std::fmt::Debug for StreamConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConnectionManager")
            .field("url", &self.config.ws_url)
            .field("state", &self.state())
            .field("handlers", &self.handlers.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as SyncMutex;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Each connect pops one scripted session; a session replays its messages
    /// and then reports a peer close. With no sessions left the connection
    /// stays open and idle.
    struct ScriptedConnector {
        failures: AtomicU32,
        attempts: AtomicU32,
        sent: Arc<SyncMutex<Vec<String>>>,
        sessions: SyncMutex<VecDeque<Vec<String>>>,
    }

    impl ScriptedConnector {
        fn new(failures: u32, sessions: Vec<Vec<String>>) -> Self {
            Self {
                failures: AtomicU32::new(failures),
                attempts: AtomicU32::new(0),
                sent: Arc::new(SyncMutex::new(Vec::new())),
                sessions: SyncMutex::new(sessions.into()),
            }
        }

        fn sent_values(&self) -> Vec<Value> {
            self.sent
                .lock()
                .iter()
                .map(|s| serde_json::from_str(s).unwrap())
                .collect()
        }
    }

    struct RecordingSink(Arc<SyncMutex<Vec<String>>>);

    #[async_trait]
    impl TransportSink for RecordingSink {
        async fn send(&mut self, text: String) -> StreamResult<()> {
            self.0.lock().push(text);
            Ok(())
        }

        async fn close(&mut self) -> StreamResult<()> {
            Ok(())
        }
    }

    struct ScriptedSource {
        messages: VecDeque<String>,
        idle: bool,
    }

    #[async_trait]
    impl TransportSource for ScriptedSource {
        async fn recv(&mut self) -> StreamResult<Option<String>> {
            if let Some(message) = self.messages.pop_front() {
                return Ok(Some(message));
            }
            if self.idle {
                std::future::pending::<()>().await;
            }
            Ok(None)
        }
    }

    #[async_trait]
    impl StreamConnector for ScriptedConnector {
        async fn connect(
            &self,
            _url: &str,
        ) -> StreamResult<(Box<dyn TransportSink>, Box<dyn TransportSource>)> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(StreamError::connection("connection refused"));
            }

            let session = self.sessions.lock().pop_front();
            let source = ScriptedSource {
                idle: session.is_none(),
                messages: session.unwrap_or_default().into(),
            };
            Ok((
                Box::new(RecordingSink(self.sent.clone())),
                Box::new(source),
            ))
        }
    }

    struct Recorder(SyncMutex<Vec<Value>>);

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(&self, event: &StreamEvent) -> anyhow::Result<()> {
            self.0.lock().push(event.payload.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventHandler for Failing {
        async fn handle(&self, _event: &StreamEvent) -> anyhow::Result<()> {
            anyhow::bail!("bad payload")
        }
    }

    fn config(max_attempts: u32) -> IngestConfig {
        IngestConfig {
            channels: vec!["l2_book".to_string(), "trades".to_string()],
            max_reconnect_attempts: max_attempts,
            reconnect_delay: Duration::from_secs(5),
            max_message_size: 256,
            ..IngestConfig::default()
        }
    }

    #[tokio::test]
    async fn test_connect_subscribes_channels_in_order() {
        let connector = Arc::new(ScriptedConnector::new(0, vec![]));
        let manager = StreamConnectionManager::new(config(3), connector.clone());

        manager.connect().await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(
            connector.sent_values(),
            vec![
                json!({"type": "subscribe", "channel": "l2_book", "market": "all"}),
                json!({"type": "subscribe", "channel": "trades", "market": "all"}),
            ]
        );

        manager.unsubscribe("trades").await.unwrap();
        assert_eq!(connector.sent_values()[2]["type"], "unsubscribe");
    }

    #[tokio::test]
    async fn test_subscribe_requires_connection() {
        let connector = Arc::new(ScriptedConnector::new(1, vec![]));
        let manager = StreamConnectionManager::new(config(3), connector.clone());

        let err = manager.subscribe("ticker").await.unwrap_err();
        assert!(matches!(err, StreamError::Subscription(_)));

        assert!(manager.connect().await.is_err());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.subscribe("ticker").await.is_err());
        assert!(connector.sent.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_gives_up_after_max_attempts() {
        let connector = Arc::new(ScriptedConnector::new(u32::MAX, vec![]));
        let manager = StreamConnectionManager::new(config(3), connector.clone());

        let started = tokio::time::Instant::now();
        let err = manager.listen().await.unwrap_err();

        assert_eq!(err, StreamError::ReconnectExhausted { attempts: 3 });
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(manager.state(), ConnectionState::Failed);

        // Delay between attempts only, not after the last
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(10), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(15), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_type() {
        let connector = Arc::new(ScriptedConnector::new(0, vec![]));
        let manager = StreamConnectionManager::new(config(3), connector);
        let books = Arc::new(Recorder(SyncMutex::new(Vec::new())));
        manager.register_handler("l2_book", books.clone());
        manager.register_handler("ticker", Arc::new(Failing));

        assert_eq!(manager.dispatch(r#"{"type":"l2_book","asset_id":"t1"}"#).await, 1);
        // Allowed but unhandled, unknown type, malformed, untyped
        assert_eq!(manager.dispatch(r#"{"type":"trades"}"#).await, 0);
        assert_eq!(manager.dispatch(r#"{"type":"price_change"}"#).await, 0);
        assert_eq!(manager.dispatch("{not json").await, 0);
        assert_eq!(manager.dispatch(r#"{"asset_id":"t1"}"#).await, 0);
        // Handler failure is contained
        assert_eq!(manager.dispatch(r#"{"type":"ticker"}"#).await, 0);

        let batch = r#"[{"type":"l2_book","asset_id":"t2"},{"type":"foo"},{"event_type":"l2_book","asset_id":"t3"}]"#;
        assert_eq!(manager.dispatch(batch).await, 2);

        let oversized = format!(r#"{{"type":"l2_book","pad":"{}"}}"#, "x".repeat(300));
        assert_eq!(manager.dispatch(&oversized).await, 0);

        let seen: Vec<_> = books.0.lock().iter().map(|v| v["asset_id"].clone()).collect();
        assert_eq!(seen, vec![json!("t1"), json!("t2"), json!("t3")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_listen_reconnects_and_close_ends_loop() {
        let first_session = vec![r#"{"type":"l2_book","asset_id":"t1"}"#.to_string()];
        let connector = Arc::new(ScriptedConnector::new(0, vec![first_session]));
        let manager = Arc::new(StreamConnectionManager::new(config(3), connector.clone()));
        let books = Arc::new(Recorder(SyncMutex::new(Vec::new())));
        manager.register_handler("l2_book", books.clone());

        manager.connect().await.unwrap();
        let listener = tokio::spawn({
            let manager = manager.clone();
            async move { manager.listen().await }
        });

        // First session delivers one event then drops; the second stays idle
        for _ in 0..100 {
            if connector.attempts.load(Ordering::SeqCst) == 2 && manager.is_connected() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(books.0.lock().len(), 1);
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(manager.reconnect_attempts(), 0);
        // Channels re-subscribed on the new connection
        assert_eq!(connector.sent.lock().len(), 4);
        assert_eq!(manager.health().message_count, 1);

        manager.close().await;
        listener.await.unwrap().unwrap();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.health().connected);
    }

    /// Takes 100ms to open; counts sinks closed by the manager
    struct SlowConnector {
        closed_sinks: Arc<AtomicU32>,
    }

    struct CountingSink(Arc<AtomicU32>);

    #[async_trait]
    impl TransportSink for CountingSink {
        async fn send(&mut self, _text: String) -> StreamResult<()> {
            Ok(())
        }

        async fn close(&mut self) -> StreamResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl StreamConnector for SlowConnector {
        async fn connect(
            &self,
            _url: &str,
        ) -> StreamResult<(Box<dyn TransportSink>, Box<dyn TransportSource>)> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let source = ScriptedSource {
                messages: VecDeque::new(),
                idle: true,
            };
            Ok((
                Box::new(CountingSink(self.closed_sinks.clone())),
                Box::new(source),
            ))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_during_reconnect_discards_new_transport() {
        let closed_sinks = Arc::new(AtomicU32::new(0));
        let connector = Arc::new(SlowConnector {
            closed_sinks: closed_sinks.clone(),
        });
        let manager = Arc::new(StreamConnectionManager::new(config(3), connector));

        let listener = tokio::spawn({
            let manager = manager.clone();
            async move { manager.listen().await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(manager.state(), ConnectionState::Reconnecting);
        manager.close().await;

        listener.await.unwrap().unwrap();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.health().connected);
        assert_eq!(closed_sinks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_during_connect_wins() {
        let closed_sinks = Arc::new(AtomicU32::new(0));
        let connector = Arc::new(SlowConnector {
            closed_sinks: closed_sinks.clone(),
        });
        let manager = Arc::new(StreamConnectionManager::new(config(3), connector));

        let connecting = tokio::spawn({
            let manager = manager.clone();
            async move { manager.connect().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        manager.close().await;

        assert_eq!(connecting.await.unwrap(), Err(StreamError::Closed));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(closed_sinks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_closed_manager_stays_closed() {
        let connector = Arc::new(ScriptedConnector::new(0, vec![]));
        let manager = StreamConnectionManager::new(config(3), connector.clone());

        manager.close().await;
        assert_eq!(manager.connect().await, Err(StreamError::Closed));
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 0);

        // Returns immediately instead of reconnecting
        manager.listen().await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }
}
