//! Ingestion configuration
//!
//! Defaults match the production venue; every field can be overridden with
//! an `INGEST_`-prefixed environment variable.

use std::env;
use std::time::Duration;

use polybot_core::ConfigError;

const DEFAULT_REST_URL: &str = "https://clob.polymarket.com";
const DEFAULT_WS_URL: &str = "wss://clob.polymarket.com/ws";

/// Configuration for the ingestion engine
#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    /// CLOB REST base URL
    pub rest_url: String,
    /// Streaming endpoint
    pub ws_url: String,
    /// Channels subscribed on every (re)connect, in order
    pub channels: Vec<String>,
    /// Inbound event types accepted for dispatch
    pub allowed_event_types: Vec<String>,
    /// Delay between reconnect attempts
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
    /// Inbound messages larger than this are dropped (bytes)
    pub max_message_size: usize,
    /// Sleep between poll cycles
    pub update_interval: Duration,
    /// Cap on catalog records accumulated per cycle
    pub max_markets: usize,
    /// TTL for relayed stream events in the event store
    pub event_ttl: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            rest_url: DEFAULT_REST_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            channels: to_strings(&["l2_book", "trades", "ticker", "markets"]),
            allowed_event_types: to_strings(&[
                "subscribe",
                "unsubscribe",
                "l2_book",
                "trades",
                "ticker",
                "markets",
                "error",
            ]),
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_attempts: 10,
            max_message_size: 1024 * 1024,
            update_interval: Duration::from_secs(1),
            max_markets: 100,
            event_ttl: Duration::from_secs(86_400),
        }
    }
}

impl IngestConfig {
    /// Load configuration from the environment, falling back to defaults
    ///
    /// Recognized variables:
    /// - INGEST_POLY_REST_URL, INGEST_POLY_WS_URL
    /// - INGEST_WS_CHANNELS, INGEST_ALLOWED_EVENT_TYPES (comma separated)
    /// - INGEST_RECONNECT_DELAY_SECS, INGEST_MAX_RECONNECT_ATTEMPTS
    /// - INGEST_MAX_MESSAGE_SIZE, INGEST_UPDATE_INTERVAL_MS, INGEST_MAX_MARKETS
    /// - INGEST_EVENT_TTL_SECS
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            rest_url: var("INGEST_POLY_REST_URL").unwrap_or(defaults.rest_url),
            ws_url: var("INGEST_POLY_WS_URL").unwrap_or(defaults.ws_url),
            channels: var("INGEST_WS_CHANNELS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.channels),
            allowed_event_types: var("INGEST_ALLOWED_EVENT_TYPES")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.allowed_event_types),
            reconnect_delay: match var("INGEST_RECONNECT_DELAY_SECS") {
                Some(v) => Duration::from_secs(parse_number("INGEST_RECONNECT_DELAY_SECS", &v)?),
                None => defaults.reconnect_delay,
            },
            max_reconnect_attempts: match var("INGEST_MAX_RECONNECT_ATTEMPTS") {
                Some(v) => parse_number("INGEST_MAX_RECONNECT_ATTEMPTS", &v)?,
                None => defaults.max_reconnect_attempts,
            },
            max_message_size: match var("INGEST_MAX_MESSAGE_SIZE") {
                Some(v) => parse_number("INGEST_MAX_MESSAGE_SIZE", &v)?,
                None => defaults.max_message_size,
            },
            update_interval: match var("INGEST_UPDATE_INTERVAL_MS") {
                Some(v) => Duration::from_millis(parse_number("INGEST_UPDATE_INTERVAL_MS", &v)?),
                None => defaults.update_interval,
            },
            max_markets: match var("INGEST_MAX_MARKETS") {
                Some(v) => parse_number("INGEST_MAX_MARKETS", &v)?,
                None => defaults.max_markets,
            },
            event_ttl: match var("INGEST_EVENT_TTL_SECS") {
                Some(v) => Duration::from_secs(parse_number("INGEST_EVENT_TTL_SECS", &v)?),
                None => defaults.event_ttl,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("INGEST_POLY_REST_URL", &self.rest_url),
            ("INGEST_POLY_WS_URL", &self.ws_url),
        ] {
            url::Url::parse(value).map_err(|e| ConfigError::invalid(field, e.to_string()))?;
        }

        if self.channels.is_empty() {
            return Err(ConfigError::Missing("INGEST_WS_CHANNELS".to_string()));
        }
        if self.max_reconnect_attempts == 0 {
            return Err(ConfigError::invalid(
                "INGEST_MAX_RECONNECT_ATTEMPTS",
                "must be at least 1",
            ));
        }
        if self.update_interval.is_zero() {
            return Err(ConfigError::invalid("INGEST_UPDATE_INTERVAL_MS", "must be positive"));
        }
        if self.max_markets == 0 {
            return Err(ConfigError::invalid("INGEST_MAX_MARKETS", "must be at least 1"));
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::invalid("INGEST_MAX_MESSAGE_SIZE", "must be positive"));
        }

        Ok(())
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_number<T>(field: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(field, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = IngestConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, IngestConfig::default());
        assert_eq!(config.update_interval, Duration::from_secs(1));
        assert_eq!(config.max_markets, 100);
        assert_eq!(config.max_reconnect_attempts, 10);
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.channels, vec!["l2_book", "trades", "ticker", "markets"]);
        assert!(config.allowed_event_types.contains(&"error".to_string()));
    }

    #[test]
    fn test_overrides() {
        let config = IngestConfig::from_lookup(lookup(&[
            ("INGEST_WS_CHANNELS", "l2_book, trades ,"),
            ("INGEST_MAX_RECONNECT_ATTEMPTS", "3"),
            ("INGEST_UPDATE_INTERVAL_MS", "250"),
            ("INGEST_MAX_MARKETS", "20"),
            ("INGEST_POLY_WS_URL", "ws://localhost:9000/ws"),
        ]))
        .unwrap();

        assert_eq!(config.channels, vec!["l2_book", "trades"]);
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.update_interval, Duration::from_millis(250));
        assert_eq!(config.max_markets, 20);
        assert_eq!(config.ws_url, "ws://localhost:9000/ws");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = IngestConfig::from_lookup(lookup(&[("INGEST_MAX_MARKETS", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "INGEST_MAX_MARKETS"));

        let err = IngestConfig::from_lookup(lookup(&[("INGEST_MAX_RECONNECT_ATTEMPTS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = IngestConfig::from_lookup(lookup(&[("INGEST_POLY_WS_URL", "not a url")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "INGEST_POLY_WS_URL"));

        let err = IngestConfig::from_lookup(lookup(&[("INGEST_WS_CHANNELS", " , ")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("INGEST_WS_CHANNELS".to_string()));
    }
}
