//! Relayed stream events stored per market

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use polybot_services::EventStore;

use super::ErrorResponse;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub market_id: String,
    pub events: Vec<Value>,
    pub count: usize,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/events/{market_id}", get(get_events))
}

/// Unexpired events for a market, ordered by numeric timestamp suffix
async fn get_events(
    State(state): State<AppState>,
    Path(market_id): Path<String>,
) -> impl IntoResponse {
    match load_events(&state, &market_id).await {
        Ok(events) => {
            let count = events.len();
            (
                StatusCode::OK,
                Json(EventsResponse {
                    market_id,
                    events,
                    count,
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to load events for {}: {}", market_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn load_events(state: &AppState, market_id: &str) -> anyhow::Result<Vec<Value>> {
    let store = &state.ctx.store;
    let mut keys = store
        .keys_with_prefix(&format!("market:{}:", market_id))
        .await?;
    // Numeric suffixes first by value, then anything else lexicographically
    keys.sort_by_cached_key(|key| {
        let timestamp = key
            .rsplit(':')
            .next()
            .and_then(|suffix| suffix.parse::<u64>().ok());
        (timestamp.is_none(), timestamp, key.clone())
    });

    let mut events = Vec::with_capacity(keys.len());
    for key in keys {
        // May have expired between the scan and the read
        if let Some(event) = store.get(&key).await? {
            events.push(event);
        }
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{app_state, get_json};
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_events_for_market() {
        let state = app_state().await;
        let store = &state.ctx.store;
        let ttl = Some(Duration::from_secs(60));
        store.set("market:0xc1:2", json!({"seq": 2}), ttl).await.unwrap();
        store.set("market:0xc1:1", json!({"seq": 1}), ttl).await.unwrap();
        store.set("market:0xc2:1", json!({"seq": 9}), ttl).await.unwrap();

        let (status, body) = get_json(routes().with_state(state.clone()), "/events/0xc1").await;
        assert_eq!(status, 200);
        assert_eq!(body["count"], 2);
        assert_eq!(body["events"], json!([{"seq": 1}, {"seq": 2}]));

        let (_, body) = get_json(routes().with_state(state), "/events/unknown").await;
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn test_events_sorted_by_timestamp_value() {
        let state = app_state().await;
        let store = &state.ctx.store;
        let ttl = Some(Duration::from_secs(60));
        store.set("market:0xc1:1000", json!({"seq": 2}), ttl).await.unwrap();
        store.set("market:0xc1:900", json!({"seq": 1}), ttl).await.unwrap();
        store.set("market:0xc1:late", json!({"seq": 3}), ttl).await.unwrap();

        let (_, body) = get_json(routes().with_state(state), "/events/0xc1").await;
        assert_eq!(body["events"], json!([{"seq": 1}, {"seq": 2}, {"seq": 3}]));
    }
}
