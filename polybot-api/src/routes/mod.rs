//! API route definitions

mod events;
mod health;
mod markets;
pub mod ws;

use axum::Router;
use crate::AppState;

/// Create all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(markets::routes())
        .merge(events::routes())
        .merge(health::routes())
}

/// Create WebSocket routes (separate from API)
pub fn ws_routes() -> Router<AppState> {
    ws::routes()
}

/// Error response
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{body::Body, http::Request, Router};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use polybot_core::{
        BookData, BookSource, CatalogEntry, CatalogPage, CatalogSource, FetchError, FetchResult,
        StreamConnector, StreamError, StreamResult, TransportSink, TransportSource,
    };
    use polybot_services::{IngestConfig, IngestContext, MemoryEventStore};

    use crate::AppState;

    struct OneMarket;

    #[async_trait]
    impl CatalogSource for OneMarket {
        async fn fetch_catalog_page(&self, _cursor: Option<&str>) -> FetchResult<CatalogPage> {
            Ok(CatalogPage::new(
                vec![CatalogEntry::new(json!({
                    "id": "m1",
                    "conditionId": "0xc1",
                    "question": "Will it rain?",
                    "tokens": [{"id": "yes1"}]
                }))],
                None,
            ))
        }
    }

    #[async_trait]
    impl BookSource for OneMarket {
        async fn fetch_book(&self, _token_id: &str) -> FetchResult<BookData> {
            Err(FetchError::api(404, "no book"))
        }
    }

    struct Offline;

    #[async_trait]
    impl StreamConnector for Offline {
        async fn connect(
            &self,
            _url: &str,
        ) -> StreamResult<(Box<dyn TransportSink>, Box<dyn TransportSource>)> {
            Err(StreamError::connection("offline"))
        }
    }

    /// State with one polled market and a stream that never connects
    pub async fn app_state() -> AppState {
        let ctx = IngestContext::with_sources(
            IngestConfig::default(),
            Arc::new(OneMarket),
            Arc::new(OneMarket),
            Arc::new(Offline),
            Arc::new(MemoryEventStore::new()),
        );
        ctx.scheduler.run_once().await;
        AppState { ctx: Arc::new(ctx) }
    }

    pub async fn get_json(app: Router, uri: &str) -> (u16, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status().as_u16();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }
}
