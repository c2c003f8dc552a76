//! Market-related API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use polybot_core::MarketSummary;

use super::ErrorResponse;
use crate::AppState;

/// Query parameters for listing markets
#[derive(Debug, Deserialize)]
pub struct ListMarketsQuery {
    /// Only markets whose `active` flag matches
    pub active: Option<bool>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

/// Response for listing markets
#[derive(Debug, Serialize)]
pub struct MarketsResponse {
    pub markets: Vec<MarketSummary>,
    pub count: usize,
}

/// Create market routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/markets", get(list_markets))
        .route("/markets/{id}", get(get_market))
}

/// List tracked markets, highest 24h volume first
async fn list_markets(
    State(state): State<AppState>,
    Query(params): Query<ListMarketsQuery>,
) -> impl IntoResponse {
    debug!("Listing markets with params: {:?}", params);

    let mut markets: Vec<MarketSummary> = state
        .ctx
        .table
        .list_all()
        .iter()
        .map(MarketSummary::from)
        .filter(|m| params.active.is_none_or(|active| m.active == active))
        .collect();

    markets.sort_by(|a, b| {
        b.volume_24h
            .cmp(&a.volume_24h)
            .then_with(|| a.market_id.cmp(&b.market_id))
    });
    if let Some(limit) = params.limit {
        markets.truncate(limit);
    }

    let count = markets.len();
    info!("Returning {} markets", count);
    Json(MarketsResponse { markets, count })
}

/// Get a single market by market id or condition id
async fn get_market(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.ctx.table.get(&id) {
        Some(record) => (StatusCode::OK, Json(MarketSummary::from(&record))).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Market not found: {}", id),
            }),
        )
            .into_response(),
    }
}
