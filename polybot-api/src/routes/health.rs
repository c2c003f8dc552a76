//! Health check endpoints

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;

use polybot_services::{SchedulerStatus, StreamHealth, TableStats};

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    stream: StreamHealth,
    scheduler: SchedulerStatus,
    markets: TableStats,
}

/// Healthy only while the market stream is connected; a failed stream
/// reports its exhausted attempt count here
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let stream = state.ctx.stream.health();

    let (status, code) = if stream.connected {
        ("healthy", StatusCode::OK)
    } else {
        ("degraded", StatusCode::SERVICE_UNAVAILABLE)
    };

    let response = HealthResponse {
        status: status.to_string(),
        stream,
        scheduler: state.ctx.scheduler.status().await,
        markets: state.ctx.table.stats(),
    };

    (code, Json(response))
}

/// Simple liveness check (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{app_state, get_json};

    #[tokio::test]
    async fn test_disconnected_stream_is_degraded() {
        let state = app_state().await;
        let app = routes().with_state(state);

        let (status, body) = get_json(app, "/health").await;
        assert_eq!(status, 503);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["stream"]["state"], "disconnected");
        assert_eq!(body["stream"]["max_reconnect_attempts"], 10);
        assert_eq!(body["markets"]["total"], 1);
        assert_eq!(body["scheduler"]["cycles_completed"], 1);
    }
}
