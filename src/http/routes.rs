//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::game::ServerStats;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .fallback(not_found_handler)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.client_origins))
        .with_state(state)
}

/// CORS for the configured origins, or any origin when none are set
fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(allowed)
    }
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    tick: u64,
    connections: usize,
    active_rooms: usize,
    active_players: usize,
    lobby_size: usize,
}

impl HealthResponse {
    fn from_stats(stats: ServerStats) -> Self {
        Self {
            status: "ok",
            uptime_secs: stats.uptime_secs,
            tick: stats.tick,
            connections: stats.connections,
            active_rooms: stats.active_rooms,
            active_players: stats.active_players,
            lobby_size: stats.lobby_size,
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::from_stats(state.stats()))
}

async fn not_found_handler() -> impl IntoResponse {
    let body = serde_json::json!({
        "error": "Not found"
    });
    (StatusCode::NOT_FOUND, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_body_has_expected_fields() {
        let stats = ServerStats {
            uptime_secs: 12,
            tick: 90,
            connections: 3,
            active_rooms: 1,
            active_players: 2,
            lobby_size: 1,
        };
        let body = serde_json::to_value(HealthResponse::from_stats(stats)).unwrap();

        assert_eq!(body["status"], "ok");
        assert_eq!(body["uptime_secs"], 12);
        assert_eq!(body["tick"], 90);
        assert_eq!(body["active_rooms"], 1);
        assert_eq!(body["active_players"], 2);
        assert_eq!(body["lobby_size"], 1);
    }
}
