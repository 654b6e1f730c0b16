// src/server/http.rs
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::AppState;
use crate::record::Record;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/latest.json", get(latest))
        .route("/example.json", get(example))
        .route("/stats", get(stats))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Deserialize)]
struct LatestQuery {
    #[serde(default)]
    count: Option<usize>,
}

#[derive(Serialize)]
struct LatestResponse {
    certificates: Vec<Record>,
    count: usize,
}

async fn latest(State(state): State<AppState>, Query(query): Query<LatestQuery>) -> impl IntoResponse {
    let certificates = state.broker.buffer().latest(query.count).await;
    let count = certificates.len();
    Json(LatestResponse { certificates, count })
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

async fn example(State(state): State<AppState>) -> impl IntoResponse {
    match state.broker.buffer().example().await {
        Some(record) => Json(record).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse { error: "No certificates available yet" }),
        )
            .into_response(),
    }
}

#[derive(Serialize)]
struct ClientsSection {
    clients: crate::broker::ClientCounts,
    max_clients_per_endpoint: usize,
}

#[derive(Serialize)]
struct ConfigSection {
    poll_interval: u64,
    batch_size: u64,
    buffer_size: usize,
    client_ping_timeout: u64,
}

#[derive(Serialize)]
struct StatsResponse {
    buffer: crate::record::BufferStats,
    clients: ClientsSection,
    config: ConfigSection,
    metrics: crate::metrics::MetricsSnapshot,
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    let buffer = state.broker.buffer().stats().await;
    let clients = state.broker.client_counts().await;

    Json(StatsResponse {
        buffer,
        clients: ClientsSection {
            clients,
            max_clients_per_endpoint: state.config.max_clients_per_endpoint,
        },
        config: ConfigSection {
            poll_interval: state.config.poll_interval_ms,
            batch_size: state.config.batch_size,
            buffer_size: state.config.buffer_size,
            client_ping_timeout: state.config.client_ping_timeout_ms,
        },
        metrics: crate::metrics::snapshot(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}
