use axum::{extract::State, http::StatusCode, response::Json};
use tracing::{instrument, warn};

use crate::schemas::{AppState, GatewayState, HealthResponse};

/// Health check endpoint of a GraphQL service
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Database is unreachable", body = HealthResponse)
    )
)]
#[instrument(skip_all)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, code, database) = match state.store.connection().ping().await {
        Ok(()) => ("healthy", StatusCode::OK, "connected"),
        Err(e) => {
            warn!("Database ping failed: {}", e);
            ("unhealthy", StatusCode::SERVICE_UNAVAILABLE, "disconnected")
        }
    };

    let response = HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: state.service.name().to_string(),
        database: Some(database.to_string()),
        upstreams: None,
    };

    (code, Json(response))
}

/// Health check endpoint of the gateway
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Gateway is healthy", body = HealthResponse)
    )
)]
#[instrument(skip_all)]
pub async fn gateway_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let upstreams = state
        .gateway
        .supergraph()
        .subgraphs()
        .iter()
        .map(|subgraph| subgraph.name.clone())
        .collect();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "gateway".to_string(),
        database: None,
        upstreams: Some(upstreams),
    })
}
