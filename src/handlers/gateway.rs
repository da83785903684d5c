use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    response::Json,
};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::gateway::GatewayRequest;
use crate::handlers::credentials::Caller;
use crate::schemas::GatewayState;

/// Plan the request over the composed schema and forward it upstream.
/// The `authorization` header is passed on unchanged.
#[instrument(skip_all)]
pub async fn gateway_handler(
    State(state): State<GatewayState>,
    Caller(claims): Caller,
    headers: HeaderMap,
    Json(request): Json<GatewayRequest>,
) -> Json<Value> {
    if let Some(claims) = &claims {
        debug!("Forwarding request of {}", claims.sub);
    }
    let authorization = headers.get(AUTHORIZATION).cloned();
    Json(state.gateway.execute(request, authorization).await)
}

/// Composed SDL
#[utoipa::path(
    get,
    path = "/sdl",
    tag = "schema",
    responses(
        (status = 200, description = "Composed SDL of all services", body = String, content_type = "text/plain")
    )
)]
pub async fn gateway_sdl(State(state): State<GatewayState>) -> String {
    state.gateway.sdl().to_string()
}
