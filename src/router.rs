use crate::handlers::{
    gateway::{gateway_handler, gateway_sdl},
    graphql::{graphiql, graphql_handler, service_sdl},
    health::{gateway_health, health_check},
};
use crate::schemas::{AppState, GatewayApiDoc, GatewayState, ServiceApiDoc};
use axum::{routing::get, Router};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create the router of a GraphQL service (account or admin)
pub fn create_service_router(state: AppState) -> Router {
    let router = Router::new()
        // Health check
        .route("/health", get(health_check))
        // GraphQL endpoint and IDE
        .route("/graphql", get(graphiql).post(graphql_handler))
        .route("/", get(graphiql))
        // Federated SDL
        .route("/sdl", get(service_sdl))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ServiceApiDoc::openapi()))
        .with_state(state);

    with_middleware(router)
}

/// Create the router of the gateway
pub fn create_gateway_router(state: GatewayState) -> Router {
    let router = Router::new()
        .route("/health", get(gateway_health))
        .route("/graphql", get(graphiql).post(gateway_handler))
        .route("/", get(graphiql))
        // Composed SDL, in place of introspection
        .route("/sdl", get(gateway_sdl))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", GatewayApiDoc::openapi()))
        .with_state(state);

    with_middleware(router)
}

fn with_middleware(router: Router) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new())
            .layer(TimeoutLayer::new(Duration::from_secs(30)))
            .layer(CorsLayer::permissive()),
    )
}
