use std::fmt;
use std::sync::Arc;

use axum::extract::FromRef;
use common::TokenKeys;
use serde::{Deserialize, Serialize};
use store::UserStore;
use utoipa::{OpenApi, ToSchema};

use crate::gateway::Gateway;
use crate::graphql::{ServiceKind, ServiceSchema};

/// State shared across the handlers of a GraphQL service
#[derive(Clone)]
pub struct AppState {
    pub service: ServiceKind,
    pub schema: Arc<dyn ServiceSchema>,
    pub store: UserStore,
    /// Verifies the credential of each request
    pub keys: TokenKeys,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("service", &self.service)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl FromRef<AppState> for TokenKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

/// State shared across the gateway handlers
#[derive(Clone, Debug)]
pub struct GatewayState {
    pub gateway: Arc<Gateway>,
    pub keys: TokenKeys,
}

impl FromRef<GatewayState> for TokenKeys {
    fn from_ref(state: &GatewayState) -> Self {
        state.keys.clone()
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// `healthy` or `unhealthy`
    pub status: String,
    /// Service version
    pub version: String,
    /// Which process answered: account, admin or gateway
    pub service: String,
    /// Database connection status, absent on the gateway
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Composed upstreams, present on the gateway only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstreams: Option<Vec<String>>,
}

/// OpenAPI documentation of the REST endpoints of a GraphQL service
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::graphql::service_sdl,
    ),
    components(schemas(HealthResponse)),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "schema", description = "Published GraphQL schema"),
    ),
    info(
        title = "usergraph service API",
        description = "REST endpoints of the account and admin GraphQL services. GraphQL itself is served at /graphql.",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ServiceApiDoc;

/// OpenAPI documentation of the REST endpoints of the gateway
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::gateway_health,
        crate::handlers::gateway::gateway_sdl,
    ),
    components(schemas(HealthResponse)),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "schema", description = "Composed GraphQL schema"),
    ),
    info(
        title = "usergraph gateway API",
        description = "REST endpoints of the federation gateway. GraphQL itself is served at /graphql.",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct GatewayApiDoc;
