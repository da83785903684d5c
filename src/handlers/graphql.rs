use axum::{
    extract::State,
    response::{Html, Json},
};
use async_graphql::http::GraphiQLSource;
use tracing::{debug, instrument};

use crate::handlers::credentials::Caller;
use crate::schemas::AppState;

/// Execute a GraphQL request against the service schema.
/// The caller's claims, if any, are available to resolvers as request data.
#[instrument(skip_all)]
pub async fn graphql_handler(
    State(state): State<AppState>,
    Caller(claims): Caller,
    Json(request): Json<async_graphql::Request>,
) -> Json<async_graphql::Response> {
    debug!(
        service = state.service.name(),
        operation = ?request.operation_name,
        authenticated = claims.is_some(),
        "Executing GraphQL request"
    );

    let request = match claims {
        Some(claims) => request.data(claims),
        None => request,
    };
    Json(state.schema.execute(request).await)
}

/// GraphiQL IDE pointed at `/graphql`.
pub async fn graphiql() -> Html<String> {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

/// Federated SDL of the service
#[utoipa::path(
    get,
    path = "/sdl",
    tag = "schema",
    responses(
        (status = 200, description = "Federated SDL", body = String, content_type = "text/plain")
    )
)]
pub async fn service_sdl(State(state): State<AppState>) -> String {
    state.schema.sdl()
}
