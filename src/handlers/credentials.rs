use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
};
use common::{bearer_token, Claims, TokenKeys};
use serde_json::json;
use tracing::{debug, warn};

/// Credential of the caller, `None` for anonymous requests.
///
/// A missing or blank `authorization` header is anonymous; a token that fails
/// verification rejects the whole request with 401.
#[derive(Debug, Clone)]
pub struct Caller(pub Option<Claims>);

/// Rejection for a credential that does not verify.
#[derive(Debug)]
pub struct Unauthorized(String);

impl IntoResponse for Unauthorized {
    fn into_response(self) -> Response {
        let body = json!({
            "data": null,
            "errors": [{
                "message": self.0,
                "extensions": { "code": "UNAUTHENTICATED" }
            }]
        });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    TokenKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Unauthorized;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(AUTHORIZATION) else {
            return Ok(Caller(None));
        };
        let header = value.to_str().map_err(|_| {
            warn!("Authorization header is not valid ASCII");
            Unauthorized("Invalid authorization header.".to_string())
        })?;
        let Some(token) = bearer_token(header) else {
            return Ok(Caller(None));
        };

        match TokenKeys::from_ref(state).verify(token) {
            Ok(claims) => {
                debug!("Authenticated {} as {}", claims.sub, claims.role);
                Ok(Caller(Some(claims)))
            }
            Err(e) => {
                warn!("Rejected credential: {}", e);
                Err(Unauthorized("Invalid or expired token.".to_string()))
            }
        }
    }
}
