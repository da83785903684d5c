use async_graphql::{Error, ErrorExtensions};
use store::StoreError;
use tracing::error;

pub const ACCESS_DENIED: &str = "Access denied! You don't have permission for this action!";

fn with_code(message: impl Into<String>, code: &'static str) -> Error {
    Error::new(message).extend_with(|_, extensions| extensions.set("code", code))
}

/// Error returned when the role check fails.
pub fn forbidden() -> Error {
    with_code(ACCESS_DENIED, "FORBIDDEN")
}

/// Map a store failure onto a GraphQL error with a `code` extension.
/// Database and hashing details are logged and replaced by a generic message.
pub fn store_error(err: StoreError) -> Error {
    let code = match &err {
        StoreError::NotFound { .. } | StoreError::DeletionFailed { .. } => "NOT_FOUND",
        StoreError::AlreadyExists { .. } => "ALREADY_EXISTS",
        StoreError::InvalidCredentials => "INVALID_CREDENTIALS",
        StoreError::InvalidArgument(_) => "BAD_REQUEST",
        StoreError::Database(_) | StoreError::Credential(_) => "INTERNAL",
    };

    if err.is_client_error() {
        with_code(err.to_string(), code)
    } else {
        error!("Store operation failed: {}", err);
        internal()
    }
}

pub(crate) fn internal() -> Error {
    with_code("Internal server error", "INTERNAL")
}
