use thiserror::Error;
use tracing::warn;

/// Error types for the account store.
///
/// The Display strings of the record variants are what callers of the GraphQL
/// services get to see, so they stay short and free of internals.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No record with the requested id
    #[error("The id does not exist.")]
    NotFound { id: String },

    /// A record with the id already exists
    #[error("This ID already exists.")]
    AlreadyExists { id: String },

    /// Delete of an id that is not present
    #[error("Deletion failed.")]
    DeletionFailed { id: String },

    /// Secret does not match the stored hash
    #[error("The ID or password was entered incorrectly.")]
    InvalidCredentials,

    /// Paging, sorting or filter arguments that cannot be applied
    #[error("{0}")]
    InvalidArgument(String),

    /// Error from the database operations
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Error from hashing or verifying a secret
    #[error("Credential error: {0}")]
    Credential(#[from] common::AuthError),
}

impl StoreError {
    /// Whether the error is about the caller's input rather than the store itself.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, StoreError::Database(_) | StoreError::Credential(_))
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        let err = StoreError::InvalidArgument(message.into());
        warn!(?err, "Rejected listing arguments");
        err
    }
}

/// Type alias for Result with StoreError
pub type Result<T> = std::result::Result<T, StoreError>;
