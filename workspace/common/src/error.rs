use thiserror::Error;

/// Error types for credential handling
#[derive(Error, Debug)]
pub enum AuthError {
    /// Token could not be signed, decoded, or has expired
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// The stored hash is malformed or hashing failed
    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    /// Issue time plus lifetime is not a representable timestamp
    #[error("Token expiry is out of range")]
    ExpiryOutOfRange,

    /// The secret does not match the stored hash
    #[error("Password does not match")]
    PasswordMismatch,
}

/// Type alias for Result with AuthError
pub type Result<T> = std::result::Result<T, AuthError>;
