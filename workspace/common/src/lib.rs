//! Credential handling shared by the account service, the admin service and the gateway.
//!
//! Tokens are HS256 JWTs carrying the subject id and the account role; all three
//! processes are configured with the same secret so each one can verify what the
//! account service issued.

mod access;
mod error;
mod password;
mod token;

pub use access::authorize;
pub use error::{AuthError, Result};
pub use model::entities::user::Role;
pub use password::{hash_password, verify_password};
pub use token::{bearer_token, Claims, TokenKeys};
