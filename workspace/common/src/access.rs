use model::entities::user::Role;

use crate::token::Claims;

/// Role check for gated operations.
///
/// Access is granted only to a decoded token whose role is exactly ADMIN, and only
/// when the operation lists ADMIN among its allowed roles. Anonymous callers and
/// every other role are denied.
pub fn authorize(claims: Option<&Claims>, required: &[Role]) -> bool {
    match claims {
        Some(claims) => claims.role == Role::Admin && required.contains(&Role::Admin),
        None => false,
    }
}
