use async_graphql::{Enum, InputObject, SimpleObject, ID};
use model::entities::user;
use store::UserFilter;

/// Access level of an account.
#[derive(Enum, Copy, Clone, Debug, PartialEq, Eq)]
#[graphql(name = "Role", remote = "model::entities::user::Role")]
pub enum UserRole {
    Guest,
    User,
    Admin,
}

/// An account. The password hash and the external uuid are never exposed.
#[derive(SimpleObject, Clone, Debug, PartialEq, Eq)]
#[graphql(name = "User", shareable)]
pub struct UserObject {
    pub id: ID,
    pub username: String,
    pub role: UserRole,
}

impl From<user::Model> for UserObject {
    fn from(model: user::Model) -> Self {
        Self {
            id: ID(model.id),
            username: model.username,
            role: model.role.into(),
        }
    }
}

/// Listing predicates; unset fields match everything.
/// The `role_*` predicates compare against the role rank (GUEST = 0, USER = 1, ADMIN = 2).
#[derive(InputObject, Clone, Debug, Default)]
#[graphql(name = "UserFilter", rename_fields = "snake_case")]
pub struct UserFilterInput {
    /// Substring of the id or the username
    pub q: Option<String>,
    pub id: Option<ID>,
    pub role: Option<UserRole>,
    pub role_lt: Option<i32>,
    pub role_lte: Option<i32>,
    pub role_gt: Option<i32>,
    pub role_gte: Option<i32>,
}

impl From<UserFilterInput> for UserFilter {
    fn from(input: UserFilterInput) -> Self {
        UserFilter {
            q: input.q,
            id: input.id.map(|id| id.0),
            role: input.role.map(Into::into),
            role_lt: input.role_lt,
            role_lte: input.role_lte,
            role_gt: input.role_gt,
            role_gte: input.role_gte,
        }
    }
}

#[derive(SimpleObject, Clone, Debug, PartialEq, Eq)]
pub struct ListMetadata {
    pub count: i32,
}
