//! GraphQL schemas of the account and admin services.
//!
//! Both are federation subgraphs over the same store and publish `User` as an
//! entity keyed by `id`.

pub mod account;
pub mod admin;
mod errors;
mod user;

use std::sync::Arc;

use async_graphql::{Context, EmptySubscription, ObjectType, Schema, SDLExportOptions};
use common::{authorize, Claims, Role, TokenKeys};
use store::UserStore;
use tracing::warn;

/// The GraphQL services this binary can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ServiceKind {
    Account,
    Admin,
}

impl ServiceKind {
    pub fn name(self) -> &'static str {
        match self {
            ServiceKind::Account => "account",
            ServiceKind::Admin => "admin",
        }
    }
}

/// Object-safe view of a service schema so the HTTP layer does not depend on
/// its root types.
#[async_trait::async_trait]
pub trait ServiceSchema: Send + Sync {
    async fn execute(&self, request: async_graphql::Request) -> async_graphql::Response;

    /// Federated SDL, as served by `_service { sdl }`.
    fn sdl(&self) -> String;
}

#[async_trait::async_trait]
impl<Q, M> ServiceSchema for Schema<Q, M, EmptySubscription>
where
    Q: ObjectType + 'static,
    M: ObjectType + 'static,
{
    async fn execute(&self, request: async_graphql::Request) -> async_graphql::Response {
        Schema::execute(self, request).await
    }

    fn sdl(&self) -> String {
        self.sdl_with_options(SDLExportOptions::new().federation())
    }
}

/// Build the schema of `kind` over `store`.
pub fn build_schema(kind: ServiceKind, store: UserStore, keys: TokenKeys) -> Arc<dyn ServiceSchema> {
    match kind {
        ServiceKind::Account => Arc::new(account::schema(store, keys)),
        ServiceKind::Admin => Arc::new(admin::schema(store)),
    }
}

/// Federated SDL of `kind`, built without a store.
pub fn export_sdl(kind: ServiceKind) -> String {
    let options = SDLExportOptions::new().federation();
    match kind {
        ServiceKind::Account => account::schema_builder().finish().sdl_with_options(options),
        ServiceKind::Admin => admin::schema_builder().finish().sdl_with_options(options),
    }
}

/// Fail unless the caller's credential satisfies `required`.
pub(crate) fn require_role(ctx: &Context<'_>, required: &[Role]) -> async_graphql::Result<()> {
    let claims = ctx.data_opt::<Claims>();
    if authorize(claims, required) {
        return Ok(());
    }

    match claims {
        Some(claims) => warn!("Denied {} with role {}", claims.sub, claims.role),
        None => warn!("Denied anonymous caller"),
    }
    Err(errors::forbidden())
}
