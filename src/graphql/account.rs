//! Account service: credential issuance and entity references.

use async_graphql::{
    Context, EmptyMutation, EmptySubscription, Object, Result, Schema, SchemaBuilder, ID,
};
use common::TokenKeys;
use store::UserStore;
use tracing::{debug, error, info, trace};

use super::errors::{internal, store_error};
use super::user::UserObject;

pub type AccountSchema = Schema<AccountQuery, EmptyMutation, EmptySubscription>;

pub struct AccountQuery;

#[Object(name = "Query")]
impl AccountQuery {
    /// Exchange an id and password for a signed token.
    async fn login(&self, ctx: &Context<'_>, id: ID, password: String) -> Result<String> {
        trace!("Entering login for {}", id.as_str());
        let store = ctx.data::<UserStore>()?;
        let keys = ctx.data::<TokenKeys>()?;

        let user = store
            .verify_credentials(id.as_str(), &password)
            .await
            .map_err(store_error)?;

        let token = keys.issue(&user.id, user.role).map_err(|e| {
            error!("Failed to sign token for {}: {}", user.id, e);
            internal()
        })?;

        info!("Issued token for {} with role {}", user.id, user.role);
        Ok(token)
    }

    /// Resolve a `User` reference by key; unknown ids resolve to null.
    #[graphql(entity)]
    async fn find_user_by_id(&self, ctx: &Context<'_>, id: ID) -> Result<Option<UserObject>> {
        let store = ctx.data::<UserStore>()?;
        let user = store.find(id.as_str()).await.map_err(store_error)?;
        debug!("Resolved reference {}: found={}", id.as_str(), user.is_some());
        Ok(user.map(UserObject::from))
    }
}

pub fn schema_builder() -> SchemaBuilder<AccountQuery, EmptyMutation, EmptySubscription> {
    Schema::build(AccountQuery, EmptyMutation, EmptySubscription).enable_federation()
}

pub fn schema(store: UserStore, keys: TokenKeys) -> AccountSchema {
    schema_builder().data(store).data(keys).finish()
}
