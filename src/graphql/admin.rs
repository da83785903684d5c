//! Admin service: record management, every operation gated by the ADMIN role.

use async_graphql::{Context, EmptySubscription, Object, Result, Schema, SchemaBuilder, ID};
use common::Role;
use store::{ListQuery, NewUser, UserFilter, UserStore};
use tracing::{debug, info, trace};

use super::errors::store_error;
use super::require_role;
use super::user::{ListMetadata, UserFilterInput, UserObject};

pub type AdminSchema = Schema<AdminQuery, AdminMutation, EmptySubscription>;

const ADMIN_ONLY: &[Role] = &[Role::Admin];

pub struct AdminQuery;

#[Object(name = "Query")]
impl AdminQuery {
    /// Read one record.
    #[graphql(name = "User")]
    async fn user(&self, ctx: &Context<'_>, id: ID) -> Result<UserObject> {
        require_role(ctx, ADMIN_ONLY)?;
        let store = ctx.data::<UserStore>()?;

        let user = store.get(id.as_str()).await.map_err(store_error)?;
        Ok(user.into())
    }

    /// Filtered, sorted listing. `perPage: 0` returns every match.
    async fn all_users(
        &self,
        ctx: &Context<'_>,
        #[graphql(default)] page: i32,
        #[graphql(default)] per_page: i32,
        #[graphql(default)] sort_field: String,
        #[graphql(default)] sort_order: String,
        filter: Option<UserFilterInput>,
    ) -> Result<Vec<UserObject>> {
        require_role(ctx, ADMIN_ONLY)?;
        let store = ctx.data::<UserStore>()?;

        let filter: UserFilter = filter.map(Into::into).unwrap_or_default();
        let query = ListQuery::parse(page, per_page, &sort_field, &sort_order, filter)
            .map_err(store_error)?;
        trace!("Listing users with {:?}", query);

        let users = store.list(&query).await.map_err(store_error)?;
        debug!("Returning {} users", users.len());
        Ok(users.into_iter().map(UserObject::from).collect())
    }

    /// Number of records matching `filter`. Paging and sorting are accepted and ignored.
    #[graphql(name = "_allUsersMeta")]
    async fn all_users_meta(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "page", default)] _page: i32,
        #[graphql(name = "perPage", default)] _per_page: i32,
        #[graphql(name = "sortField", default)] _sort_field: String,
        #[graphql(name = "sortOrder", default)] _sort_order: String,
        filter: Option<UserFilterInput>,
    ) -> Result<ListMetadata> {
        require_role(ctx, ADMIN_ONLY)?;
        let store = ctx.data::<UserStore>()?;

        let filter: UserFilter = filter.map(Into::into).unwrap_or_default();
        let count = store.count(&filter).await.map_err(store_error)?;
        Ok(ListMetadata {
            count: i32::try_from(count).unwrap_or(i32::MAX),
        })
    }

    /// Resolve a `User` reference by key; unknown ids resolve to null.
    #[graphql(entity)]
    async fn find_user_by_id(&self, ctx: &Context<'_>, id: ID) -> Result<Option<UserObject>> {
        let store = ctx.data::<UserStore>()?;
        let user = store.find(id.as_str()).await.map_err(store_error)?;
        Ok(user.map(UserObject::from))
    }
}

pub struct AdminMutation;

#[Object(name = "Mutation")]
impl AdminMutation {
    /// Create a GUEST record; the id must be unused.
    async fn create_user(
        &self,
        ctx: &Context<'_>,
        id: ID,
        username: String,
        password: String,
    ) -> Result<UserObject> {
        require_role(ctx, ADMIN_ONLY)?;
        let store = ctx.data::<UserStore>()?;

        let user = store
            .create(NewUser {
                id: id.0,
                username,
                password,
                role: Role::Guest,
            })
            .await
            .map_err(store_error)?;
        info!("Admin created user {}", user.id);
        Ok(user.into())
    }

    /// Rename a record; nothing else changes.
    async fn update_user(&self, ctx: &Context<'_>, id: ID, username: String) -> Result<UserObject> {
        require_role(ctx, ADMIN_ONLY)?;
        let store = ctx.data::<UserStore>()?;

        let user = store
            .update_username(id.as_str(), &username)
            .await
            .map_err(store_error)?;
        Ok(user.into())
    }

    /// Remove a record and return it as it was.
    async fn delete_user(&self, ctx: &Context<'_>, id: ID) -> Result<UserObject> {
        require_role(ctx, ADMIN_ONLY)?;
        let store = ctx.data::<UserStore>()?;

        let user = store.delete(id.as_str()).await.map_err(store_error)?;
        info!("Admin deleted user {}", user.id);
        Ok(user.into())
    }
}

pub fn schema_builder() -> SchemaBuilder<AdminQuery, AdminMutation, EmptySubscription> {
    Schema::build(AdminQuery, AdminMutation, EmptySubscription).enable_federation()
}

pub fn schema(store: UserStore) -> AdminSchema {
    schema_builder().data(store).finish()
}
