use common::{hash_password, verify_password, AuthError};
use model::entities::user::{self, Role};
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Select, Set, SqlErr,
};
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{Result, StoreError};
use crate::listing::{ListQuery, SortField, UserFilter};

/// Fields required to create an account record.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub username: String,
    /// Plain secret; only its hash is persisted
    pub password: String,
    pub role: Role,
}

/// Record operations over the shared `users` table.
#[derive(Clone, Debug)]
pub struct UserStore {
    db: DatabaseConnection,
}

impl UserStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Look up a record, `None` if the id is unknown.
    #[instrument(skip(self))]
    pub async fn find(&self, id: &str) -> Result<Option<user::Model>> {
        trace!("Looking up user with ID: {}", id);
        Ok(user::Entity::find_by_id(id.to_string()).one(&self.db).await?)
    }

    /// Look up a record that must exist.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<user::Model> {
        match self.find(id).await? {
            Some(user) => {
                debug!("Found user {} ({})", user.id, user.username);
                Ok(user)
            }
            None => {
                warn!("User with ID {} not found", id);
                Err(StoreError::NotFound { id: id.to_string() })
            }
        }
    }

    /// Filtered, ordered and optionally paginated listing.
    #[instrument(skip(self))]
    pub async fn list(&self, query: &ListQuery) -> Result<Vec<user::Model>> {
        let mut select = filtered(&query.filter)
            .order_by(query.sort_field.column(), query.sort_order.order());

        // Keep pages stable when the sort column has duplicates
        if query.sort_field != SortField::Id {
            select = select.order_by_asc(user::Column::Id);
        }

        if let Some((offset, limit)) = query.window() {
            trace!("Applying window offset={} limit={}", offset, limit);
            select = select.offset(offset).limit(limit);
        }

        let users = select.all(&self.db).await?;
        debug!("Retrieved {} users from database", users.len());
        Ok(users)
    }

    /// Number of records matching the filter.
    #[instrument(skip(self))]
    pub async fn count(&self, filter: &UserFilter) -> Result<u64> {
        let count = filtered(filter)
            .count(&self.db)
            .await?;
        debug!("Counted {} users", count);
        Ok(count)
    }

    /// Insert a new record; the id must not be taken.
    #[instrument(skip(self, new_user), fields(id = %new_user.id, username = %new_user.username))]
    pub async fn create(&self, new_user: NewUser) -> Result<user::Model> {
        trace!("Entering create");

        if self.find(&new_user.id).await?.is_some() {
            warn!("User with ID {} already exists", new_user.id);
            return Err(StoreError::AlreadyExists { id: new_user.id });
        }

        let password = hash_password(&new_user.password)?;
        let active = user::ActiveModel {
            id: Set(new_user.id.clone()),
            username: Set(new_user.username),
            password: Set(password),
            role: Set(new_user.role),
            ..Default::default()
        };

        match active.insert(&self.db).await {
            Ok(user) => {
                info!("User created successfully with ID: {}, username: {}", user.id, user.username);
                Ok(user)
            }
            // Lost a race with a concurrent create of the same id
            Err(db_error) if matches!(db_error.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                warn!("User with ID {} was created concurrently", new_user.id);
                Err(StoreError::AlreadyExists { id: new_user.id })
            }
            Err(db_error) => Err(db_error.into()),
        }
    }

    /// Change the display name; no other field is mutable.
    #[instrument(skip(self))]
    pub async fn update_username(&self, id: &str, username: &str) -> Result<user::Model> {
        let existing = self.get(id).await?;

        let mut active: user::ActiveModel = existing.into();
        active.username = Set(username.to_string());
        let updated = active.update(&self.db).await?;

        info!("User with ID {} updated successfully, username: {}", updated.id, updated.username);
        Ok(updated)
    }

    /// Remove a record and return what was removed.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<user::Model> {
        let Some(existing) = self.find(id).await? else {
            warn!("User with ID {} not found for deletion", id);
            return Err(StoreError::DeletionFailed { id: id.to_string() });
        };

        let result = user::Entity::delete_by_id(id.to_string()).exec(&self.db).await?;
        debug!("Delete operation completed. Rows affected: {}", result.rows_affected);
        if result.rows_affected == 0 {
            warn!("User with ID {} vanished before deletion", id);
            return Err(StoreError::DeletionFailed { id: id.to_string() });
        }

        info!("User with ID {} deleted successfully", id);
        Ok(existing)
    }

    /// Check an id/secret pair and return the matching record.
    #[instrument(skip(self, password))]
    pub async fn verify_credentials(&self, id: &str, password: &str) -> Result<user::Model> {
        let user = self.get(id).await?;

        match verify_password(password, &user.password) {
            Ok(()) => {
                debug!("Credentials verified for {}", id);
                Ok(user)
            }
            Err(AuthError::PasswordMismatch) => {
                warn!("Wrong password supplied for {}", id);
                Err(StoreError::InvalidCredentials)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn filtered(filter: &UserFilter) -> Select<user::Entity> {
    let select = user::Entity::find();
    if filter.is_empty() {
        trace!("No filter applied");
        select
    } else {
        select.filter(filter.condition())
    }
}
