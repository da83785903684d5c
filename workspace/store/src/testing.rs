use migration::{Migrator, MigratorTrait};
use model::entities::user::Role;
use sea_orm::Database;

use crate::users::{NewUser, UserStore};

/// Store over a fresh in-memory SQLite database with migrations applied.
pub(crate) async fn setup_store() -> UserStore {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    UserStore::new(db)
}

/// A new record whose password is `<id>-secret`.
pub(crate) fn new_user(id: &str, username: &str, role: Role) -> NewUser {
    NewUser {
        id: id.to_string(),
        username: username.to_string(),
        password: format!("{}-secret", id),
        role,
    }
}
