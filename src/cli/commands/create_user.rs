use anyhow::Result;
use store::{NewUser, UserStore};
use tracing::{error, info, trace};

use crate::config::{connect_database, Settings};

/// Seed a record directly in the store, bypassing the admin role check.
pub async fn create_user(settings: &Settings, new_user: NewUser) -> Result<()> {
    trace!("Entering create_user command");
    let db = connect_database(&settings.database.url).await?;
    let store = UserStore::new(db);

    match store.create(new_user).await {
        Ok(user) => {
            info!("Created user {} ({}) with role {}", user.id, user.username, user.role);
            println!("{}\t{}\t{}", user.id, user.username, user.role);
            Ok(())
        }
        Err(e) => {
            error!("Failed to create user: {}", e);
            Err(e.into())
        }
    }
}
