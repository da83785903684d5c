use anyhow::Result;
use tracing::{debug, error, info, trace};

use crate::config::connect_database;

pub async fn init_database(database_url: &str) -> Result<()> {
    trace!("Entering init_database function");
    info!("Initializing database");
    debug!("Database URL: {}", database_url);

    match connect_database(database_url).await {
        Ok(_) => info!("Database initialization completed successfully!"),
        Err(e) => {
            error!("Failed to initialize database '{}': {}", database_url, e);
            return Err(e);
        }
    }

    Ok(())
}
