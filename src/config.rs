use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use common::TokenKeys;
use config::{Config, Environment, File};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use serde::Deserialize;
use store::UserStore;
use tracing::{debug, info, warn};

use crate::gateway::{Gateway, Subgraph, UpstreamClient};
use crate::graphql::{build_schema, ServiceKind};
use crate::schemas::{AppState, GatewayState};

/// Settings file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "usergraph.toml";

const DEV_SECRET: &str = "usergraph-development-secret";
const DEFAULT_TOKEN_TTL_SECS: i64 = 86_400;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
}

#[derive(Clone, Deserialize)]
pub struct AuthSettings {
    /// Shared HS256 secret of all three processes
    pub secret: String,
    pub token_ttl_secs: u64,
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("secret", &"<redacted>")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSettings {
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    pub bind: String,
    pub account_url: String,
    pub admin_url: String,
    pub request_timeout_secs: u64,
    pub plan_cache_capacity: u64,
}

/// Settings of every process, layered from defaults, an optional TOML file and
/// `USERGRAPH__SECTION__KEY` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub account: ServiceSettings,
    pub admin: ServiceSettings,
    pub gateway: GatewaySettings,
}

impl Settings {
    /// Load settings from `path` (must exist) or from `usergraph.toml` if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();
        let file = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        Self::from_sources(Some(file), None)
    }

    /// Build settings from an optional file and an environment map.
    /// `None` for the environment reads the process environment.
    pub fn from_sources(
        file: Option<(PathBuf, bool)>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let database_url = match &env {
            Some(env) => env.get("DATABASE_URL").cloned(),
            None => std::env::var("DATABASE_URL").ok(),
        };

        let mut builder = Config::builder()
            .set_default("database.url", "sqlite://usergraph.db?mode=rwc")?
            .set_default("auth.secret", DEV_SECRET)?
            .set_default("auth.token_ttl_secs", DEFAULT_TOKEN_TTL_SECS)?
            .set_default("account.bind", "127.0.0.1:4002")?
            .set_default("admin.bind", "127.0.0.1:4001")?
            .set_default("gateway.bind", "127.0.0.1:4000")?
            .set_default("gateway.account_url", "http://127.0.0.1:4002/graphql")?
            .set_default("gateway.admin_url", "http://127.0.0.1:4001/graphql")?
            .set_default("gateway.request_timeout_secs", 30_i64)?
            .set_default("gateway.plan_cache_capacity", 1000_i64)?;

        if let Some((path, required)) = file {
            debug!("Reading settings from {} (required: {})", path.display(), required);
            builder = builder.add_source(File::from(path).required(required));
        }

        builder = builder
            .add_source(
                Environment::with_prefix("USERGRAPH")
                    .prefix_separator("__")
                    .separator("__")
                    .source(env),
            )
            .set_override_option("database.url", database_url)?;

        let settings: Settings = builder
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")?;

        settings.token_ttl()?;

        if settings.auth.secret == DEV_SECRET {
            warn!("Using the built-in development token secret; set USERGRAPH__AUTH__SECRET");
        }
        Ok(settings)
    }

    /// Lifetime of issued tokens. Fails when expiry timestamps would not be representable.
    pub fn token_ttl(&self) -> Result<chrono::Duration> {
        let secs = self.auth.token_ttl_secs;
        i64::try_from(secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .filter(|ttl| chrono::Utc::now().checked_add_signed(*ttl).is_some())
            .with_context(|| format!("auth.token_ttl_secs is out of range: {}", secs))
    }

    pub fn token_keys(&self) -> TokenKeys {
        let ttl = self.token_ttl().unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_TOKEN_TTL_SECS));
        TokenKeys::new(self.auth.secret.as_bytes(), ttl)
    }

    pub fn bind_address(&self, kind: ServiceKind) -> &str {
        match kind {
            ServiceKind::Account => &self.account.bind,
            ServiceKind::Admin => &self.admin.bind,
        }
    }

    /// Upstreams of the gateway in composition order.
    pub fn subgraphs(&self) -> Vec<Subgraph> {
        vec![
            Subgraph {
                name: ServiceKind::Account.name().to_string(),
                url: self.gateway.account_url.clone(),
            },
            Subgraph {
                name: ServiceKind::Admin.name().to_string(),
                url: self.gateway.admin_url.clone(),
            },
        ]
    }
}

/// Connect to the store and bring its schema up to date.
pub async fn connect_database(database_url: &str) -> Result<DatabaseConnection> {
    info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url).await?;
    Migrator::up(&db, None).await?;
    debug!("Database migrations applied");
    Ok(db)
}

/// Initialize the state of one GraphQL service.
pub async fn initialize_service_state(settings: &Settings, kind: ServiceKind) -> Result<AppState> {
    let db = connect_database(&settings.database.url).await?;
    Ok(service_state(kind, UserStore::new(db), settings.token_keys()))
}

pub fn service_state(kind: ServiceKind, store: UserStore, keys: TokenKeys) -> AppState {
    AppState {
        service: kind,
        schema: build_schema(kind, store.clone(), keys.clone()),
        store,
        keys,
    }
}

/// Initialize the gateway: fetch and compose the upstream schemas.
pub async fn initialize_gateway_state(settings: &Settings) -> Result<GatewayState> {
    let client = UpstreamClient::new(Duration::from_secs(settings.gateway.request_timeout_secs))?;
    let gateway = Gateway::connect(
        settings.subgraphs(),
        client,
        settings.gateway.plan_cache_capacity,
    )
    .await?;

    Ok(GatewayState {
        gateway: Arc::new(gateway),
        keys: settings.token_keys(),
    })
}
