use std::net::SocketAddr;

use axum::Router;
use common::{Role, TokenKeys};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use store::{NewUser, UserStore};
use tokio::net::TcpListener;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::config::service_state;
use crate::graphql::ServiceKind;
use crate::router::create_service_router;

/// Create an in-memory SQLite database for testing
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");

    // Run migrations
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

pub fn test_keys() -> TokenKeys {
    TokenKeys::new(b"integration-test-secret", chrono::Duration::hours(1))
}

/// Store seeded with one record per role. Passwords are `<id>-secret`.
pub async fn setup_test_store() -> UserStore {
    let store = UserStore::new(setup_test_db().await);

    for (id, username, role) in [
        ("root", "Root", Role::Admin),
        ("alice", "Alice", Role::User),
        ("bob", "Bob", Role::Guest),
    ] {
        store
            .create(NewUser {
                id: id.to_string(),
                username: username.to_string(),
                password: format!("{}-secret", id),
                role,
            })
            .await
            .expect("Failed to seed test user");
    }

    store
}

/// `authorization` header value carrying a fresh token for `id`.
pub fn bearer(keys: &TokenKeys, id: &str, role: Role) -> String {
    format!("Bearer {}", keys.issue(id, role).expect("Failed to issue token"))
}

/// Initialize tracing for tests with output to STDERR.
///
/// The log level is taken from RUST_LOG, defaulting to WARN. The subscriber is
/// active until the returned guard is dropped.
pub fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| level.parse::<Level>().ok())
        .unwrap_or(Level::WARN);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_default(subscriber)
}

/// Router of one GraphQL service over `store`
pub fn service_app(kind: ServiceKind, store: UserStore) -> Router {
    create_service_router(service_state(kind, store, test_keys()))
}

/// Serve `app` on an ephemeral local port and return its address.
pub async fn spawn_server(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let address = listener.local_addr().expect("Listener has no address");
    tokio::spawn(async move { axum::serve(listener, app).await });
    address
}
