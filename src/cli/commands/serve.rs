use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{debug, error, info, trace};

use crate::config::{initialize_gateway_state, initialize_service_state, Settings};
use crate::graphql::ServiceKind;
use crate::router::{create_gateway_router, create_service_router};

async fn bind(name: &str, bind_address: &str) -> Result<TcpListener> {
    trace!("Attempting to bind TCP listener to {}", bind_address);
    match TcpListener::bind(bind_address).await {
        Ok(listener) => {
            debug!("{} bound to {}", name, bind_address);
            Ok(listener)
        }
        Err(e) => {
            error!("Failed to bind {} to address {}: {}", name, bind_address, e);
            Err(e.into())
        }
    }
}

async fn run(name: &str, listener: TcpListener, app: Router) -> Result<()> {
    let address = listener.local_addr()?;
    info!("{} running on http://{}/graphql", name, address);
    info!("Swagger UI available at http://{}/swagger-ui", address);

    if let Err(e) = axum::serve(listener, app).await {
        error!("{} server error: {}", name, e);
        return Err(e.into());
    }

    info!("{} shut down", name);
    Ok(())
}

async fn service_app(settings: &Settings, kind: ServiceKind) -> Result<Router> {
    trace!("Initializing {} state", kind.name());
    let state = match initialize_service_state(settings, kind).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize {} state: {}", kind.name(), e);
            return Err(e);
        }
    };
    Ok(create_service_router(state))
}

/// Serve the account or the admin service.
pub async fn serve_service(settings: &Settings, kind: ServiceKind) -> Result<()> {
    info!("Starting {} service", kind.name());
    let app = service_app(settings, kind).await?;
    let listener = bind(kind.name(), settings.bind_address(kind)).await?;
    run(kind.name(), listener, app).await
}

/// Serve the gateway over the configured upstreams.
pub async fn serve_gateway(settings: &Settings) -> Result<()> {
    info!("Starting gateway");
    let state = match initialize_gateway_state(settings).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to compose upstream schemas: {}", e);
            return Err(e);
        }
    };
    let listener = bind("gateway", &settings.gateway.bind).await?;
    run("gateway", listener, create_gateway_router(state)).await
}

/// Serve the whole topology: account, then admin, then the gateway composed from them.
pub async fn serve_all(settings: &Settings) -> Result<()> {
    let mut services = Vec::new();
    for kind in [ServiceKind::Account, ServiceKind::Admin] {
        let app = service_app(settings, kind).await?;
        // Bound before the gateway starts so its schema fetch finds them
        let listener = bind(kind.name(), settings.bind_address(kind)).await?;
        services.push(tokio::spawn(async move { run(kind.name(), listener, app).await }));
    }

    tokio::select! {
        result = serve_gateway(settings) => result,
        (result, _, _) = futures::future::select_all(services) => {
            error!("A service stopped, shutting down");
            result?
        }
    }
}
