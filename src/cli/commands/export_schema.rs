use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::graphql::{export_sdl, ServiceKind};

/// Write the federated SDL of `service` to `output`, or stdout.
pub fn export_schema(service: ServiceKind, output: Option<&Path>) -> Result<()> {
    let sdl = export_sdl(service);
    match output {
        Some(path) => {
            std::fs::write(path, &sdl)
                .with_context(|| format!("Failed to write schema to {}", path.display()))?;
            info!("Wrote {} schema to {}", service.name(), path.display());
        }
        None => print!("{}", sdl),
    }
    Ok(())
}
