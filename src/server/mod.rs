//! HTTP API for KMZ exports.
//!
//! - `GET /health`
//! - `GET /services`: the configured service profiles
//! - `POST /export_kmz`: lot/plans of one profile as a KMZ download

mod handlers;
mod routes;

pub use routes::create_router;

use std::{net::SocketAddr, sync::Arc};

use crate::{arcgis::client::FeatureSource, config::profiles::ServiceProfiles};

/// Shared state for the web server. Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub profiles: Arc<ServiceProfiles>,
    pub source: Arc<dyn FeatureSource>,
}

impl AppState {
    pub fn new(profiles: ServiceProfiles, source: impl FeatureSource + 'static) -> Self {
        Self {
            profiles: Arc::new(profiles),
            source: Arc::new(source),
        }
    }
}

/// Start the web server.
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    log::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
