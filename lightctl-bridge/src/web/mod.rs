//! HTTP surface for the accessory get/set hooks.

pub mod api;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::accessory::AccessoryRegistry;

/// Build the API router.
pub fn router(registry: Arc<AccessoryRegistry>) -> Router {
    Router::new()
        .route("/api/accessories", get(api::get_accessories))
        .route(
            "/api/accessories/:id",
            get(api::get_accessory).post(api::set_accessory),
        )
        .route("/api/channels", get(api::get_channels))
        .with_state(registry)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the API until the listener fails.
pub async fn start_web_server(
    listen_addr: SocketAddr,
    registry: Arc<AccessoryRegistry>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(registry);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    log::info!("Accessory API listening on http://{}", listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
