//! Server runtime: build the services from configuration, bind, serve until
//! Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::routes::{router, AppState};
use crate::auth::AuthService;
use crate::config::{AppConfig, ServerConfig};
use crate::db::Store;

fn cors_layer(cfg: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    match cfg.cors_origin.as_deref().map(HeaderValue::from_str) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(_)) => {
            warn!("Ignoring invalid server.cors_origin; allowing any origin");
            layer.allow_origin(Any)
        }
        None => layer.allow_origin(Any),
    }
}

/// Assemble the full application from configuration.
pub fn build_app(config: &AppConfig) -> anyhow::Result<Router> {
    let store = match &config.store.path {
        Some(path) => Store::open(path).context("opening store")?,
        None => {
            warn!("No store.path configured; data lives in memory only");
            Store::in_memory()
        }
    };
    let store = Arc::new(store);
    let auth = AuthService::new(store.clone(), &config.auth)
        .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {e}"))?;

    Ok(router(AppState::new(store, auth))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.server)))
}

pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let app = build_app(&config)?;
    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("binding {}", config.server.bind))?;
    info!(addr = %config.server.bind, "HTTP server listening");

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        info!("HTTP server shutting down gracefully");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("serving HTTP")
}
