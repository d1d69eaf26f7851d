//! # Course Shop Server
//!
//! Entry point of a server-rendered course shop: a catalogue of courses, a
//! per-user cart, orders, and password accounts with avatars.
//!
//! ## Key Concepts
//! - **Sessions**: server-side records in the document store behind one
//!   signed `shop.sid` cookie
//! - **Request context**: every page request runs through a fixed pipeline
//!   (identity, CSRF, flash, variables, upload) before its handler
//! - **Document store**: JSON documents in SQLite, one table for all
//!   collections

// Module declarations
mod app;         // Router assembly and layer order
mod config;      // Configuration management (environment variables, settings)
mod db;          // Document store, models and per-collection queries
mod error;       // Error handling and custom error types
mod handlers;    // HTTP request handlers (routes)
mod middleware;  // Context composer and its steps, auth guard, headers
mod password;    // Argon2 hashing
mod session;     // Session store adapter, cookie layer, expiry sweep
mod state;       // Shared application state
mod views;       // HTML rendering

use crate::config::Config;
use crate::session::DocumentSessionStore;
use crate::state::AppState;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main application entry point
///
/// Sets up logging, loads configuration and hands over to [`serve`]. Any
/// error before the listener is bound ends the process with a non-zero exit
/// code.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default: info for dependencies, debug for this crate.
    // Overridden by RUST_LOG.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,course_shop=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded: {:?}", config);

    if let Err(e) = serve(config).await {
        tracing::error!("Server stopped: {:#}", e);
        return Err(e);
    }
    Ok(())
}

/// Connect the store, then bind and serve forever.
///
/// The listener is only bound once the store has answered, so a broken
/// database never leaves a half-working server on the port.
async fn serve(config: Config) -> anyhow::Result<()> {
    let app_state = AppState::new(&config).await?;
    tracing::info!("Document store ready");

    let sessions = DocumentSessionStore::new(app_state.store.clone());
    session::spawn_cleanup(
        sessions.clone(),
        Duration::from_secs(config.session_cleanup_secs),
    );

    let app = app::router(app_state, sessions);

    let bind_addr = config.bind_address();
    tracing::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
