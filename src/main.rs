//! Live polling backend entrypoint wiring REST, WebSocket, and storage layers.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod dao;
mod dto;
mod error;
mod routes;
mod services;
mod state;

use config::AppConfig;
use state::{AppState, SharedState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new();

    match config.database_url.clone() {
        Some(database_url) => {
            tokio::spawn(run_store_supervisor(app_state.clone(), database_url));
        }
        None => {
            // No database configured: run on the in-memory store so local
            // sessions work out of the box. Polls do not survive a restart.
            info!("DATABASE_URL not set; using the in-memory store");
            app_state
                .install_poll_store(Arc::new(dao::poll_store::memory::MemoryPollStore::new()))
                .await;
        }
    }

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Supervises the Postgres connection by retrying in the background and
/// toggling degraded mode when connectivity changes.
#[cfg(feature = "postgres-store")]
async fn run_store_supervisor(state: SharedState, database_url: String) {
    use std::time::Duration;

    use tokio::time::sleep;
    use tracing::warn;

    use crate::dao::poll_store::postgres::PostgresPollStore;

    let initial_delay_ms = 1000;
    let mut delay = Duration::from_millis(initial_delay_ms);
    let max_delay = Duration::from_secs(10);

    loop {
        if let Some(store) = state.poll_store().await {
            match store.health_check().await {
                Ok(()) => {
                    // Healthy connection: reset the retry backoff and avoid
                    // hammering the database with pings.
                    delay = Duration::from_millis(initial_delay_ms);
                    sleep(Duration::from_secs(5)).await;
                }
                Err(err) => {
                    // Existing connection failed: drop it, flip to degraded
                    // mode, and retry with exponential backoff.
                    warn!(error = %err, "Postgres ping failed; entering degraded mode");
                    state.clear_poll_store().await;
                    sleep(delay).await;
                    delay = (delay * 2).min(max_delay);
                }
            }
            continue;
        }

        match PostgresPollStore::connect(&database_url).await {
            Ok(store) => {
                // Fresh connection with the schema ensured: install it and
                // leave degraded mode.
                info!("connected to Postgres; leaving degraded mode");
                state.install_poll_store(Arc::new(store)).await;
                delay = Duration::from_millis(initial_delay_ms);
            }
            Err(err) => {
                // Could not reach Postgres at all: wait and retry with
                // exponential backoff.
                warn!(error = %err, "Postgres connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(max_delay);
            }
        }
    }
}

/// Without the Postgres backend compiled in, a configured DATABASE_URL can
/// never be honored; stay degraded rather than silently dropping data.
#[cfg(not(feature = "postgres-store"))]
async fn run_store_supervisor(_state: SharedState, _database_url: String) {
    tracing::warn!("DATABASE_URL is set but the postgres-store feature is disabled");
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
