//! ContractAI server binary — the process entry point.
//!
//! Loads settings, initializes structured logging, creates the database
//! pool, bootstraps the schema, and serves the health endpoint with
//! graceful shutdown on SIGTERM/SIGINT.

use std::net::SocketAddr;
use std::sync::Arc;

use contractai_config::Settings;
use contractai_db::PoolSettings;
use contractai_server::AppState;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// The development listener. The production listener is owned by the
/// boundary layer that mounts the domain API in front of this state.
const DEV_ADDR: ([u8; 4], u16) = ([127, 0, 0, 1], 8000);

#[tokio::main]
async fn main() {
    let settings = Settings::from_env()
        .expect("failed to load configuration — the server cannot start without valid settings");

    let filter =
        EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(
        app = %settings.app_name,
        environment = %settings.environment,
        "starting contractai server"
    );

    let pool = contractai_db::create_pool(&settings.database_url, PoolSettings::default())
        .await
        .expect("failed to create database pool — check DATABASE_URL / DB_* settings");

    let applied = contractai_db::init_db(&pool)
        .await
        .expect("failed to run database migrations");
    if applied > 0 {
        tracing::info!(count = applied, "applied database migrations");
    }

    let state = Arc::new(AppState {
        pool,
        settings: Arc::new(settings),
    });
    let app = contractai_server::app(state);

    let addr = SocketAddr::from(DEV_ADDR);
    tracing::info!(%addr, "serving health endpoint");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address — is another process using this port?");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("contractai server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
