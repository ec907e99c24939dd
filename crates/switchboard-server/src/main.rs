//! Switchboard server binary — the call gateway entry point.
//!
//! Starts an axum HTTP server with structured logging, database
//! initialization, the three queue dispatch workers, and graceful shutdown
//! on SIGTERM/SIGINT. The outbound call-control client and the dialogue and
//! audio collaborators are constructed here, once, and injected into the
//! application state.

use std::net::SocketAddr;
use std::sync::Arc;
use switchboard_server::dialogue::{DrainingAudioPipeline, LoggingDialogue};
use switchboard_server::telephony::LoggingCallControl;
use switchboard_server::{app, config, workers, AppState};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("SWITCHBOARD_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration — the server cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    // Initialize database
    let pool = switchboard_db::create_pool(
        &config.database.path,
        switchboard_db::DbRuntimeSettings {
            busy_timeout_ms: config.database.busy_timeout_ms,
            pool_max_size: config.database.pool_max_size,
        },
    )
    .expect("failed to create database pool — check database.path in config");

    {
        let conn = pool
            .get()
            .expect("failed to get database connection for migrations");
        let applied =
            switchboard_db::run_migrations(&conn).expect("failed to run database migrations");
        if applied > 0 {
            tracing::info!(count = applied, "applied database migrations");
        }
    }

    let addr = SocketAddr::new(config.server.host, config.server.port);

    // Collaborators are constructed once here and injected. The bundled
    // implementations log; a deployment swaps in the provider SDK transport
    // and its dialogue engine.
    let state = Arc::new(AppState::new(
        config,
        pool,
        Arc::new(LoggingCallControl),
        Arc::new(LoggingDialogue),
        Arc::new(DrainingAudioPipeline),
    ));

    // Queue dispatch workers, cancelled cooperatively at shutdown.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handles = vec![
        tokio::spawn(workers::run_call_worker(state.clone(), shutdown_rx.clone())),
        tokio::spawn(workers::run_sms_worker(state.clone(), shutdown_rx.clone())),
        tokio::spawn(workers::run_post_worker(state.clone(), shutdown_rx)),
    ];

    let app = app(state);

    tracing::info!(%addr, "starting switchboard server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address — is another process using this port?");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // Stop the workers after the HTTP server has drained.
    let _ = shutdown_tx.send(true);
    for handle in worker_handles {
        let _ = handle.await;
    }

    tracing::info!("switchboard server shut down");
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
