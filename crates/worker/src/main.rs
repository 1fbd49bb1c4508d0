use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ninja_db::lock::WorkerLock;
use ninja_worker::config::WorkerConfig;
use ninja_worker::credentials::EnvCredentials;
use ninja_worker::dispatcher::Dispatcher;
use ninja_worker::handlers::default_registry;
use ninja_worker::store::PgStore;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ninja_worker=info,ninja_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid worker configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(
        poll_interval_secs = config.poll_interval.as_secs(),
        max_connections = config.max_connections,
        "Loaded worker configuration",
    );

    // --- Database ---
    let pool = ninja_db::create_pool(&config.database_url, config.max_connections)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    ninja_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    if config.run_migrations {
        ninja_db::run_migrations(&pool)
            .await
            .expect("Failed to run database migrations");
        tracing::info!("Database migrations applied");
    }

    // --- Single-worker lock ---
    let lock = match WorkerLock::try_acquire(&config.database_url).await {
        Ok(Some(lock)) => lock,
        Ok(None) => {
            tracing::error!("Another worker already holds the worker lock; exiting");
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to acquire the worker lock");
            std::process::exit(1);
        }
    };
    tracing::info!("Worker lock acquired");

    // --- Handlers ---
    let registry = default_registry().expect("Failed to build HTTP clients");

    // --- Dispatcher ---
    let store = Arc::new(PgStore::new(pool.clone()));
    let dispatcher = Dispatcher::new(
        store.clone(),
        store,
        Arc::new(EnvCredentials),
        Arc::new(registry),
    )
    .with_poll_interval(config.poll_interval);

    let cancel = CancellationToken::new();
    let dispatcher_cancel = cancel.clone();
    let dispatcher_handle = tokio::spawn(async move {
        dispatcher.run(dispatcher_cancel).await;
    });

    shutdown_signal().await;
    tracing::info!("Shutdown signal received; finishing the current job");
    cancel.cancel();

    if let Err(e) = dispatcher_handle.await {
        tracing::error!(error = %e, "Dispatcher task ended abnormally");
    }

    if let Err(e) = lock.release().await {
        tracing::warn!(error = %e, "Failed to release the worker lock");
    }
    pool.close().await;
    tracing::info!("Worker stopped");
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
