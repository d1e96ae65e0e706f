//! Chronicle recorder daemon.
//!
//! Reads JSON-encoded [`RecordedEvent`]s from stdin, one per line, and
//! persists them through the single-writer recorder task. Shuts down
//! gracefully on stdin EOF, SIGINT, or SIGTERM.

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chronicle_db::resolver::ResolverConfig;
use chronicle_events::{RecordedEvent, Recorder};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chronicled=info,chronicle_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ResolverConfig::from_env();
    tracing::info!(
        cache_capacity = config.cache_capacity,
        max_bind_vars = config.max_bind_vars,
        "Loaded resolver configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = chronicle_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    chronicle_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    chronicle_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Recorder ---
    let (recorder, handle) = Recorder::new(pool, config);
    let recorder_task = tokio::spawn(recorder.run());
    tracing::info!("Recorder started, reading events from stdin");

    // --- Input loop ---
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<RecordedEvent>(line) {
                        Ok(event) => {
                            if handle.record(event).await.is_err() {
                                tracing::error!("Recorder stopped unexpectedly");
                                break;
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "Skipping malformed event line"),
                    }
                }
                Ok(None) => {
                    tracing::info!("Stdin closed, draining recorder");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read stdin");
                    break;
                }
            },
            () = &mut shutdown => {
                tracing::info!("Shutdown signal received, draining recorder");
                break;
            }
        }
    }

    // Dropping the last handle lets the recorder drain its queue and exit.
    drop(handle);
    if recorder_task.await.is_err() {
        tracing::error!("Recorder task panicked during shutdown");
    }
    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the daemon shuts
/// down cleanly whether stopped interactively or by a process manager.
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
        () = ctrl_c => {}
        () = terminate => {}
    }
}
