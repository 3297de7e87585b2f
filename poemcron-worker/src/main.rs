//! # poemcron Worker
//!
//! Periodically fetches a poem from the jinrishici sentence endpoint and
//! stores it in the `t_poem` table.
//!
//! ## Startup
//!
//! 1. Open the log file (`POEM_LOG_PATH`)
//! 2. Load configuration (`POEM_CONFIG_PATH`)
//! 3. Connect to the database and ping it
//! 4. Validate the cron expression and start the scheduler
//!
//! Any failure during startup is logged and the process exits non-zero.
//! Ctrl-C or SIGTERM stops the scheduler (letting an in-flight run finish)
//! and exits zero.
//!
//! ## Usage
//!
//! ```bash
//! POEM_CONFIG_PATH=config/config.json cargo run -p poemcron-worker
//! ```

use poemcron_shared::config::PoemConfig;
use poemcron_shared::db::pool::{close_pool, connect};
use poemcron_shared::db::Dialect;
use poemcron_worker::fetcher::PoemFetcher;
use poemcron_worker::jobs::PoemJob;
use poemcron_worker::logging;
use poemcron_worker::scheduler::Scheduler;
use poemcron_worker::store::PoemStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_path = logging::init_logging()?;

    tracing::info!(
        log_path = %log_path.display(),
        "poemcron worker v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    if let Err(e) = run().await {
        tracing::error!(error = %format!("{:#}", e), "Worker failed to start");
        return Err(e);
    }

    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let config = PoemConfig::from_env()?;
    let dialect: Dialect = config.db.driver.parse()?;

    let pool = connect(&config.db).await?;

    let fetcher = PoemFetcher::new(config.token.clone(), &config.http)?;
    let store = PoemStore::new(pool.clone(), dialect);
    let job = PoemJob::new(Arc::new(fetcher), Arc::new(store));

    let scheduler = Scheduler::new(&config.time, Arc::new(job))?;

    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { scheduler.run(cancel).await }
    });

    tracing::info!(schedule = %config.time, "Poem worker started");

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping scheduler...");
    cancel.cancel();

    let stats = handle.await?;
    tracing::info!(
        triggered = stats.triggered,
        failed = stats.failed,
        "Scheduler finished"
    );

    close_pool(pool).await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
