//! Folio outbox worker entry point.

use std::error::Error;
use std::sync::Arc;

use folio_core::clock::SystemClock;
use folio_store::pg_store::PgStore;
use folio_worker::config::WorkerConfig;
use folio_worker::state::WorkerState;
use folio_worker::telemetry;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Read configuration from environment.
    let config = WorkerConfig::from_env()?;

    // Initialize tracing subscriber.
    let tracer_provider = telemetry::init(config.otlp_endpoint.as_deref())?;
    tracing::info!("Starting Folio outbox worker");

    // Create database connection pool.
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    let store = PgStore::new(pool);
    store.migrate().await?;

    // Build the outbox pipeline and start draining.
    let state = WorkerState::new(Arc::new(store), Arc::new(SystemClock), config.dispatcher);
    let cancel = CancellationToken::new();
    let scheduler = state.scheduler().spawn(cancel.clone());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested, stopping outbox scheduler");
    cancel.cancel();
    scheduler.await?;

    if let Some(provider) = tracer_provider {
        provider.shutdown()?;
    }
    Ok(())
}
