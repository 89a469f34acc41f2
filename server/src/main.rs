use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::error::Error;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use ticketing_server::config::Config;
use ticketing_server::routes::create_routes;
use ticketing_server::services::ApprovingGateway;
use ticketing_server::state::AppState;
use ticketing_server::store::{MemoryStore, PgStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let gateway = Arc::new(ApprovingGateway);

    let state = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(database_url)
                .await?;
            tracing::info!("Successfully connected to database");

            let store = PgStore::new(pool);
            store.migrate().await?;
            tracing::info!("Migrations run successfully");

            AppState::from_backend(Arc::new(store), gateway, &config)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store; data is lost on exit");
            AppState::from_backend(Arc::new(MemoryStore::new()), gateway, &config)
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = state
        .ledger
        .clone()
        .spawn_sweeper(config.sweep_interval, shutdown_rx);

    let app = create_routes(state, &config);

    let addr = config.bind_addr();
    tracing::info!("🚀 Server running at http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    sweeper.await?;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
