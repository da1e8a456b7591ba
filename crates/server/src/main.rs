use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use match_server::config;
use match_server::coordinator::{Coordinator, CoordinatorSettings};
use match_server::db;
use match_server::routes;
use match_server::store::{MatchStore, MemoryStore, PgStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env();

    let store: Arc<dyn MatchStore> = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = db::pool::create_pool(url, config.db_max_connections)
                .await
                .context("Failed to connect to database")?;

            tracing::info!("Running migrations...");
            db::pool::run_migrations(&pool)
                .await
                .context("Failed to run migrations")?;

            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set - matches are kept in memory and lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let coordinator = Coordinator::new(store, CoordinatorSettings::from(&config));
    let app = routes::app(coordinator);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
