//! Restaurant Inventory Platform - Backend Server

use std::{net::SocketAddr, sync::Arc};

use inventory_backend::{
    create_app, AppState, Config, InventoryStore, MemoryStore, PgStore, SystemClock,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; INVENTORY_LOG_FORMAT=json switches to structured output
    let json_logs = std::env::var("INVENTORY_LOG_FORMAT").is_ok_and(|f| f == "json");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "inventory_server=debug,inventory_backend=debug,tower_http=debug,sqlx=warn".into()
            }),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting Restaurant Inventory Server");
    tracing::info!("Environment: {}", config.environment);

    let store: Arc<dyn InventoryStore> = match &config.database.url {
        Some(url) => {
            let store = PgStore::connect(
                url,
                config.database.max_connections,
                config.database.min_connections,
            )
            .await?;

            // Run migrations in development
            if config.environment == "development" {
                store.run_migrations().await?;
            }

            Arc::new(store)
        }
        None => {
            tracing::warn!("No database URL configured, using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    // Create application state
    let state = AppState {
        store,
        config: Arc::new(config.clone()),
        clock: Arc::new(SystemClock),
    };

    // Build application
    let app = create_app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
