pub mod admin;
pub mod api;
pub mod config;
pub mod forms;
pub mod model;
pub mod seed;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryStore, PostgresStore, RecordStore};

/// Everything needed to serve the admin site, for embedding and tests
pub async fn build_app(config: &crate::config::AppConfig) -> anyhow::Result<axum::Router> {
    use std::sync::Arc;

    let store: Arc<dyn RecordStore> = match config.database_url() {
        Some(database_url) => {
            let postgres_store = PostgresStore::new(
                &database_url,
                config.database.max_connections.unwrap_or(20),
            )
            .await?;
            postgres_store.migrate().await?;
            Arc::new(postgres_store)
        }
        None => {
            log::warn!("No database configured, using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    if config.admin.seed_demo {
        seed::load_seed_data(store.as_ref()).await?;
    }

    let registry = Arc::new(seed::demo_registry());
    let site = seed::build_site(registry, store, &config.admin, admin::Collaborators::default())?;

    Ok(api::routes::create_router().with_state(Arc::new(site)))
}

/// Load `.env` and configuration, set up logging, then serve until shutdown
pub async fn run_server() -> anyhow::Result<()> {
    use axum::serve;
    use env_logger::Builder;
    use log::{info, LevelFilter};
    use tokio::net::TcpListener;

    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Initialize logging with explicit filter to suppress sqlx debug logs
    Builder::new()
        .filter_level(LevelFilter::Info) // Default to Info for everything
        .filter_module("sqlx", LevelFilter::Warn) // Suppress sqlx Debug logs
        .try_init()?;

    let config = crate::config::AppConfig::load()?;
    info!(
        "Configuration loaded: server={}:{}, inline type {}",
        config.server.host,
        config.server.port,
        config.admin.inline_type.as_str()
    );

    let app = build_app(&config).await?;

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    info!("Reverse admin running on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}
