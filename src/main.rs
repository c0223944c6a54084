use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use capdex::core::catalog::Catalog;
use capdex::core::config::Config;
use capdex::core::error::{Error, Result};
use capdex::http::server;
use capdex::tail::store::PgCatalogStore;
use capdex::tail::tailer::ChangeTailer;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    let database_url = config
        .database_url
        .clone()
        .ok_or_else(|| Error::internal("DATABASE_URL is required"))?;
    let addr = format!("{}:{}", config.host, config.port);

    let catalog = Arc::new(Catalog::new(config));
    let store = Arc::new(PgCatalogStore::connect(&database_url).await?);

    let tailer = ChangeTailer::new(catalog.clone(), store);
    tailer.bootstrap().await?;
    tokio::spawn(tailer.run());

    let app = server::router(catalog);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "capdex listening");
    axum::serve(listener, app)
        .await
        .map_err(|e| Error::internal(format!("server: {}", e)))?;
    Ok(())
}
