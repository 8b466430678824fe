use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use lms_recommender::api::{create_router, AppState};
use lms_recommender::config::Config;
use lms_recommender::db::{ProfileStore, ResponseCache};
use lms_recommender::services::LmsClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let cache = Arc::new(ResponseCache::new(Duration::from_secs(config.cache_ttl_secs)));
    let platform = LmsClient::new(
        &config.lms_base_url,
        config.lms_token.clone(),
        Duration::from_secs(config.request_timeout_secs),
        cache,
        config.max_concurrent_fetches,
    )?;
    let profiles = ProfileStore::connect_lazy(&config.database_url)?;

    let state = AppState::new(Arc::new(platform), Arc::new(profiles));
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
