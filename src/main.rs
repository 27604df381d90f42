use std::sync::Arc;

use geo_recommendations::{
    api::{create_router, AppState},
    config::Config,
    db::{create_pool, PgSnapshotStore},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("geo_recommendations=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url, config.db_max_connections)?;
    let mut state = AppState::new(Arc::new(PgSnapshotStore::new(pool)));
    if let Some(timeout) = config.request_timeout() {
        state = state.with_request_timeout(timeout);
    }

    let app = create_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(address = %address, "Server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
