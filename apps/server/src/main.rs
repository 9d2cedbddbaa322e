mod api;
mod blob_store;
mod config;
mod error;
mod main_lib;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::main_lib::build_state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let state = build_state(&config)?;
    let app = api::app_router(state, config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
