use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vistula_bot_api::ApiServer;
use vistula_bot_common::TracingSink;
use vistula_bot_core::{BotConfig, BotCore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vistula_bot=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Vistula University assistant API...");

    let config = BotConfig::load()?;
    let core = BotCore::initialize(config, Arc::new(TracingSink)).await?;

    info!(
        "Knowledge base ready: {} records, semantic matching {}",
        core.kb_records(),
        if core.semantic_enabled() { "enabled" } else { "disabled" }
    );

    ApiServer::new(Arc::new(core))
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("API server error: {}", e))?;

    Ok(())
}
