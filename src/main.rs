mod config;
mod llm;
mod platform;
mod relay;

use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::Bot;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::llm::GrokClient;
use crate::relay::Relay;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,grokbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // A missing .env is fine, the variables may come from the environment
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded environment from {}", path.display());
    }

    let config = Config::load().context("Failed to load configuration")?;

    info!("Configuration loaded successfully");
    info!("  Model: {}", config.grok.model);
    info!("  Endpoint: {}", config.grok.effective_base_url());
    info!("  Timeout: {}s", config.grok.timeout_secs);
    info!("  Snippet length: {}", config.relay.max_snippet_len);
    info!("  Bot token length: {} characters", config.telegram.bot_token.len());
    info!("  API key length: {} characters", config.grok.api_key.len());

    let bot = Bot::new(&config.telegram.bot_token);
    let identity = platform::telegram::fetch_identity(&bot).await?;
    info!("Running as {} (id {})", identity.handle, identity.id);

    let grok = GrokClient::new(config.grok.clone())?;
    let relay = Arc::new(Relay::new(
        Arc::new(grok),
        identity,
        config.grok.system_prompt.clone(),
        config.relay.clone(),
    ));

    info!("Bot is starting...");
    platform::telegram::run(bot, relay).await?;

    info!("Bot stopped");
    Ok(())
}
