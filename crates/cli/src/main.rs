//! Sagecord CLI: the main entry point.
//!
//! Connects to Discord and answers every message with a ReAct agent that
//! runs Claude on Vertex AI and can search the web. Configuration comes
//! from the environment (and `.env`).

use std::sync::Arc;

use clap::Parser;
use sagecord_agent::ReactAgent;
use sagecord_channels::{BridgeSettings, ChatBridge, DiscordChannel, DiscordConfig};
use sagecord_config::AppConfig;
use sagecord_core::channel::Channel;
use sagecord_providers::{AccessTokenSource, GcloudToken, StaticToken, VertexAnthropicProvider};
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "sagecord",
    about = "Sagecord: Discord bot backed by a web-searching ReAct agent",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().map_err(|e| format!("Failed to load config: {e}"))?;
    info!(?config, "Configuration loaded");

    let tokens: Arc<dyn AccessTokenSource> = match &config.google_access_token {
        Some(token) => Arc::new(StaticToken::new(token.clone())),
        None => Arc::new(GcloudToken::new()),
    };
    let provider = Arc::new(VertexAnthropicProvider::new(
        config.google_project.clone(),
        config.google_location.clone(),
        tokens,
    ));

    let tools = Arc::new(sagecord_tools::default_registry(&config));
    info!(tools = ?tools.names(), "Tool registry ready");

    let agent = ReactAgent::new(
        provider,
        config.claude_model.clone(),
        config.temperature,
        tools,
    )
    .with_max_iterations(config.max_iterations)
    .with_max_tokens(config.max_tokens);

    let channel = Arc::new(DiscordChannel::new(DiscordConfig::from_config(&config)));
    let bridge = Arc::new(ChatBridge::new(
        Arc::new(agent),
        channel.clone(),
        BridgeSettings::from_config(&config),
    ));

    tokio::select! {
        result = bridge.run() => {
            result?;
            warn!("Discord event stream ended");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    channel.stop().await?;
    Ok(())
}
