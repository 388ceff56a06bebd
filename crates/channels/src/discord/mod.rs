//! Discord channel adapter.
//!
//! Events arrive over the gateway WebSocket; replies and reactions go out
//! over the REST API. The gateway task reconnects on its own with capped
//! exponential backoff and re-identifies each time.

mod gateway;
mod rest;

pub use gateway::DEFAULT_INTENTS;

use async_trait::async_trait;
use sagecord_config::AppConfig;
use sagecord_core::channel::{Channel, ChannelEvent};
use sagecord_core::error::ChannelError;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use gateway::SessionEnd;
use rest::RestClient;

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Discord channel configuration.
#[derive(Clone)]
pub struct DiscordConfig {
    /// Bot token from Discord Developer Portal.
    pub bot_token: String,
    /// REST API root.
    pub api_base: String,
    /// Gateway intents bitmask.
    pub intents: u64,
}

impl DiscordConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: DEFAULT_API_BASE.into(),
            intents: DEFAULT_INTENTS,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.discord_bot_token.clone())
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("bot_token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("intents", &self.intents)
            .finish()
    }
}

/// Discord channel adapter.
pub struct DiscordChannel {
    config: DiscordConfig,
    rest: Arc<RestClient>,
    gateway_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl DiscordChannel {
    pub fn new(config: DiscordConfig) -> Self {
        let rest = Arc::new(RestClient::new(&config.api_base, &config.bot_token));
        Self {
            config,
            rest,
            gateway_task: tokio::sync::Mutex::new(None),
        }
    }
}

/// Keep a gateway session alive until the receiver goes away.
async fn maintain_gateway(
    rest: Arc<RestClient>,
    token: String,
    intents: u64,
    events: mpsc::Sender<Result<ChannelEvent, ChannelError>>,
) {
    let mut attempt: u32 = 0;

    loop {
        let session = async {
            let url = rest.gateway_url().await?;
            let url = format!("{}{}", url.trim_end_matches('/'), gateway::GATEWAY_QUERY);
            gateway::run_session(&url, &token, intents, &events).await
        };

        match session.await {
            Ok(SessionEnd::Shutdown) => break,
            Ok(SessionEnd::Reconnect) => attempt = 0,
            Err(e @ ChannelError::NotConfigured(_)) => {
                warn!("Discord gateway refused the bot: {e}");
                let _ = events.send(Err(e)).await;
                break;
            }
            Err(e) => {
                warn!(attempt, "Discord gateway session failed: {e}");
                attempt = attempt.saturating_add(1);
            }
        }

        if events.is_closed() {
            break;
        }
        let delay = gateway::backoff(attempt);
        info!(delay_secs = delay.as_secs(), "Reconnecting to Discord gateway");
        tokio::time::sleep(delay).await;
    }

    info!("Discord gateway task finished");
}

#[async_trait]
impl Channel for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelEvent, ChannelError>>, ChannelError> {
        if self.config.bot_token.trim().is_empty() {
            return Err(ChannelError::NotConfigured("DISCORD_BOT_TOKEN is not set".into()));
        }

        info!("Discord channel starting");
        let (tx, rx) = mpsc::channel(64);
        let handle = tokio::spawn(maintain_gateway(
            Arc::clone(&self.rest),
            self.config.bot_token.clone(),
            self.config.intents,
            tx,
        ));

        if let Some(previous) = self.gateway_task.lock().await.replace(handle) {
            previous.abort();
        }
        Ok(rx)
    }

    async fn send(&self, channel_id: &str, content: &str) -> Result<(), ChannelError> {
        self.rest.create_message(channel_id, content).await
    }

    async fn react(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), ChannelError> {
        self.rest.add_reaction(channel_id, message_id, emoji).await
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        info!("Discord channel stopping");
        if let Some(task) = self.gateway_task.lock().await.take() {
            task.abort();
        }
        Ok(())
    }
}
