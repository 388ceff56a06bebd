//! Bridge between a chat channel and the agent.
//!
//! Every inbound message is acknowledged with a reaction, stamped with the
//! time and location, and answered by the agent. The answer goes back to the
//! originating channel, followed by the agent's first reasoning trace.

use sagecord_config::{
    AppConfig, DEFAULT_ACK_EMOJI, DEFAULT_CHUNK_LIMIT, DEFAULT_LOCATION_TAG,
};
use sagecord_core::agent::{Agent, AgentError};
use sagecord_core::channel::{BotUser, Channel, ChannelEvent, ChannelMessage};
use sagecord_core::error::ChannelError;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::format;

/// Prefix of the reply sent when the agent rejects a run.
pub const AGENT_ERROR_PREFIX: &str = "Error occurred during agent execution: ";

/// Reply shaping knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeSettings {
    /// Tag appended to the timestamp header.
    pub location: String,
    /// Maximum characters per outgoing message.
    pub chunk_limit: usize,
    /// Reaction placed on every handled message.
    pub ack_emoji: String,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            location: DEFAULT_LOCATION_TAG.into(),
            chunk_limit: DEFAULT_CHUNK_LIMIT,
            ack_emoji: DEFAULT_ACK_EMOJI.into(),
        }
    }
}

impl BridgeSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            location: config.location_tag.clone(),
            chunk_limit: config.chunk_limit,
            ack_emoji: config.ack_emoji.clone(),
        }
    }
}

/// What happened to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// The bot wrote it; nothing was done.
    Ignored,
    /// Replies were sent.
    Replied { messages: usize },
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Agent failed: {0}")]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Routes channel events to the agent.
pub struct ChatBridge {
    agent: Arc<dyn Agent>,
    channel: Arc<dyn Channel>,
    settings: BridgeSettings,
    /// Set once the channel reports who the bot is.
    bot_id: OnceLock<String>,
}

impl ChatBridge {
    pub fn new(agent: Arc<dyn Agent>, channel: Arc<dyn Channel>, settings: BridgeSettings) -> Self {
        Self {
            agent,
            channel,
            settings,
            bot_id: OnceLock::new(),
        }
    }

    /// The bot's own user ID, once known.
    pub fn bot_id(&self) -> Option<&str> {
        self.bot_id.get().map(String::as_str)
    }

    /// Consume channel events until the stream ends.
    ///
    /// Messages are handled on their own tasks. In-flight handlers are
    /// awaited before returning.
    pub async fn run(self: Arc<Self>) -> Result<(), ChannelError> {
        let mut events = self.channel.start().await?;
        let mut tasks = JoinSet::new();
        info!(channel = self.channel.name(), "Bridge started");

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(Ok(ChannelEvent::Ready(user))) => self.on_ready(user),
                    Some(Ok(ChannelEvent::Message(msg))) => {
                        let span = info_span!(
                            "message",
                            request_id = %Uuid::new_v4(),
                            channel_id = %msg.channel_id,
                            author = %msg.author_name,
                        );
                        let bridge = Arc::clone(&self);
                        tasks.spawn(async move { bridge.dispatch(msg).await }.instrument(span));
                    }
                    Some(Err(e)) => warn!("Channel error: {e}"),
                    None => break,
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    log_join(joined);
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }
        info!(channel = self.channel.name(), "Bridge stopped");
        Ok(())
    }

    fn on_ready(&self, user: BotUser) {
        info!(bot = %user.name, id = %user.id, "Logged in");
        if self.bot_id.set(user.id.clone()).is_err() && self.bot_id() != Some(user.id.as_str()) {
            warn!(id = %user.id, "Ready reported a different bot identity; keeping the first");
        }
    }

    async fn dispatch(&self, msg: ChannelMessage) {
        match self.handle_message(&msg).await {
            Ok(Handled::Ignored) => debug!("Ignored own message"),
            Ok(Handled::Replied { messages }) => info!(messages, "Replied"),
            Err(e) => error!(message_id = %msg.message_id, "Message handling failed: {e}"),
        }
    }

    fn is_own(&self, msg: &ChannelMessage) -> bool {
        match self.bot_id.get() {
            Some(id) => msg.author_id == *id,
            None => msg.author_is_bot,
        }
    }

    /// Answer one message.
    pub async fn handle_message(&self, msg: &ChannelMessage) -> Result<Handled, BridgeError> {
        if self.is_own(msg) {
            return Ok(Handled::Ignored);
        }

        self.channel
            .react(&msg.channel_id, &msg.message_id, &self.settings.ack_emoji)
            .await?;

        let question = format::prepare_now(&msg.content, &self.settings.location);
        debug!(question = %question, "Running agent");

        let (answer, log) = match self.agent.run(&question).await {
            Ok(outcome) => {
                let log = outcome.first_log().unwrap_or_default().to_string();
                (outcome.output, log)
            }
            Err(e) if e.is_recoverable() => {
                warn!("Agent rejected the run: {e}");
                (format!("{AGENT_ERROR_PREFIX}{e}"), String::new())
            }
            Err(e) => return Err(e.into()),
        };

        let mut sent = self.send_chunked(&msg.channel_id, &answer).await?;
        if let Some(trace) = format::format_log(&log) {
            sent += self.send_chunked(&msg.channel_id, &trace).await?;
        }
        Ok(Handled::Replied { messages: sent })
    }

    async fn send_chunked(&self, channel_id: &str, text: &str) -> Result<usize, ChannelError> {
        let pieces = format::chunk(text, self.settings.chunk_limit);
        for piece in &pieces {
            self.channel.send(channel_id, piece).await?;
        }
        Ok(pieces.len())
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!("Message handler panicked: {e}");
        } else {
            warn!("Message handler cancelled: {e}");
        }
    }
}
