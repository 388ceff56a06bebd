//! Channel trait: the abstraction over chat platforms.
//!
//! A Channel connects Sagecord to a messaging platform. It yields connection
//! and message events, sends text replies and places reactions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::ChannelError;

/// The identity the bot is connected as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotUser {
    /// Platform user ID
    pub id: String,

    /// Display name
    pub name: String,
}

/// A message received from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Platform message ID (target for reactions)
    pub message_id: String,

    /// The channel the message arrived in; replies go here
    pub channel_id: String,

    /// Sender identifier (platform-specific user ID)
    pub author_id: String,

    /// Human-readable sender name
    #[serde(default)]
    pub author_name: String,

    /// Whether the platform flags the sender as a bot account
    #[serde(default)]
    pub author_is_bot: bool,

    /// The text content
    pub content: String,

    /// When the platform received it
    pub timestamp: DateTime<Utc>,
}

/// Events emitted by a running channel.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// The connection is established and the bot identity is known.
    Ready(BotUser),
    /// A new message was posted somewhere the bot can see.
    Message(ChannelMessage),
}

/// The core Channel trait.
///
/// Implementations handle platform-specific connection logic, payload
/// decoding and authentication.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "discord").
    fn name(&self) -> &str;

    /// Start listening for events.
    ///
    /// Returns a receiver that yields events until the connection is shut
    /// down. Reconnection is the implementation's concern.
    async fn start(
        &self,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<ChannelEvent, ChannelError>>,
        ChannelError,
    >;

    /// Send a text message to a channel.
    async fn send(&self, channel_id: &str, content: &str) -> std::result::Result<(), ChannelError>;

    /// React to a message with an emoji.
    async fn react(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> std::result::Result<(), ChannelError>;

    /// Stop the channel gracefully.
    async fn stop(&self) -> std::result::Result<(), ChannelError> {
        Ok(())
    }
}
