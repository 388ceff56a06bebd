//! Chat channel implementations for Sagecord.
//!
//! Each channel connects to a chat platform and yields events; the
//! [`ChatBridge`] relays messages from a channel to the agent and sends the
//! answers back.
//!
//! Available channels:
//! - **Discord**: gateway WebSocket plus REST API

pub mod bridge;
pub mod discord;
pub mod format;

pub use bridge::{BridgeError, BridgeSettings, ChatBridge, Handled};
pub use discord::{DiscordChannel, DiscordConfig};
