//! # Sagecord Core
//!
//! Domain types, traits, and error definitions for the Sagecord search relay.
//! This crate has **no transport dependencies**. It defines the domain model
//! that the other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here: the model endpoint
//! ([`Provider`]), the capabilities the agent can call ([`Tool`]), the chat
//! platform ([`Channel`]) and the reasoning loop itself ([`Agent`]).
//! Implementations live in their respective crates, so the bridge and the
//! loop can be exercised with scripted stand-ins.

pub mod agent;
pub mod channel;
pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{Agent, AgentAction, AgentError, AgentOutcome, AgentStep};
pub use channel::{BotUser, Channel, ChannelEvent, ChannelMessage};
pub use error::{ChannelError, ProviderError, ToolError};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use tool::{Tool, ToolRegistry};
