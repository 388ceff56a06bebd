//! Model endpoint implementations for Sagecord.
//!
//! All providers implement the `sagecord_core::Provider` trait.

pub mod token;
pub mod vertex;

pub use token::{AccessTokenSource, GcloudToken, StaticToken};
pub use vertex::VertexAnthropicProvider;
