//! Agent trait and the result of one reasoning run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::error::ProviderError;

/// A tool invocation chosen by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAction {
    /// Name of the tool to call
    pub tool: String,

    /// Raw text passed to the tool
    pub tool_input: String,

    /// The model output that produced this action (thought + action lines)
    pub log: String,
}

/// One completed step: the action taken and what it observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStep {
    pub action: AgentAction,
    pub observation: String,
}

/// The result of a reasoning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutcome {
    /// The final answer text
    pub output: String,

    /// Ordered intermediate steps
    pub intermediate_steps: Vec<AgentStep>,

    /// Number of model calls made
    pub iterations: usize,
}

impl AgentOutcome {
    /// The log of the first intermediate step, if any step was taken.
    pub fn first_log(&self) -> Option<&str> {
        self.intermediate_steps.first().map(|s| s.action.log.as_str())
    }
}

/// Failures surfaced by a reasoning run.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The run was rejected as invalid. Callers report these to the user.
    #[error("{0}")]
    Invalid(String),

    /// The model endpoint failed in a way the loop cannot work around.
    #[error("Provider error: {0}")]
    Provider(ProviderError),
}

impl AgentError {
    /// Whether the caller should turn this into a user-visible reply.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }
}

impl From<ProviderError> for AgentError {
    fn from(err: ProviderError) -> Self {
        if err.is_validation() {
            Self::Invalid(err.to_string())
        } else {
            Self::Provider(err)
        }
    }
}

/// The reasoning loop as seen by its callers.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Answer a free-text question, possibly calling tools along the way.
    async fn run(&self, question: &str) -> std::result::Result<AgentOutcome, AgentError>;
}
