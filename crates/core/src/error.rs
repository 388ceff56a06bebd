//! Error types for the Sagecord domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type; the agent and the bridge
//! wrap these where they meet.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    /// The request was rejected before or by the endpoint as malformed
    /// (empty model name, HTTP 400, ...).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Whether the failure stems from the request itself rather than from
    /// the transport or the remote service's health.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_) | Self::ModelNotFound(_) | Self::NotConfigured(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Rate limited on {channel}, retry after {retry_after_secs}s")]
    RateLimited { channel: String, retry_after_secs: u64 },

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),

    #[error("Invalid gateway payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = ProviderError::ApiError {
            status_code: 503,
            message: "Service unavailable".into(),
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("Service unavailable"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = ToolError::ExecutionFailed {
            tool_name: "google_search".into(),
            reason: "quota exceeded".into(),
        };
        assert_eq!(
            err.to_string(),
            "Tool execution failed: google_search: quota exceeded"
        );
    }

    #[test]
    fn validation_classification() {
        assert!(ProviderError::InvalidRequest("empty model".into()).is_validation());
        assert!(ProviderError::ModelNotFound("claude-x".into()).is_validation());
        assert!(!ProviderError::Network("reset".into()).is_validation());
        assert!(!ProviderError::RateLimited { retry_after_secs: 5 }.is_validation());
        assert!(!ProviderError::AuthenticationFailed("expired".into()).is_validation());
    }
}
