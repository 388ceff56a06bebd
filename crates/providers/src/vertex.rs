//! Claude on Google Vertex AI.
//!
//! Vertex serves Anthropic models through the publisher `rawPredict`
//! endpoint. The body is the Anthropic Messages API payload with two
//! differences:
//! - the model is part of the URL, not the body
//! - `anthropic_version` is a body field (`vertex-2023-10-16`)
//!
//! Authentication is a Google OAuth bearer token.

use async_trait::async_trait;
use sagecord_core::error::ProviderError;
use sagecord_core::message::{Message, Role};
use sagecord_core::provider::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::token::AccessTokenSource;

const VERTEX_ANTHROPIC_VERSION: &str = "vertex-2023-10-16";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Anthropic publisher models on Vertex AI.
pub struct VertexAnthropicProvider {
    name: String,
    base_url: String,
    project: String,
    location: String,
    tokens: Arc<dyn AccessTokenSource>,
    client: reqwest::Client,
}

impl VertexAnthropicProvider {
    /// Create a provider for the given project and region.
    pub fn new(
        project: impl Into<String>,
        location: impl Into<String>,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> Self {
        let location = location.into();
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            name: "vertex-anthropic".into(),
            base_url: format!("https://{location}-aiplatform.googleapis.com"),
            project: project.into(),
            location,
            tokens,
            client,
        }
    }

    /// Create with a custom base URL (e.g., for testing or private endpoints).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/anthropic/models/{}:rawPredict",
            self.base_url, self.project, self.location, model
        )
    }

    /// Reject requests the endpoint could never serve.
    fn validate(&self, request: &ProviderRequest) -> Result<(), ProviderError> {
        if request.model.trim().is_empty() {
            return Err(ProviderError::InvalidRequest("model name must not be empty".into()));
        }
        if self.project.trim().is_empty() {
            return Err(ProviderError::NotConfigured("Google Cloud project is not set".into()));
        }
        if self.location.trim().is_empty() {
            return Err(ProviderError::NotConfigured("Google Cloud location is not set".into()));
        }
        if request.messages.iter().all(|m| m.role == Role::System) {
            return Err(ProviderError::InvalidRequest(
                "at least one user message is required".into(),
            ));
        }
        Ok(())
    }

    /// Extract system messages from the message list.
    /// Anthropic puts the system prompt in a top-level field.
    fn extract_system(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut non_system: Vec<&Message> = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => system_parts.push(&msg.content),
                _ => non_system.push(msg),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        (system, non_system)
    }

    fn build_body(&self, request: &ProviderRequest) -> serde_json::Value {
        let (system, messages) = Self::extract_system(&request.messages);
        let api_messages: Vec<ApiMessage> = messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::Assistant => "assistant",
                    _ => "user",
                },
                content: &m.content,
            })
            .collect();

        let mut body = serde_json::json!({
            "anthropic_version": VERTEX_ANTHROPIC_VERSION,
            "messages": api_messages,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "temperature": request.temperature,
        });

        if let Some(sys) = system {
            body["system"] = serde_json::json!(sys);
        }

        // Anthropic rejects whitespace-only stop sequences.
        let stop: Vec<&String> = request.stop.iter().filter(|s| !s.trim().is_empty()).collect();
        if !stop.is_empty() {
            body["stop_sequences"] = serde_json::json!(stop);
        }

        body
    }

    /// Convert the API response to our ProviderResponse.
    fn to_provider_response(resp: VertexResponse, requested_model: &str) -> ProviderResponse {
        let content = resp
            .content
            .iter()
            .filter_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(text.as_str()),
                ResponseContentBlock::Other => None,
            })
            .collect::<String>();

        let usage = resp.usage.map(|u| Usage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.input_tokens + u.output_tokens,
        });

        ProviderResponse {
            message: Message::assistant(content),
            usage,
            model: resp.model.unwrap_or_else(|| requested_model.to_string()),
            stop_reason: resp.stop_reason,
        }
    }
}

#[async_trait]
impl Provider for VertexAnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.validate(&request)?;

        let url = self.endpoint(&request.model);
        let body = self.build_body(&request);
        let token = self.tokens.token().await?;

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(|secs| secs.ceil() as u64)
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }
        if !(200..300).contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Vertex AI error");
            return Err(match status {
                400 => ProviderError::InvalidRequest(error_body),
                401 | 403 => ProviderError::AuthenticationFailed(error_body),
                404 => ProviderError::ModelNotFound(request.model.clone()),
                _ => ProviderError::ApiError {
                    status_code: status,
                    message: error_body,
                },
            });
        }

        let api_resp: VertexResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: status,
            message: format!("Failed to parse Vertex AI response: {e}"),
        })?;

        Ok(Self::to_provider_response(api_resp, &request.model))
    }
}

// --- Vertex / Anthropic API types ---

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct VertexResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ResponseContentBlock>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}
