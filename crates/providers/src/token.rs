//! OAuth access tokens for Google Cloud endpoints.

use async_trait::async_trait;
use sagecord_core::error::ProviderError;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// gcloud tokens live for an hour; refresh well before that.
const GCLOUD_TOKEN_TTL: Duration = Duration::from_secs(45 * 60);

/// Something that can hand out a bearer token for Vertex AI.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn token(&self) -> Result<String, ProviderError>;
}

/// A fixed token, typically from `GOOGLE_ACCESS_TOKEN`.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn token(&self) -> Result<String, ProviderError> {
        Ok(self.0.clone())
    }
}

/// Asks the `gcloud` CLI for the active account's token and caches it.
pub struct GcloudToken {
    program: String,
    ttl: Duration,
    cached: Mutex<Option<(String, Instant)>>,
}

impl GcloudToken {
    pub fn new() -> Self {
        Self::with_program("gcloud")
    }

    /// Use a different executable (a wrapper script, or a stub in tests).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ttl: GCLOUD_TOKEN_TTL,
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<String, ProviderError> {
        debug!(program = %self.program, "Fetching access token");
        let output = tokio::process::Command::new(&self.program)
            .args(["auth", "print-access-token"])
            .output()
            .await
            .map_err(|e| {
                ProviderError::AuthenticationFailed(format!("failed to run {}: {e}", self.program))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::AuthenticationFailed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(ProviderError::AuthenticationFailed(format!(
                "{} printed no token",
                self.program
            )));
        }
        Ok(token)
    }
}

impl Default for GcloudToken {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccessTokenSource for GcloudToken {
    async fn token(&self) -> Result<String, ProviderError> {
        let mut cached = self.cached.lock().await;
        if let Some((token, fetched_at)) = cached.as_ref()
            && fetched_at.elapsed() < self.ttl
        {
            return Ok(token.clone());
        }

        let token = self.fetch().await?;
        *cached = Some((token.clone(), Instant::now()));
        Ok(token)
    }
}
