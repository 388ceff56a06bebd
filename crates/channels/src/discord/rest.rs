//! Discord HTTP API calls.

use std::time::Duration;

use sagecord_core::error::ChannelError;
use serde::Deserialize;
use tracing::{debug, warn};

const CHANNEL: &str = "discord";
const DEFAULT_RETRY_AFTER_SECS: f64 = 1.0;
const MAX_RETRY_AFTER_SECS: f64 = 300.0;
/// Extra attempts made after a 429 before giving up.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Thin client over the few REST endpoints the bot needs.
pub(crate) struct RestClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

#[derive(Deserialize)]
struct GatewayBot {
    url: String,
}

/// Outcome of one HTTP attempt.
enum Attempt {
    Done(reqwest::Response),
    Throttled(f64),
}

impl RestClient {
    pub(crate) fn new(api_base: &str, token: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }

    /// The WebSocket URL to connect to.
    pub(crate) async fn gateway_url(&self) -> Result<String, ChannelError> {
        let url = format!("{}/gateway/bot", self.api_base);
        let lookup_failed = |e: reqwest::Error| {
            ChannelError::ConnectionLost(format!("gateway lookup failed: {e}"))
        };
        let response = self.send(|| self.http.get(&url), lookup_failed).await?;
        let body: GatewayBot = response
            .json()
            .await
            .map_err(|e| ChannelError::InvalidPayload(e.to_string()))?;
        Ok(body.url)
    }

    /// `POST /channels/{id}/messages`
    pub(crate) async fn create_message(
        &self,
        channel_id: &str,
        content: &str,
    ) -> Result<(), ChannelError> {
        debug!(channel_id, content_len = content.len(), "Discord send");
        let url = format!("{}/channels/{}/messages", self.api_base, channel_id);
        let body = serde_json::json!({ "content": content });
        self.send(|| self.http.post(&url).json(&body), delivery_failed)
            .await
            .map(|_| ())
    }

    /// `PUT /channels/{id}/messages/{mid}/reactions/{emoji}/@me`
    pub(crate) async fn add_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), ChannelError> {
        let url = format!(
            "{}/channels/{}/messages/{}/reactions/{}/@me",
            self.api_base,
            channel_id,
            message_id,
            urlencoding::encode(emoji)
        );
        self.send(|| self.http.put(&url), delivery_failed)
            .await
            .map(|_| ())
    }

    /// Send an authorized request, waiting out rate limits.
    ///
    /// A 429 sleeps for `Retry-After` and tries again, up to
    /// [`MAX_RATE_LIMIT_RETRIES`] times; after that the limit is returned as
    /// [`ChannelError::RateLimited`].
    async fn send<B, E>(
        &self,
        build: B,
        on_transport: E,
    ) -> Result<reqwest::Response, ChannelError>
    where
        B: Fn() -> reqwest::RequestBuilder,
        E: Fn(reqwest::Error) -> ChannelError,
    {
        let mut retries = 0;
        loop {
            let response = build()
                .header("Authorization", self.auth())
                .send()
                .await
                .map_err(&on_transport)?;
            match check(response).await? {
                Attempt::Done(response) => return Ok(response),
                Attempt::Throttled(retry_after) if retries < MAX_RATE_LIMIT_RETRIES => {
                    retries += 1;
                    warn!(retry_after, retries, "Discord rate limit, waiting");
                    tokio::time::sleep(Duration::from_secs_f64(retry_after)).await;
                }
                Attempt::Throttled(retry_after) => {
                    warn!(retry_after, "Discord rate limit, giving up");
                    return Err(ChannelError::RateLimited {
                        channel: CHANNEL.into(),
                        retry_after_secs: retry_after.ceil() as u64,
                    });
                }
            }
        }
    }
}

fn delivery_failed(e: reqwest::Error) -> ChannelError {
    ChannelError::DeliveryFailed {
        channel: CHANNEL.into(),
        reason: e.to_string(),
    }
}

async fn check(response: reqwest::Response) -> Result<Attempt, ChannelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(Attempt::Done(response));
    }

    match status.as_u16() {
        429 => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
                .min(MAX_RETRY_AFTER_SECS);
            Ok(Attempt::Throttled(retry_after))
        }
        401 => Err(ChannelError::NotConfigured(
            "Discord rejected the bot token (HTTP 401)".into(),
        )),
        code => {
            let body = response.text().await.unwrap_or_default();
            Err(ChannelError::DeliveryFailed {
                channel: CHANNEL.into(),
                reason: format!("HTTP {code}: {body}"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn create_message_posts_content_with_bot_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/42/messages"))
            .and(header("Authorization", "Bot secret"))
            .and(body_json(serde_json::json!({ "content": "Tokyo" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "1" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = RestClient::new(&server.uri(), "secret");
        client.create_message("42", "Tokyo").await.unwrap();
    }

    #[tokio::test]
    async fn reaction_emoji_is_percent_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/channels/42/messages/7/reactions/%F0%9F%92%AC/@me"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = RestClient::new(&server.uri(), "secret");
        client.add_reaction("42", "7", "💬").await.unwrap();
    }

    #[tokio::test]
    async fn rate_limit_reports_retry_after_once_retries_run_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0.01"))
            .expect(u64::from(MAX_RATE_LIMIT_RETRIES) + 1)
            .mount(&server)
            .await;

        let client = RestClient::new(&server.uri(), "secret");
        let err = client.create_message("42", "hi").await.unwrap_err();
        assert!(matches!(
            err,
            ChannelError::RateLimited {
                retry_after_secs: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn rate_limited_send_is_retried_after_waiting() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0.05"))
            .up_to_n_times(1)
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({ "content": "hi" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "2" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = RestClient::new(&server.uri(), "secret");
        client.create_message("42", "hi").await.unwrap();
    }

    #[tokio::test]
    async fn rejected_token_is_not_configured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gateway/bot"))
            .respond_with(ResponseTemplate::new(401).set_body_string("401: Unauthorized"))
            .expect(1)
            .mount(&server)
            .await;

        let client = RestClient::new(&server.uri(), "stale");
        let err = client.gateway_url().await.unwrap_err();
        assert!(matches!(err, ChannelError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn other_failures_carry_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Missing Permissions"))
            .mount(&server)
            .await;

        let client = RestClient::new(&server.uri(), "secret");
        let err = client.create_message("42", "hi").await.unwrap_err();
        let text = err.to_string();
        assert!(text.contains("403"));
        assert!(text.contains("Missing Permissions"));
    }

    #[tokio::test]
    async fn gateway_url_is_read_from_bot_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gateway/bot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "url": "wss://gateway.discord.gg",
                "shards": 1
            })))
            .mount(&server)
            .await;

        let client = RestClient::new(&server.uri(), "secret");
        assert_eq!(client.gateway_url().await.unwrap(), "wss://gateway.discord.gg");
    }
}
