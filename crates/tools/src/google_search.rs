//! Google search tool backed by the Custom Search JSON API.
//!
//! The observation handed back to the agent is the snippets of the result
//! page joined by spaces, which keeps the scratchpad compact.

use async_trait::async_trait;
use sagecord_core::error::ToolError;
use sagecord_core::tool::Tool;
use serde::Deserialize;
use tracing::{debug, warn};

const TOOL_NAME: &str = "google_search";
const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";
const DEFAULT_NUM_RESULTS: u8 = 10;
const NO_RESULTS: &str = "No good Google Search Result was found";

pub struct GoogleSearchTool {
    api_key: String,
    engine_id: String,
    base_url: String,
    num_results: u8,
    client: reqwest::Client,
}

impl GoogleSearchTool {
    pub fn new(api_key: impl Into<String>, engine_id: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_key: api_key.into(),
            engine_id: engine_id.into(),
            base_url: DEFAULT_BASE_URL.into(),
            num_results: DEFAULT_NUM_RESULTS,
            client,
        }
    }

    /// Point at a different API host (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Results per query; the API caps this at 10.
    pub fn with_num_results(mut self, n: u8) -> Self {
        self.num_results = n.clamp(1, 10);
        self
    }

    fn failed(reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: TOOL_NAME.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Tool for GoogleSearchTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "A wrapper around Google Search. Useful for when you need to answer questions about current events. Input should be a search query."
    }

    async fn invoke(&self, input: &str) -> Result<String, ToolError> {
        let query = input.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidArguments("search query is empty".into()));
        }

        debug!(query, "Google search");

        let url = format!("{}/customsearch/v1", self.base_url);
        let num = self.num_results.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Self::failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Custom Search API error");
            return Err(Self::failed(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let page: SearchPage = response
            .json()
            .await
            .map_err(|e| Self::failed(format!("unreadable response: {e}")))?;

        Ok(page.snippets())
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchPage {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    snippet: Option<String>,
}

impl SearchPage {
    fn snippets(&self) -> String {
        let snippets: Vec<&str> = self
            .items
            .iter()
            .filter_map(|i| i.snippet.as_deref())
            .collect();
        if snippets.is_empty() {
            NO_RESULTS.to_string()
        } else {
            snippets.join(" ")
        }
    }
}
