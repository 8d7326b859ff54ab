//! Tavily web search.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::capability::{WebResult, WebSearch};
use crate::error::AgentError;

/// Default Tavily endpoint.
const TAVILY_URL: &str = "https://api.tavily.com/search";

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyHit>,
}

#[derive(Debug, Deserialize)]
struct TavilyHit {
    #[serde(default)]
    content: String,
    #[serde(default)]
    url: Option<String>,
}

/// Web search through the Tavily API.
#[derive(Clone)]
pub struct TavilySearch {
    client: Client,
    api_key: String,
    endpoint: String,
    max_results: usize,
}

impl TavilySearch {
    /// Creates a client returning up to `max_results` hits.
    #[must_use]
    pub fn new(api_key: impl Into<String>, max_results: usize) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            endpoint: TAVILY_URL.to_string(),
            max_results,
        }
    }

    /// Overrides the endpoint URL.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl std::fmt::Debug for TavilySearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TavilySearch")
            .field("endpoint", &self.endpoint)
            .field("max_results", &self.max_results)
            .finish_non_exhaustive()
    }
}

fn parse_results(body: &str, max_results: usize) -> Result<Vec<WebResult>, AgentError> {
    let parsed: TavilyResponse = serde_json::from_str(body).map_err(|e| AgentError::ResponseParse {
        message: format!("invalid Tavily response: {e}"),
        content: body.chars().take(500).collect(),
    })?;
    Ok(parsed
        .results
        .into_iter()
        .filter(|hit| !hit.content.trim().is_empty())
        .take(max_results)
        .map(|hit| WebResult {
            content: hit.content,
            url: hit.url,
        })
        .collect())
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str) -> Result<Vec<WebResult>, AgentError> {
        let body = json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": self.max_results,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::WebSearch {
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| AgentError::WebSearch {
            message: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(AgentError::WebSearch {
                message: format!("HTTP {status}: {}", text.chars().take(200).collect::<String>()),
            });
        }

        let results = parse_results(&text, self.max_results)?;
        debug!(hits = results.len(), "web search");
        Ok(results)
    }
}

/// Stand-in used when no search key is configured.
///
/// Only fails if the workflow actually needs the web fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledWebSearch;

#[async_trait]
impl WebSearch for DisabledWebSearch {
    async fn search(&self, _query: &str) -> Result<Vec<WebResult>, AgentError> {
        Err(AgentError::WebSearch {
            message: "no documents retrieved and TAVILY_API_KEY is not set".to_string(),
        })
    }
}
