//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::AgentError;

/// Default chat model.
const DEFAULT_CHAT_MODEL: &str = "gpt-4o";
/// Default embedding model.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
/// Output dimension of the default embedding model.
const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
/// Texts per embedding call.
const DEFAULT_EMBED_BATCH_SIZE: usize = 16;
/// Pause between embedding batches.
const DEFAULT_EMBED_BATCH_DELAY: Duration = Duration::from_secs(1);
/// Pause between single-item embedding retries.
const DEFAULT_EMBED_ITEM_DELAY: Duration = Duration::from_millis(100);
/// Documents returned per sub-question.
const DEFAULT_RETRIEVAL_TOP_K: usize = 3;
/// Maximum concurrent sub-question searches.
const DEFAULT_MAX_CONCURRENCY: usize = 8;
/// Question rewrites allowed before the workflow gives up.
const DEFAULT_MAX_REWRITES: usize = 3;
/// Default maximum tool-calling loop iterations.
const DEFAULT_MAX_TOOL_ITERATIONS: usize = 10;
/// Web results joined into the fallback document.
const DEFAULT_WEB_RESULTS: usize = 3;
/// Upstage's OpenAI-compatible endpoint.
const DEFAULT_GROUNDEDNESS_BASE_URL: &str = "https://api.upstage.ai/v1/solar";
/// Model name of the groundedness checker.
const DEFAULT_GROUNDEDNESS_MODEL: &str = "groundedness-check";

/// Configuration for the advisory engine.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the chat and embedding provider.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Model used for decomposition, generation, rewriting and the agent.
    pub chat_model: String,
    /// Embedding model name.
    pub embedding_model: String,
    /// Embedding vector length; also the length of the zero-vector
    /// placeholder for texts that fail to embed.
    pub embedding_dimension: usize,
    /// Texts per embedding request.
    pub embed_batch_size: usize,
    /// Pause between embedding batches.
    pub embed_batch_delay: Duration,
    /// Pause between single-item embedding retries.
    pub embed_item_delay: Duration,
    /// Similarity-search results per sub-question.
    pub retrieval_top_k: usize,
    /// Maximum concurrent sub-question searches.
    pub max_concurrency: usize,
    /// Rewrite budget for the retrieval workflow.
    pub max_rewrites: usize,
    /// Maximum tool-calling loop iterations before aborting.
    pub max_tool_iterations: usize,
    /// API key for the groundedness checker. Falls back to `api_key`.
    pub groundedness_api_key: Option<String>,
    /// Base URL of the groundedness checker.
    pub groundedness_base_url: String,
    /// Model name of the groundedness checker.
    pub groundedness_model: String,
    /// Tavily API key; web fallback is unavailable without it.
    pub tavily_api_key: Option<String>,
    /// Base URL of the insect and leaf-disease classification service.
    pub classifier_url: Option<String>,
    /// Web results joined into the fallback document.
    pub web_results: usize,
    /// Directory containing prompt template files.
    ///
    /// Missing files fall back to compiled-in defaults.
    pub prompt_dir: Option<PathBuf>,
    /// Path of the SQLite vector index.
    pub db_path: Option<PathBuf>,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }

    /// Key used for the groundedness checker.
    #[must_use]
    pub fn groundedness_key(&self) -> &str {
        self.groundedness_api_key.as_deref().unwrap_or(&self.api_key)
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    chat_model: Option<String>,
    embedding_model: Option<String>,
    embedding_dimension: Option<usize>,
    embed_batch_size: Option<usize>,
    embed_batch_delay: Option<Duration>,
    embed_item_delay: Option<Duration>,
    retrieval_top_k: Option<usize>,
    max_concurrency: Option<usize>,
    max_rewrites: Option<usize>,
    max_tool_iterations: Option<usize>,
    groundedness_api_key: Option<String>,
    groundedness_base_url: Option<String>,
    groundedness_model: Option<String>,
    tavily_api_key: Option<String>,
    classifier_url: Option<String>,
    web_results: Option<usize>,
    prompt_dir: Option<PathBuf>,
    db_path: Option<PathBuf>,
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("CROPWISE_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("CROPWISE_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("CROPWISE_BASE_URL"))
                .ok();
        }
        if self.chat_model.is_none() {
            self.chat_model = std::env::var("CROPWISE_CHAT_MODEL").ok();
        }
        if self.embedding_model.is_none() {
            self.embedding_model = std::env::var("CROPWISE_EMBEDDING_MODEL").ok();
        }
        if self.embedding_dimension.is_none() {
            self.embedding_dimension = env_parsed("CROPWISE_EMBEDDING_DIMENSION");
        }
        if self.embed_batch_size.is_none() {
            self.embed_batch_size = env_parsed("CROPWISE_EMBED_BATCH_SIZE");
        }
        if self.retrieval_top_k.is_none() {
            self.retrieval_top_k = env_parsed("CROPWISE_RETRIEVAL_TOP_K");
        }
        if self.max_concurrency.is_none() {
            self.max_concurrency = env_parsed("CROPWISE_MAX_CONCURRENCY");
        }
        if self.max_rewrites.is_none() {
            self.max_rewrites = env_parsed("CROPWISE_MAX_REWRITES");
        }
        if self.max_tool_iterations.is_none() {
            self.max_tool_iterations = env_parsed("CROPWISE_MAX_TOOL_ITERATIONS");
        }
        if self.groundedness_api_key.is_none() {
            self.groundedness_api_key = std::env::var("UPSTAGE_API_KEY").ok();
        }
        if self.groundedness_base_url.is_none() {
            self.groundedness_base_url = std::env::var("CROPWISE_GROUNDEDNESS_BASE_URL").ok();
        }
        if self.groundedness_model.is_none() {
            self.groundedness_model = std::env::var("CROPWISE_GROUNDEDNESS_MODEL").ok();
        }
        if self.tavily_api_key.is_none() {
            self.tavily_api_key = std::env::var("TAVILY_API_KEY").ok();
        }
        if self.classifier_url.is_none() {
            self.classifier_url = std::env::var("CROPWISE_CLASSIFIER_URL").ok();
        }
        if self.web_results.is_none() {
            self.web_results = env_parsed("CROPWISE_WEB_RESULTS");
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("CROPWISE_PROMPT_DIR").ok().map(PathBuf::from);
        }
        if self.db_path.is_none() {
            self.db_path = std::env::var("CROPWISE_DB_PATH").ok().map(PathBuf::from);
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the chat model.
    #[must_use]
    pub fn chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = Some(model.into());
        self
    }

    /// Sets the embedding model.
    #[must_use]
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    /// Sets the embedding dimension.
    #[must_use]
    pub const fn embedding_dimension(mut self, n: usize) -> Self {
        self.embedding_dimension = Some(n);
        self
    }

    /// Sets the number of texts per embedding request.
    #[must_use]
    pub const fn embed_batch_size(mut self, n: usize) -> Self {
        self.embed_batch_size = Some(n);
        self
    }

    /// Sets the pause between embedding batches.
    #[must_use]
    pub const fn embed_batch_delay(mut self, delay: Duration) -> Self {
        self.embed_batch_delay = Some(delay);
        self
    }

    /// Sets the pause between single-item embedding retries.
    #[must_use]
    pub const fn embed_item_delay(mut self, delay: Duration) -> Self {
        self.embed_item_delay = Some(delay);
        self
    }

    /// Sets the similarity-search results per sub-question.
    #[must_use]
    pub const fn retrieval_top_k(mut self, n: usize) -> Self {
        self.retrieval_top_k = Some(n);
        self
    }

    /// Sets the maximum concurrency.
    #[must_use]
    pub const fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = Some(n);
        self
    }

    /// Sets the rewrite budget.
    #[must_use]
    pub const fn max_rewrites(mut self, n: usize) -> Self {
        self.max_rewrites = Some(n);
        self
    }

    /// Sets the maximum tool-calling loop iterations.
    #[must_use]
    pub const fn max_tool_iterations(mut self, n: usize) -> Self {
        self.max_tool_iterations = Some(n);
        self
    }

    /// Sets the groundedness checker API key.
    #[must_use]
    pub fn groundedness_api_key(mut self, key: impl Into<String>) -> Self {
        self.groundedness_api_key = Some(key.into());
        self
    }

    /// Sets the groundedness checker base URL.
    #[must_use]
    pub fn groundedness_base_url(mut self, url: impl Into<String>) -> Self {
        self.groundedness_base_url = Some(url.into());
        self
    }

    /// Sets the groundedness checker model.
    #[must_use]
    pub fn groundedness_model(mut self, model: impl Into<String>) -> Self {
        self.groundedness_model = Some(model.into());
        self
    }

    /// Sets the Tavily API key.
    #[must_use]
    pub fn tavily_api_key(mut self, key: impl Into<String>) -> Self {
        self.tavily_api_key = Some(key.into());
        self
    }

    /// Sets the classification service base URL.
    #[must_use]
    pub fn classifier_url(mut self, url: impl Into<String>) -> Self {
        self.classifier_url = Some(url.into());
        self
    }

    /// Sets the number of web results joined into the fallback document.
    #[must_use]
    pub const fn web_results(mut self, n: usize) -> Self {
        self.web_results = Some(n);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Sets the vector index path.
    #[must_use]
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set, and
    /// [`AgentError::Config`] if a size parameter is zero.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let api_key = self.api_key.ok_or(AgentError::ApiKeyMissing)?;

        let config = AgentConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            chat_model: self
                .chat_model
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            embedding_model: self
                .embedding_model
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_dimension: self
                .embedding_dimension
                .unwrap_or(DEFAULT_EMBEDDING_DIMENSION),
            embed_batch_size: self.embed_batch_size.unwrap_or(DEFAULT_EMBED_BATCH_SIZE),
            embed_batch_delay: self.embed_batch_delay.unwrap_or(DEFAULT_EMBED_BATCH_DELAY),
            embed_item_delay: self.embed_item_delay.unwrap_or(DEFAULT_EMBED_ITEM_DELAY),
            retrieval_top_k: self.retrieval_top_k.unwrap_or(DEFAULT_RETRIEVAL_TOP_K),
            max_concurrency: self.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY),
            max_rewrites: self.max_rewrites.unwrap_or(DEFAULT_MAX_REWRITES),
            max_tool_iterations: self
                .max_tool_iterations
                .unwrap_or(DEFAULT_MAX_TOOL_ITERATIONS),
            groundedness_api_key: self.groundedness_api_key,
            groundedness_base_url: self
                .groundedness_base_url
                .unwrap_or_else(|| DEFAULT_GROUNDEDNESS_BASE_URL.to_string()),
            groundedness_model: self
                .groundedness_model
                .unwrap_or_else(|| DEFAULT_GROUNDEDNESS_MODEL.to_string()),
            tavily_api_key: self.tavily_api_key,
            classifier_url: self.classifier_url,
            web_results: self.web_results.unwrap_or(DEFAULT_WEB_RESULTS),
            prompt_dir: self.prompt_dir,
            db_path: self.db_path,
        };

        for (name, value) in [
            ("embedding_dimension", config.embedding_dimension),
            ("embed_batch_size", config.embed_batch_size),
            ("retrieval_top_k", config.retrieval_top_k),
            ("max_concurrency", config.max_concurrency),
            ("max_tool_iterations", config.max_tool_iterations),
        ] {
            if value == 0 {
                return Err(AgentError::Config {
                    message: format!("{name} must be greater than zero"),
                });
            }
        }

        Ok(config)
    }
}
