//! LLM plumbing and the precision farming agent.
//!
//! Provides a provider abstraction backed by OpenAI-compatible APIs, the
//! tool-calling loop, and the assessment built on top of it.
//!
//! # Architecture
//!
//! ```text
//! FarmScenario → PrecisionFarming
//!   └── agentic_loop
//!       ├── llm: LlmProvider::chat with the registry's tool schema
//!       ├── action: ToolRegistry::invoke per call, progress reported
//!       └── end: final assistant message
//! ```

pub mod agentic_loop;
pub mod classify;
pub mod client;
pub mod config;
pub mod executor;
pub mod farming;
pub mod message;
pub mod progress;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod tool;

pub use agentic_loop::{AgentNode, agentic_loop};
pub use classify::{
    Classifiers, DisabledClassifier, HttpImageClassifier, ImageClassifier, Observations,
    resolve_observations,
};
pub use client::{create_embedder, create_provider};
pub use config::AgentConfig;
pub use executor::ToolRegistry;
pub use farming::{Assessment, FarmScenario, PrecisionFarming};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use progress::{NoProgress, ProgressSink, TracingProgress};
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use tool::{Tool, ToolCall, ToolDefinition, ToolResult};
