//! # cropwise
//!
//! Crop advisory engine: a self-correcting retrieval workflow over crop
//! guides and a tool-calling agent that turns field conditions into a
//! precision farming plan.
//!
//! ## Overview
//!
//! - [`rag::RagWorkflow`] answers a crop question. It decomposes the
//!   question, searches the vector index for every sub-question
//!   concurrently, falls back to web search when nothing is found, and
//!   rewrites the question until the answer is judged grounded.
//! - [`agent::PrecisionFarming`] runs the tool-calling loop over the
//!   farming tools in [`tools`] and reports progress per tool call.
//! - [`rag::SqliteVectorIndex`] stores documents and their embeddings;
//!   [`rag::BatchedEmbedder`] paces embedding calls and never fails.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cropwise::agent::{AgentConfig, PromptSet, create_embedder, create_provider};
//! use cropwise::rag::{
//!     BatchSettings, BatchedEmbedder, BatchedRetriever, DisabledWebSearch, GroundednessGate,
//!     LlmGroundednessVerifier, RagWorkflow, RetrieverSettings, SqliteVectorIndex,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AgentConfig::from_env()?;
//! let provider = create_provider(&config)?;
//! let embedder = Arc::new(BatchedEmbedder::new(
//!     create_embedder(&config)?,
//!     BatchSettings::from(&config),
//! ));
//! let index = Arc::new(SqliteVectorIndex::open("guides.db", embedder)?);
//! let prompts = PromptSet::load(None);
//! let retriever = BatchedRetriever::new(
//!     Arc::clone(&provider),
//!     index,
//!     &prompts,
//!     RetrieverSettings::default(),
//! );
//! let gate = GroundednessGate::new(Arc::new(LlmGroundednessVerifier::from_config(&config)));
//! let workflow = RagWorkflow::new(
//!     provider,
//!     retriever,
//!     gate,
//!     Arc::new(DisabledWebSearch),
//!     prompts,
//!     config.chat_model.clone(),
//! );
//! let answer = workflow.invoke("When should I side-dress nitrogen?", "corn").await?;
//! # let _ = answer;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod error;
pub mod rag;
pub mod tools;

pub use crate::core::{Crop, Document, Groundedness};
pub use error::{AgentError, CommandError, Error, Result, StorageError};
