//! Error types for cropwise.
//!
//! Each layer owns an error enum: [`AgentError`] for the model, retrieval
//! and tool orchestration, [`StorageError`] for the SQLite vector index,
//! and [`CommandError`] for the CLI. [`Error`] unifies them at the crate
//! boundary.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Agent, retrieval, or tool failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Vector index storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// CLI command failure.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the orchestration core.
///
/// Degradable failures (individual embeddings, a single sub-question
/// search) never surface as this type; they are absorbed where they occur.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key was configured for the chat provider.
    #[error("API key missing: set OPENAI_API_KEY or CROPWISE_API_KEY")]
    ApiKeyMissing,

    /// The configured provider name has no implementation.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Provider name as configured.
        name: String,
    },

    /// The provider API call failed.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Error detail from the transport or SDK.
        message: String,
        /// HTTP status, when known.
        status: Option<u16>,
    },

    /// A model or service response could not be interpreted.
    #[error("failed to parse response: {message}")]
    ResponseParse {
        /// What went wrong.
        message: String,
        /// Raw content that failed to parse.
        content: String,
    },

    /// The model requested a tool that is not registered.
    #[error("unknown tool: {name}")]
    UnknownTool {
        /// Requested tool name.
        name: String,
    },

    /// A tool invocation failed.
    #[error("tool '{name}' failed: {message}")]
    ToolExecution {
        /// Tool name.
        name: String,
        /// Failure detail.
        message: String,
    },

    /// The tool-calling loop did not reach a final answer in time.
    #[error("tool loop exceeded {max_iterations} model calls without a final answer")]
    ToolLoopExceeded {
        /// Configured iteration limit.
        max_iterations: usize,
    },

    /// The groundedness verifier failed.
    #[error("groundedness verifier failed: {message}")]
    Verifier {
        /// Failure detail.
        message: String,
    },

    /// The verifier returned a label outside the closed set.
    #[error("invalid groundedness label: {label:?}")]
    InvalidGroundedness {
        /// Label as returned.
        label: String,
    },

    /// The workflow exhausted its rewrite budget under a strict policy.
    #[error("answer not grounded after {attempts} generation attempts")]
    NotGrounded {
        /// Number of `generate` visits.
        attempts: usize,
        /// Last answer produced.
        last_answer: String,
    },

    /// Web search failed.
    #[error("web search failed: {message}")]
    WebSearch {
        /// Failure detail.
        message: String,
    },

    /// An image classifier failed or is not configured.
    #[error("image classification failed: {message}")]
    Classifier {
        /// Failure detail.
        message: String,
    },

    /// An embedding call failed.
    #[error("embedding failed: {message}")]
    Embedding {
        /// Failure detail.
        message: String,
    },

    /// The vector index failed.
    #[error("vector index error: {message}")]
    VectorIndex {
        /// Failure detail.
        message: String,
    },

    /// Invalid configuration.
    #[error("configuration error: {message}")]
    Config {
        /// Failure detail.
        message: String,
    },
}

/// Errors from the SQLite-backed vector index.
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Metadata (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored embedding blob is malformed.
    #[error("corrupt embedding for document {id}: {len} bytes")]
    CorruptEmbedding {
        /// Row id.
        id: i64,
        /// Blob length in bytes.
        len: usize,
    },

    /// The connection mutex was poisoned by a panicking holder.
    #[error("storage lock poisoned")]
    LockPoisoned,

    /// A blocking database task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Task(String),

    /// The database directory could not be created.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for AgentError {
    fn from(e: StorageError) -> Self {
        Self::VectorIndex {
            message: e.to_string(),
        }
    }
}

/// Errors from CLI command execution.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command could not complete.
    #[error("{0}")]
    ExecutionFailed(String),

    /// A CLI argument was invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Output formatting failed.
    #[error("output formatting failed: {0}")]
    OutputFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_error_display() {
        let err = AgentError::UnknownTool {
            name: "get_moon_phase".to_string(),
        };
        assert_eq!(err.to_string(), "unknown tool: get_moon_phase");

        let err = AgentError::InvalidGroundedness {
            label: "maybe".to_string(),
        };
        assert!(err.to_string().contains("\"maybe\""));
    }

    #[test]
    fn test_storage_error_converts_to_agent_error() {
        let err: AgentError = StorageError::LockPoisoned.into();
        assert!(matches!(err, AgentError::VectorIndex { .. }));
    }

    #[test]
    fn test_error_from_agent_error() {
        let err: Error = AgentError::ApiKeyMissing.into();
        assert!(matches!(err, Error::Agent(AgentError::ApiKeyMissing)));
    }
}
