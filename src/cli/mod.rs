//! CLI layer for cropwise.
//!
//! Provides the command-line interface using clap, with commands for
//! asking questions, running assessments and managing the vector index.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{AnalyzeArgs, Cli, Commands, IndexCommands};
