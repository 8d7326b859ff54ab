//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::rag::vector::DEFAULT_DB_PATH;

/// Default chunk size for `index add`, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// cropwise: crop advisory from your own crop guides.
///
/// Answers crop questions with a self-correcting retrieval workflow and
/// produces precision farming assessments with a tool-calling agent.
#[derive(Parser, Debug)]
#[command(name = "cropwise")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the vector index database.
    ///
    /// Defaults to `.cropwise/index.db` in the current directory.
    #[arg(short, long, env = "CROPWISE_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a crop question from the indexed guides.
    ///
    /// Falls back to web search when nothing relevant is indexed and
    /// rewrites the question until the answer is grounded.
    #[command(after_help = r#"Examples:
  cropwise ask "When should I side-dress nitrogen?" --crop corn
  cropwise ask "How do I control thrips?" --crop cotton --strict
  cropwise --format json ask "Ideal pH?" --crop soybean | jq .answer
"#)]
    Ask {
        /// The question.
        question: String,

        /// Crop the question is about (corn, cotton, soybean).
        #[arg(short, long)]
        crop: String,

        /// Question rewrites allowed before giving up.
        #[arg(long)]
        max_rewrites: Option<usize>,

        /// Fail instead of returning an ungrounded answer.
        #[arg(long, conflicts_with = "unbounded")]
        strict: bool,

        /// Keep rewriting until the answer is grounded.
        #[arg(long)]
        unbounded: bool,

        /// Directory containing prompt template files.
        #[arg(long, env = "CROPWISE_PROMPT_DIR")]
        prompt_dir: Option<PathBuf>,
    },

    /// Produce a precision farming assessment for a field.
    #[command(after_help = r#"Examples:
  cropwise analyze
  cropwise analyze --crop cotton --soil-ph 5.4 --soil-moisture 18 --area-acres 40
  cropwise analyze --latitude 41.6 --longitude -93.6 --insect "corn earworm"
  cropwise analyze --crop soybean --leaf-image leaf.jpg --insect-image bug.png
"#)]
    Analyze(AnalyzeArgs),

    /// Vector index operations (add, status).
    #[command(subcommand)]
    Index(IndexCommands),

    /// Write the default prompt templates to a directory.
    ///
    /// Existing files are never overwritten.
    InitPrompts {
        /// Target directory (default: ~/.config/cropwise/prompts).
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

/// Field conditions for `analyze`.
#[derive(clap::Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Measured soil pH.
    #[arg(long, default_value_t = 6.5)]
    pub soil_ph: f64,

    /// Soil moisture, percent.
    #[arg(long, default_value_t = 30.0)]
    pub soil_moisture: f64,

    /// Field latitude.
    #[arg(long, default_value_t = 35.41, allow_negative_numbers = true)]
    pub latitude: f64,

    /// Field longitude.
    #[arg(long, default_value_t = -80.58, allow_negative_numbers = true)]
    pub longitude: f64,

    /// Field area in acres.
    #[arg(long, default_value_t = 10.0)]
    pub area_acres: f64,

    /// Crop grown (corn, cotton, soybean).
    #[arg(short, long, default_value = "corn")]
    pub crop: String,

    /// Insect found in the field.
    #[arg(long, conflicts_with = "insect_image")]
    pub insect: Option<String>,

    /// Leaf disease found in the field.
    #[arg(long, conflicts_with = "leaf_image")]
    pub leaf: Option<String>,

    /// Photo of the insect, named by the classification service.
    #[arg(long)]
    pub insect_image: Option<PathBuf>,

    /// Photo of a diseased leaf, named by the crop's classifier.
    #[arg(long)]
    pub leaf_image: Option<PathBuf>,

    /// Directory containing prompt template files.
    #[arg(long, env = "CROPWISE_PROMPT_DIR")]
    pub prompt_dir: Option<PathBuf>,
}

/// Vector index subcommands.
#[derive(Subcommand, Debug)]
pub enum IndexCommands {
    /// Chunk, embed and index text files.
    #[command(after_help = r#"Examples:
  cropwise index add guides/corn/*.txt --crop corn
  cropwise index add cotton-handbook.md --crop cotton --chunk-size 800
"#)]
    Add {
        /// Files to index.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Crop the files describe.
        #[arg(short, long)]
        crop: String,

        /// Chunk size in characters.
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },

    /// Show document counts per crop.
    Status,
}

impl Cli {
    /// Returns the database path, using the default if not specified.
    #[must_use]
    pub fn get_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
    }
}
