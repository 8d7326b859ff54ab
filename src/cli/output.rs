//! Output formatting for CLI commands.

use std::fmt::Write;

use serde::Serialize;

use crate::agent::Assessment;
use crate::rag::{IndexStatus, WorkflowOutcome};

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name; anything unrecognized is text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes `value` as pretty JSON.
    #[must_use]
    pub fn to_json<T: Serialize + ?Sized>(self, value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

/// Formats a workflow answer.
#[must_use]
pub fn format_outcome(outcome: &WorkflowOutcome, format: OutputFormat, verbose: bool) -> String {
    match format {
        OutputFormat::Json => format.to_json(outcome),
        OutputFormat::Text => {
            let mut out = outcome.answer.trim().to_string();
            let _ = write!(
                out,
                "\n\n---\nGroundedness: {} | Rewrites: {} | Documents: {}{}",
                outcome.groundedness,
                outcome.rewrites,
                outcome.documents.len(),
                if outcome.web_search { " | Web search: yes" } else { "" },
            );
            if verbose {
                let path: Vec<&str> = outcome.visits.iter().map(|n| n.as_str()).collect();
                let _ = write!(out, "\nPath: {}", path.join(" → "));
                let _ = write!(out, "\nFinal question: {}", outcome.question);
            }
            out
        }
    }
}

/// Formats a farming assessment.
#[must_use]
pub fn format_assessment(assessment: &Assessment, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format.to_json(assessment),
        OutputFormat::Text => {
            let mut out = assessment.content.trim().to_string();
            if !assessment.tools_used.is_empty() {
                let _ = write!(out, "\n\n---\nTools: {}", assessment.tools_used.join(", "));
            }
            out
        }
    }
}

/// Formats index document counts.
#[must_use]
pub fn format_status(status: &IndexStatus, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format.to_json(status),
        OutputFormat::Text => {
            if status.documents == 0 {
                return "Index is empty. Add guides with `cropwise index add`.\n".to_string();
            }
            let mut out = format!("Documents: {}\n", status.documents);
            for count in &status.by_crop {
                let _ = writeln!(
                    out,
                    "  {:<10} {}",
                    count.crop.as_deref().unwrap_or("(none)"),
                    count.documents
                );
            }
            out
        }
    }
}
