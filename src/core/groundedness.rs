//! Groundedness labels produced by the verifier.
//!
//! The label set is closed: anything outside `grounded`, `notGrounded`
//! and `notSure` is rejected at parse time rather than coerced, so a
//! misbehaving verifier can never be read as an approval.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// Verdict on whether an answer is supported by its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Groundedness {
    /// The answer is supported by the context.
    Grounded,
    /// The answer contradicts or is absent from the context.
    NotGrounded,
    /// The verifier could not decide.
    NotSure,
}

impl Groundedness {
    /// Returns `true` only for [`Groundedness::Grounded`].
    #[must_use]
    pub const fn is_grounded(self) -> bool {
        matches!(self, Self::Grounded)
    }

    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Grounded => "grounded",
            Self::NotGrounded => "notGrounded",
            Self::NotSure => "notSure",
        }
    }
}

impl FromStr for Groundedness {
    type Err = AgentError;

    /// Parses a verifier label, tolerating surrounding whitespace, quotes
    /// and case differences but nothing else.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_matches(|c| c == '"' || c == '\'' || c == '.');
        match normalized.to_ascii_lowercase().as_str() {
            "grounded" => Ok(Self::Grounded),
            "notgrounded" | "not_grounded" => Ok(Self::NotGrounded),
            "notsure" | "not_sure" => Ok(Self::NotSure),
            _ => Err(AgentError::InvalidGroundedness {
                label: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Groundedness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
