//! Supported crops.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// A crop the advisory tools have reference data for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Crop {
    /// Corn (maize).
    Corn,
    /// Cotton.
    Cotton,
    /// Soybean.
    Soybean,
}

impl Crop {
    /// All supported crops.
    pub const ALL: [Self; 3] = [Self::Corn, Self::Cotton, Self::Soybean];

    /// Lowercase tag used in document metadata.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Corn => "corn",
            Self::Cotton => "cotton",
            Self::Soybean => "soybean",
        }
    }

    /// Capitalized name for prompts and reports.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Corn => "Corn",
            Self::Cotton => "Cotton",
            Self::Soybean => "Soybean",
        }
    }
}

impl FromStr for Crop {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "corn" | "maize" => Ok(Self::Corn),
            "cotton" => Ok(Self::Cotton),
            "soybean" | "soybeans" | "soy" => Ok(Self::Soybean),
            other => Err(AgentError::Config {
                message: format!("unsupported crop '{other}' (expected corn, cotton or soybean)"),
            }),
        }
    }
}

impl std::fmt::Display for Crop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}
