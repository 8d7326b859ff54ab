//! Precision farming assessment.
//!
//! Formats the assessment system prompt from a [`FarmScenario`] and lets
//! the tool-calling loop gather weather, crop data and remediation advice
//! before writing the final plan.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::agentic_loop::agentic_loop;
use super::classify::Observations;
use super::config::AgentConfig;
use super::executor::ToolRegistry;
use super::message::{ChatMessage, ChatRequest, Role, user_message};
use super::progress::ProgressSink;
use super::prompt::{ASSESSMENT_QUESTION, fill};
use super::provider::LlmProvider;
use crate::core::Crop;
use crate::error::AgentError;

/// One field's conditions, as reported by the farmer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmScenario {
    /// Measured soil pH.
    pub soil_ph: f64,
    /// Soil moisture, percent.
    pub soil_moisture: f64,
    /// Field latitude.
    pub latitude: f64,
    /// Field longitude.
    pub longitude: f64,
    /// Field area.
    pub area_acres: f64,
    /// Crop grown.
    pub crop: Crop,
    /// Insect found in the field, if any.
    pub insect: Option<String>,
    /// Leaf disease found in the field, if any.
    pub leaf: Option<String>,
}

impl Default for FarmScenario {
    fn default() -> Self {
        Self {
            soil_ph: 6.5,
            soil_moisture: 30.0,
            latitude: 35.41,
            longitude: -80.58,
            area_acres: 10.0,
            crop: Crop::Corn,
            insect: None,
            leaf: None,
        }
    }
}

impl FarmScenario {
    /// Fills in insect and leaf labels from classified photos, keeping any
    /// label already set.
    #[must_use]
    pub fn with_observations(mut self, observations: Observations) -> Self {
        self.insect = self.insect.or(observations.insect);
        self.leaf = self.leaf.or(observations.leaf);
        self
    }

    /// Renders the assessment system prompt for this scenario.
    #[must_use]
    pub fn render(&self, template: &str) -> String {
        let ph = self.soil_ph.to_string();
        let moisture = self.soil_moisture.to_string();
        let lat = self.latitude.to_string();
        let lon = self.longitude.to_string();
        let area = self.area_acres.to_string();
        fill(
            template,
            &[
                ("soil_ph", &ph),
                ("soil_moisture", &moisture),
                ("latitude", &lat),
                ("longitude", &lon),
                ("area_acres", &area),
                ("crop", self.crop.display_name()),
                ("insect", self.insect.as_deref().unwrap_or("None")),
                ("leaf", self.leaf.as_deref().unwrap_or("None")),
            ],
        )
    }
}

/// Result of one assessment.
#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    /// Final assessment text.
    pub content: String,
    /// Names of the tools called, in order.
    pub tools_used: Vec<String>,
    /// Full conversation, without the system prompt.
    pub conversation: Vec<ChatMessage>,
}

/// Runs precision farming assessments.
pub struct PrecisionFarming {
    provider: Arc<dyn LlmProvider>,
    registry: ToolRegistry,
    model: String,
    template: String,
    max_iterations: usize,
}

impl PrecisionFarming {
    /// Creates an assessor.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        registry: ToolRegistry,
        template: impl Into<String>,
        config: &AgentConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            model: config.chat_model.clone(),
            template: template.into(),
            max_iterations: config.max_tool_iterations,
        }
    }

    /// Produces an assessment for `scenario`.
    ///
    /// # Errors
    ///
    /// Propagates model and tool errors, and
    /// [`AgentError::ToolLoopExceeded`] if the model never stops calling
    /// tools.
    pub async fn assess(
        &self,
        scenario: &FarmScenario,
        progress: &dyn ProgressSink,
    ) -> Result<Assessment, AgentError> {
        let system = scenario.render(&self.template);
        let mut request = ChatRequest::new(self.model.clone(), vec![user_message(ASSESSMENT_QUESTION)]);

        let response = agentic_loop(
            self.provider.as_ref(),
            &self.registry,
            &mut request,
            Some(&system),
            progress,
            self.max_iterations,
        )
        .await?;

        let tools_used: Vec<String> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .filter_map(|m| m.name.clone())
            .collect();
        info!(
            crop = scenario.crop.as_str(),
            tool_calls = tools_used.len(),
            "assessment complete"
        );

        Ok(Assessment {
            content: response.content,
            tools_used,
            conversation: request.messages,
        })
    }
}

impl std::fmt::Debug for PrecisionFarming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrecisionFarming")
            .field("model", &self.model)
            .field("tools", &self.registry.len())
            .field("max_iterations", &self.max_iterations)
            .finish_non_exhaustive()
    }
}
