//! Pest and disease remediation backed by the retrieval workflow.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::agent::prompt::fill;
use crate::agent::tool::{Tool, ToolDefinition, optional_str, required_str};
use crate::core::Crop;
use crate::error::AgentError;
use crate::rag::RagWorkflow;

/// Answers a crop question from the knowledge base.
#[async_trait]
pub trait Advisor: Send + Sync {
    /// Answers `question` about `crop`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if no answer can be produced.
    async fn advise(&self, question: &str, crop: &str) -> Result<String, AgentError>;
}

#[async_trait]
impl Advisor for RagWorkflow {
    async fn advise(&self, question: &str, crop: &str) -> Result<String, AgentError> {
        self.invoke(question, crop).await
    }
}

/// What a remediation tool is asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Problem {
    /// Insect infestation.
    Insect,
    /// Leaf disease.
    Disease,
}

impl Problem {
    const fn tool_name(self) -> &'static str {
        match self {
            Self::Insect => "tackle_insect",
            Self::Disease => "tackle_disease",
        }
    }

    const fn argument(self) -> &'static str {
        match self {
            Self::Insect => "insect",
            Self::Disease => "disease",
        }
    }

    const fn kind(self) -> &'static str {
        match self {
            Self::Insect => "insect",
            Self::Disease => "leaf disease",
        }
    }
}

/// `tackle_insect` / `tackle_disease` tool.
pub struct Remediation {
    problem: Problem,
    advisor: Arc<dyn Advisor>,
    template: String,
}

impl Remediation {
    /// Creates a remediation tool that fills `template` and asks `advisor`.
    #[must_use]
    pub fn new(problem: Problem, advisor: Arc<dyn Advisor>, template: impl Into<String>) -> Self {
        Self {
            problem,
            advisor,
            template: template.into(),
        }
    }
}

impl std::fmt::Debug for Remediation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Remediation")
            .field("problem", &self.problem)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for Remediation {
    fn definition(&self) -> ToolDefinition {
        let arg = self.problem.argument();
        ToolDefinition {
            name: self.problem.tool_name().to_string(),
            description: format!(
                "Get insights on how to remediate a {} affecting a crop, taking field conditions into account.",
                self.problem.kind()
            ),
            parameters: json!({
                "type": "object",
                "properties": {
                    "crop": { "type": "string", "enum": ["Corn", "Cotton", "Soybean"] },
                    arg: { "type": "string", "description": format!("Name of the {}", self.problem.kind()) },
                    "conditions": {
                        "type": "string",
                        "description": "Weather, moisture and irrigation context"
                    }
                },
                "required": ["crop", arg]
            }),
        }
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<Value, AgentError> {
        let name = self.problem.tool_name();
        let crop: Crop = required_str(name, arguments, "crop")?
            .parse()
            .map_err(|e: AgentError| AgentError::ToolExecution {
                name: name.to_string(),
                message: e.to_string(),
            })?;
        let problem = required_str(name, arguments, self.problem.argument())?;
        let conditions = optional_str(arguments, "conditions").unwrap_or("not provided");

        let question = fill(
            &self.template,
            &[
                ("crop", crop.display_name()),
                ("kind", self.problem.kind()),
                ("problem", problem),
                ("conditions", conditions),
            ],
        );
        debug!(tool = name, problem, crop = crop.as_str(), "asking knowledge base");
        let answer = self.advisor.advise(&question, crop.as_str()).await?;
        Ok(Value::String(answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::prompt::REMEDIATION_PROMPT;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        asked: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Advisor for Recorder {
        async fn advise(&self, question: &str, crop: &str) -> Result<String, AgentError> {
            if let Ok(mut asked) = self.asked.lock() {
                asked.push((question.to_string(), crop.to_string()));
            }
            Ok("Scout at dusk and spray spinosad.".to_string())
        }
    }

    #[tokio::test]
    async fn test_tackle_insect_asks_advisor() {
        let recorder = Arc::new(Recorder::default());
        let tool = Remediation::new(Problem::Insect, recorder.clone(), REMEDIATION_PROMPT);
        let mut args = Map::new();
        args.insert("crop".to_string(), json!("Corn"));
        args.insert("insect".to_string(), json!("fall armyworm"));
        args.insert("conditions".to_string(), json!("12 mm rain tomorrow"));

        let out = tool.invoke(&args).await.unwrap_or_default();
        assert_eq!(out, json!("Scout at dusk and spray spinosad."));

        let asked = recorder.asked.lock().map(|a| a.clone()).unwrap_or_default();
        assert_eq!(asked.len(), 1);
        assert!(asked[0].0.contains("growing Corn"));
        assert!(asked[0].0.contains("\"fall armyworm\""));
        assert!(asked[0].0.contains("12 mm rain tomorrow"));
        assert_eq!(asked[0].1, "corn");
    }

    #[tokio::test]
    async fn test_tackle_disease_schema_and_validation() {
        let tool = Remediation::new(
            Problem::Disease,
            Arc::new(Recorder::default()),
            REMEDIATION_PROMPT,
        );
        let def = tool.definition();
        assert_eq!(def.name, "tackle_disease");
        assert_eq!(def.parameters["required"], json!(["crop", "disease"]));

        let mut args = Map::new();
        args.insert("crop".to_string(), json!("Cotton"));
        assert!(matches!(
            tool.invoke(&args).await,
            Err(AgentError::ToolExecution { .. })
        ));
    }
}
