//! Prompt templates for the retrieval workflow and the farming agent.
//!
//! Templates use `{name}` placeholders filled by [`fill`]. Each template can
//! be overridden by a markdown file in the prompt directory.

use std::path::{Path, PathBuf};

/// Splits a question into retrieval sub-questions. Placeholders:
/// `{question}`, `{crop}`.
pub const DECOMPOSITION_PROMPT: &str = "You are an AI language model assistant. Your task is to break down the larger question
into smaller subquestions for vector store retrieval.
Write one subquestion per line and nothing else.
Original question: {question}
Crop: {crop}";

/// Answers from retrieved context. Placeholders: `{question}`, `{context}`.
pub const ANSWER_PROMPT: &str = "You are an assistant for question-answering tasks. Use the following pieces of retrieved context to answer the question. If you don't know the answer, just say that you don't know. Use three sentences maximum and keep the answer concise.
Question: {question}
Context: {context}
Answer:";

/// System prompt for the question re-writer.
pub const REWRITE_SYSTEM_PROMPT: &str = "You are a question re-writer that converts an input question to a better version that is optimized
for web search. Look at the input and try to reason about the underlying semantic intent / meaning.";

/// System prompt for the precision farming agent. Placeholders:
/// `{soil_ph}`, `{soil_moisture}`, `{latitude}`, `{longitude}`,
/// `{area_acres}`, `{crop}`, `{insect}`, `{leaf}`.
pub const ASSESSMENT_SYSTEM_PROMPT: &str = "You are an expert farming assistant. You will be given the following information
Soil PH: {soil_ph}
Soil Moisture: {soil_moisture}
Latitude: {latitude}
Longitude: {longitude}
Area (acres): {area_acres}
Crop: {crop}
Insect Name: {insect}
Leaf Disease Name: {leaf}

Based on this information, get additional data and analyze
1. Get the weather data for the location and find out how much rain is expected today and next few days
2. Get the expected soil PH, soil moisture for the crop
3. Calculate the amount of water the field will get over few days based on weather precipitation data
4. Identify the action needed to get the PH to the desired level/range
5. Identify the action needed to get the moisture to the desired level/range
6. Identify the required fertilizers needed for the crop. Find the moisture level and weather condition ideal for spraying fertilizers

Based on tool call results, provide a precision farming assessment in the format below. Do not use any information other than what was provided by the tools.
Watering plan:
    Tell the farmer the expected moisture percent
    Tell the farmer how much rain is expected today and coming days
    Based on that, tell the farmer how much water to give to the crops
PH Control Plan:
    Tell the farmer the ideal PH for the crop
    Tell the farmer what action to take to get the PH to the desired level
    Call out the weather conditions you have considered while recommending the PH control time
Fertilizer plan:
    Tell the farmer what fertilizer is best for the crop and the ideal weather conditions to apply it
    Recommend when to fertilize the field
    Call out the weather conditions you have considered while recommending the fertilizing time
Insect Control Plan (only when an insect is named):
    Get insights on how to remediate the insect infestation affecting the crop. Take into account the crop, the insect, weather and watering plan
    Tell the farmer what action to take to control the insect
    Explain your rationale and your timing, referencing the weather and moisture levels
Leaf Disease Control Plan (only when a disease is named):
    Get insights on how to remediate the disease affecting the crop. Take into account the crop, the disease, weather and watering plan
    Create a date by date action plan focused on remediation, not prevention
    Explain your rationale and your timing, referencing the weather and moisture levels";

/// Question sent to the retrieval workflow by the remediation tools.
/// Placeholders: `{crop}`, `{kind}`, `{problem}`, `{conditions}`.
pub const REMEDIATION_PROMPT: &str = "You are an agricultural pest management expert with specialized knowledge in entomology, plant pathology, and crop protection.

A farmer growing {crop} has found the {kind} \"{problem}\" in the field.
Field conditions: {conditions}

Provide:
1. Insights on the {kind}, how it affects the plant and its yield
2. What factors support it in the field
3. How to remediate it now that it is present, including which products to use and when to apply them given the weather, moisture and irrigation plan";

/// User message that starts a farming assessment.
pub const ASSESSMENT_QUESTION: &str = "Give me your precision farming assessment";

/// Default prompt directory under the user's home.
const DEFAULT_PROMPT_DIR: &str = ".config/cropwise/prompts";

/// Filename for the decomposition template.
const DECOMPOSITION_FILENAME: &str = "decomposition.md";
/// Filename for the answer template.
const ANSWER_FILENAME: &str = "answer.md";
/// Filename for the rewrite system prompt.
const REWRITE_FILENAME: &str = "rewrite.md";
/// Filename for the assessment system prompt.
const ASSESSMENT_FILENAME: &str = "assessment.md";
/// Filename for the remediation question template.
const REMEDIATION_FILENAME: &str = "remediation.md";

/// A set of prompt templates.
///
/// Loaded from external template files when available, falling back to
/// compiled-in defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    /// Sub-question decomposition template.
    pub decomposition: String,
    /// Grounded answer template.
    pub answer: String,
    /// Question re-writer system prompt.
    pub rewrite: String,
    /// Precision farming system prompt.
    pub assessment: String,
    /// Remediation question template.
    pub remediation: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::defaults()
    }
}

impl PromptSet {
    /// Loads prompts from the given directory, falling back to compiled-in defaults.
    ///
    /// Resolution order for `prompt_dir`:
    /// 1. Explicit `prompt_dir` argument
    /// 2. `CROPWISE_PROMPT_DIR` environment variable
    /// 3. `~/.config/cropwise/prompts/`
    ///
    /// Each file is loaded independently; a missing file uses its default.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir
            .map(PathBuf::from)
            .or_else(|| std::env::var("CROPWISE_PROMPT_DIR").ok().map(PathBuf::from))
            .or_else(Self::default_dir);

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(&path).ok())
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            decomposition: load_file(DECOMPOSITION_FILENAME, DECOMPOSITION_PROMPT),
            answer: load_file(ANSWER_FILENAME, ANSWER_PROMPT),
            rewrite: load_file(REWRITE_FILENAME, REWRITE_SYSTEM_PROMPT),
            assessment: load_file(ASSESSMENT_FILENAME, ASSESSMENT_SYSTEM_PROMPT),
            remediation: load_file(REMEDIATION_FILENAME, REMEDIATION_PROMPT),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            decomposition: DECOMPOSITION_PROMPT.to_string(),
            answer: ANSWER_PROMPT.to_string(),
            rewrite: REWRITE_SYSTEM_PROMPT.to_string(),
            assessment: ASSESSMENT_SYSTEM_PROMPT.to_string(),
            remediation: REMEDIATION_PROMPT.to_string(),
        }
    }

    /// Writes the compiled-in default prompts to the given directory.
    ///
    /// Creates the directory if it does not exist. Existing files are
    /// **not** overwritten.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if directory creation or file writing fails.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let templates = [
            (DECOMPOSITION_FILENAME, DECOMPOSITION_PROMPT),
            (ANSWER_FILENAME, ANSWER_PROMPT),
            (REWRITE_FILENAME, REWRITE_SYSTEM_PROMPT),
            (ASSESSMENT_FILENAME, ASSESSMENT_SYSTEM_PROMPT),
            (REMEDIATION_FILENAME, REMEDIATION_PROMPT),
        ];

        let mut written = Vec::new();
        for (filename, content) in &templates {
            let path = dir.join(filename);
            if !path.exists() {
                std::fs::write(&path, content)?;
                written.push(path);
            }
        }

        Ok(written)
    }

    /// Returns the default prompt directory under the user's home.
    ///
    /// Returns `None` if the home directory cannot be determined.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }

    /// Decomposition request for `question` about `crop`.
    #[must_use]
    pub fn build_decomposition(&self, question: &str, crop: &str) -> String {
        fill(&self.decomposition, &[("question", question), ("crop", crop)])
    }

    /// Answer request over `context`.
    #[must_use]
    pub fn build_answer(&self, question: &str, context: &str) -> String {
        fill(&self.answer, &[("question", question), ("context", context)])
    }
}

/// User message for the question re-writer.
#[must_use]
pub fn build_rewrite_prompt(question: &str) -> String {
    format!("Here is the initial question: \n\n {question} \n Formulate an improved question.")
}

/// Replaces each `{key}` in `template` with its value.
///
/// Placeholders without a value are left as-is. Values are inserted
/// verbatim and never re-scanned, so a value containing `{question}` is
/// not expanded again.
#[must_use]
pub fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let replaced = after.find('}').and_then(|end| {
            let key = &after[..end];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, end))
        });
        match replaced {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
