//! CLI command implementations.
//!
//! Each command assembles its collaborators from [`AgentConfig`] and runs
//! on a tokio runtime created for the call.

#![allow(clippy::format_push_string)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::agent::{
    AgentConfig, Classifiers, FarmScenario, PrecisionFarming, PromptSet, TracingProgress,
    create_embedder, create_provider, resolve_observations,
};
use crate::cli::output::{OutputFormat, format_assessment, format_outcome, format_status};
use crate::cli::parser::{AnalyzeArgs, Cli, Commands, IndexCommands};
use crate::core::Crop;
use crate::error::{CommandError, Error, Result};
use crate::rag::{
    BatchSettings, BatchedEmbedder, BatchedRetriever, DisabledWebSearch, GroundednessGate,
    LlmGroundednessVerifier, RagWorkflow, RetrieverSettings, RewritePolicy, SqliteVectorIndex,
    TavilySearch, VectorIndex, WebSearch, documents_from_text, read_status,
};
use crate::tools::{GetWeatherData, farming_registry};

/// Parameters for the `ask` command.
#[derive(Debug, Clone)]
pub struct AskParams<'a> {
    /// The question.
    pub question: &'a str,
    /// Crop name as typed.
    pub crop: &'a str,
    /// Rewrite budget override.
    pub max_rewrites: Option<usize>,
    /// Fail when the budget runs out.
    pub strict: bool,
    /// No rewrite budget.
    pub unbounded: bool,
    /// Prompt template directory.
    pub prompt_dir: Option<&'a Path>,
}

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let db_path = cli.get_db_path();

    match &cli.command {
        Commands::Ask {
            question,
            crop,
            max_rewrites,
            strict,
            unbounded,
            prompt_dir,
        } => {
            let params = AskParams {
                question,
                crop,
                max_rewrites: *max_rewrites,
                strict: *strict,
                unbounded: *unbounded,
                prompt_dir: prompt_dir.as_deref(),
            };
            cmd_ask(&db_path, &params, format, cli.verbose)
        }
        Commands::Analyze(args) => cmd_analyze(&db_path, args, format),
        Commands::Index(sub) => execute_index(sub, &db_path, format),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
    }
}

fn execute_index(sub: &IndexCommands, db_path: &Path, format: OutputFormat) -> Result<String> {
    match sub {
        IndexCommands::Add {
            files,
            crop,
            chunk_size,
        } => cmd_index_add(db_path, files, crop, *chunk_size, format),
        IndexCommands::Status => {
            let status = read_status(db_path)?;
            Ok(format_status(&status, format))
        }
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}")).into()
    })
}

fn parse_crop(crop: &str) -> Result<Crop> {
    crop.parse::<Crop>()
        .map_err(|e| CommandError::InvalidArgument(e.to_string()).into())
}

/// Maps the `ask` flags onto a rewrite policy.
fn rewrite_policy(max_rewrites: usize, strict: bool, unbounded: bool) -> RewritePolicy {
    if unbounded {
        RewritePolicy::Unbounded
    } else if strict {
        RewritePolicy::Strict { max_rewrites }
    } else {
        RewritePolicy::BestEffort { max_rewrites }
    }
}

fn load_config(prompt_dir: Option<&Path>, max_rewrites: Option<usize>) -> Result<AgentConfig> {
    let mut builder = AgentConfig::builder();
    if let Some(dir) = prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    if let Some(n) = max_rewrites {
        builder = builder.max_rewrites(n);
    }
    Ok(builder.from_env().build()?)
}

fn open_index(db_path: &Path, config: &AgentConfig) -> Result<Arc<SqliteVectorIndex>> {
    let embedder = BatchedEmbedder::new(create_embedder(config)?, BatchSettings::from(config));
    Ok(Arc::new(SqliteVectorIndex::open(db_path, Arc::new(embedder))?))
}

fn build_workflow(db_path: &Path, config: &AgentConfig, prompts: &PromptSet) -> Result<RagWorkflow> {
    let provider = create_provider(config)?;
    let index: Arc<dyn VectorIndex> = open_index(db_path, config)?;
    let retriever = BatchedRetriever::new(
        Arc::clone(&provider),
        index,
        prompts,
        RetrieverSettings {
            model: config.chat_model.clone(),
            top_k: config.retrieval_top_k,
            max_concurrency: config.max_concurrency,
        },
    );
    let gate = GroundednessGate::new(Arc::new(LlmGroundednessVerifier::from_config(config)));
    let web: Arc<dyn WebSearch> = match &config.tavily_api_key {
        Some(key) => Arc::new(TavilySearch::new(key.clone(), config.web_results)),
        None => Arc::new(DisabledWebSearch),
    };
    Ok(RagWorkflow::new(
        provider,
        retriever,
        gate,
        web,
        prompts.clone(),
        config.chat_model.clone(),
    )
    .with_policy(RewritePolicy::BestEffort {
        max_rewrites: config.max_rewrites,
    }))
}

fn cmd_ask(db_path: &Path, params: &AskParams<'_>, format: OutputFormat, verbose: bool) -> Result<String> {
    let crop = parse_crop(params.crop)?;
    let config = load_config(params.prompt_dir, params.max_rewrites)?;
    let prompts = PromptSet::load(config.prompt_dir.as_deref());
    let policy = rewrite_policy(config.max_rewrites, params.strict, params.unbounded);
    let workflow = build_workflow(db_path, &config, &prompts)?.with_policy(policy);

    let rt = runtime()?;
    let outcome = rt.block_on(workflow.run(params.question, crop.as_str()))?;
    Ok(format_outcome(&outcome, format, verbose))
}

/// Reads an optional field photo.
fn read_photo(path: Option<&Path>) -> Result<Option<Vec<u8>>> {
    path.map(|p| {
        std::fs::read(p).map_err(|e| {
            Error::from(CommandError::InvalidArgument(format!(
                "cannot read photo {}: {e}",
                p.display()
            )))
        })
    })
    .transpose()
}

fn cmd_analyze(db_path: &Path, args: &AnalyzeArgs, format: OutputFormat) -> Result<String> {
    let crop = parse_crop(&args.crop)?;
    let insect_photo = read_photo(args.insect_image.as_deref())?;
    let leaf_photo = read_photo(args.leaf_image.as_deref())?;
    let config = load_config(args.prompt_dir.as_deref(), None)?;
    let prompts = PromptSet::load(config.prompt_dir.as_deref());

    let workflow = Arc::new(build_workflow(db_path, &config, &prompts)?);
    let registry = farming_registry(workflow, &prompts.remediation, GetWeatherData::new());
    let farming = PrecisionFarming::new(
        create_provider(&config)?,
        registry,
        prompts.assessment.clone(),
        &config,
    );

    let scenario = FarmScenario {
        soil_ph: args.soil_ph,
        soil_moisture: args.soil_moisture,
        latitude: args.latitude,
        longitude: args.longitude,
        area_acres: args.area_acres,
        crop,
        insect: args.insect.clone(),
        leaf: args.leaf.clone(),
    };

    let classifiers = config
        .classifier_url
        .as_deref()
        .map_or_else(Classifiers::disabled, Classifiers::http);

    let rt = runtime()?;
    let observations = rt.block_on(resolve_observations(
        crop,
        insect_photo.as_deref(),
        leaf_photo.as_deref(),
        &classifiers,
    ))?;
    let scenario = scenario.with_observations(observations);
    let assessment = rt.block_on(farming.assess(&scenario, &TracingProgress))?;
    Ok(format_assessment(&assessment, format))
}

fn cmd_index_add(
    db_path: &Path,
    files: &[PathBuf],
    crop: &str,
    chunk_size: usize,
    format: OutputFormat,
) -> Result<String> {
    if chunk_size == 0 {
        return Err(CommandError::InvalidArgument("--chunk-size must be positive".to_string()).into());
    }
    let crop = parse_crop(crop)?;

    let mut documents = Vec::new();
    let mut per_file = Vec::with_capacity(files.len());
    for file in files {
        let text = std::fs::read_to_string(file).map_err(|e| {
            CommandError::ExecutionFailed(format!("Failed to read {}: {e}", file.display()))
        })?;
        let source = file.to_string_lossy();
        let docs = documents_from_text(&text, crop.as_str(), &source, chunk_size);
        per_file.push((file.display().to_string(), docs.len()));
        documents.extend(docs);
    }

    let config = load_config(None, None)?;
    let index = open_index(db_path, &config)?;
    let rt = runtime()?;
    let added = rt.block_on(index.add_documents(&documents))?;
    info!(added, crop = crop.as_str(), "indexed documents");

    match format {
        OutputFormat::Text => {
            let mut output = format!(
                "Indexed {added} chunk(s) for {crop} into {}\n",
                db_path.display()
            );
            for (file, chunks) in &per_file {
                output.push_str(&format!("  {file}: {chunks}\n"));
            }
            Ok(output)
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "database": db_path.to_string_lossy(),
                "crop": crop.as_str(),
                "added": added,
                "files": per_file
                    .iter()
                    .map(|(file, chunks)| serde_json::json!({"file": file, "chunks": chunks}))
                    .collect::<Vec<_>>(),
            });
            Ok(format.to_json(&json))
        }
    }
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                return Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ));
            }
            let mut output = format!(
                "Wrote {} prompt template(s) to: {}\n",
                written.len(),
                target_dir.display()
            );
            for path in &written {
                output.push_str(&format!(
                    "  {}\n",
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("unknown")
                ));
            }
            output.push_str("\nEdit these files to customize the prompts.\n");
            Ok(output)
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
                "count": written.len()
            });
            Ok(format.to_json(&json))
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_policy_flags() {
        assert_eq!(
            rewrite_policy(3, false, false),
            RewritePolicy::BestEffort { max_rewrites: 3 }
        );
        assert_eq!(
            rewrite_policy(1, true, false),
            RewritePolicy::Strict { max_rewrites: 1 }
        );
        assert_eq!(rewrite_policy(3, false, true), RewritePolicy::Unbounded);
    }

    #[test]
    fn test_parse_crop_rejects_unknown() {
        assert!(parse_crop("Cotton").is_ok());
        assert!(matches!(
            parse_crop("barley"),
            Err(crate::error::Error::Command(CommandError::InvalidArgument(_)))
        ));
    }

    #[test]
    fn test_init_prompts_writes_then_skips() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let first = cmd_init_prompts(Some(dir.path()), OutputFormat::Text)
            .unwrap_or_else(|e| panic!("init: {e}"));
        assert!(first.contains("Wrote 5 prompt template(s)"));
        assert!(first.contains("decomposition.md"));

        let second = cmd_init_prompts(Some(dir.path()), OutputFormat::Json)
            .unwrap_or_else(|e| panic!("init: {e}"));
        let value: serde_json::Value = serde_json::from_str(&second).unwrap_or_default();
        assert_eq!(value["count"], 0);
    }

    #[test]
    fn test_index_status_on_fresh_path() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let out = execute_index(
            &IndexCommands::Status,
            &dir.path().join("index.db"),
            OutputFormat::Text,
        )
        .unwrap_or_else(|e| panic!("status: {e}"));
        assert!(out.contains("empty"));
    }

    #[test]
    fn test_index_add_rejects_zero_chunk_size() {
        let result = cmd_index_add(
            Path::new("unused.db"),
            &[PathBuf::from("guide.txt")],
            "corn",
            0,
            OutputFormat::Text,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_read_photo() {
        assert!(matches!(read_photo(None), Ok(None)));

        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let path = dir.path().join("leaf.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF]).unwrap_or_else(|e| panic!("write: {e}"));
        let photo = read_photo(Some(&path)).unwrap_or_else(|e| panic!("read: {e}"));
        assert_eq!(photo, Some(vec![0xFF, 0xD8, 0xFF]));

        let missing = read_photo(Some(&dir.path().join("missing.jpg")));
        assert!(matches!(
            missing,
            Err(Error::Command(CommandError::InvalidArgument(_)))
        ));
    }
}
