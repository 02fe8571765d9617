//! Thin CLI entry point exercising the scanner end to end (spec §6's
//! documented CLI surface): load a provider config, run the three-stage
//! pipeline against the target it describes, print the resulting
//! `AgentSecurityReport` as JSON.
//!
//! Mirrors the teacher's `cli` binary shape (clap-derive args, dotenv,
//! tracing-subscriber, `eprintln!` + `process::exit(1)` on failure)
//! scaled down to the handful of flags this scanner actually needs.

mod llm_adapter;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use scan_core::config;
use scan_core::logger::ScanLogger;
use scan_core::orchestrator::Orchestrator;
use scan_core::prompts::PromptStore;
use scan_core::provider::{Provider, ProviderAdapter, ProviderConfig, ProviderSpec};

use llm_adapter::ProviderBackedLlm;

#[derive(Parser, Debug)]
#[command(name = "scan-cli")]
#[command(about = "Automated security scanner for AI agents")]
struct Args {
    /// Provider config file selecting the target agent (YAML/JSON, spec §6).
    #[arg(long, value_name = "PATH")]
    client_file: PathBuf,

    /// User guidance passed to every stage.
    #[arg(long, value_name = "TEXT", default_value = "")]
    prompt: String,

    /// Repo checkout the scan reasons about; empty skips the
    /// repo-dir-specific opener and language detection.
    #[arg(long, value_name = "DIR", default_value = "")]
    repo_dir: String,

    /// Optional catalog file overriding the embedded provider catalog.
    #[arg(long, value_name = "PATH")]
    catalog: Option<PathBuf>,

    /// Reasoning oracle provider id, e.g. `openai` or `anthropic:claude-3-5-sonnet`.
    #[arg(long, value_name = "ID", env = "SCAN_REASONING_PROVIDER", default_value = "openai")]
    reasoning_provider: String,

    /// Directory of prompt-template overrides (falls back to embedded defaults).
    #[arg(long, value_name = "DIR", env = "SCAN_PROMPTS_DIR")]
    prompts_dir: Option<PathBuf>,
}

fn model_name_of(provider: &Provider) -> String {
    match provider {
        Provider::Standard { model, .. } => model.clone(),
        other => other.spec().id.clone(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let catalog = match config::load_catalog(args.catalog.as_deref()) {
        Ok(catalog) => catalog,
        Err(e) => {
            eprintln!("scan-cli: {e}");
            std::process::exit(1);
        }
    };

    let target_spec = match config::load_provider_specs(&args.client_file) {
        Ok(specs) if !specs.is_empty() => specs.into_iter().next().unwrap(),
        Ok(_) => {
            eprintln!("scan-cli: provider config has an empty list");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("scan-cli: {e}");
            std::process::exit(1);
        }
    };
    let target_provider = Provider::build(target_spec, &catalog);

    let reasoning_spec = ProviderSpec {
        id: args.reasoning_provider.clone(),
        label: None,
        delay_ms: None,
        config: ProviderConfig::default(),
    };
    let reasoning_provider = Provider::build(reasoning_spec, &catalog);
    let reasoning_model_name = model_name_of(&reasoning_provider);

    let reasoning_adapter = Arc::new(ProviderAdapter::with_default_client(catalog.clone()));
    let llm = Arc::new(ProviderBackedLlm::new(
        reasoning_adapter,
        Arc::new(reasoning_provider),
        reasoning_model_name,
    ));

    let provider_adapter = ProviderAdapter::with_default_client(catalog);
    let prompts = match args.prompts_dir {
        Some(dir) => PromptStore::new(Some(dir)),
        None => PromptStore::with_embedded_defaults(),
    };
    let logger = Arc::new(ScanLogger::new());

    let orchestrator = Orchestrator::new(
        llm,
        Default::default(),
        target_provider,
        provider_adapter,
        prompts,
        logger,
    );

    match orchestrator.scan(&args.repo_dir, &args.prompt).await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("scan-cli: scan failed: {e}");
            std::process::exit(1);
        }
    }
}
