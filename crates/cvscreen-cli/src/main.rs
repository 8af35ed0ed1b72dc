//! `cvscreen`: screen every CV in a folder against the role the folder is
//! named after and write the results as a CSV table.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use cvscreen_core::SummaryReport;
use cvscreen_runtime::{ProviderRegistry, RunOutcome, RuntimeConfig, ScreeningOrchestrator};

#[derive(Parser, Debug)]
#[command(name = "cvscreen", version, about = "Evaluate a folder of CVs with an LLM")]
struct Cli {
    /// Folder of PDF CVs; its name is the job role (e.g. junior_fullstack_developer)
    #[arg(long)]
    folder: PathBuf,

    /// Where to write the result table
    #[arg(long, default_value = "results.csv")]
    output: PathBuf,

    /// YAML runtime configuration
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    temperature: Option<f32>,

    /// Attempts per CV, including the first
    #[arg(long)]
    max_retries: Option<u32>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,

    /// Skip the summary printed after a run
    #[arg(long)]
    no_summary: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "cvscreen failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli)?;

    let registry = ProviderRegistry::with_defaults();
    registry
        .validate(&config.provider, &config.provider_config)
        .context("Provider is not usable")?;

    let provider = registry
        .create(&config.provider, &config.provider_config)
        .with_context(|| format!("Failed to initialize provider '{}'", config.provider))?;
    if !provider.health_check().await {
        anyhow::bail!("Provider '{}' has no usable API key", provider.name());
    }

    tracing::info!(
        provider = provider.name(),
        model = %config.model,
        max_retries = config.max_retries,
        "Starting screening run"
    );

    let orchestrator = ScreeningOrchestrator::builder()
        .provider(provider)
        .config(config)
        .build()?;

    let outcome = orchestrator
        .run(&cli.folder, &cli.output)
        .await
        .context("Screening run failed")?;

    match outcome {
        RunOutcome::FolderMissing => Ok(ExitCode::FAILURE),
        RunOutcome::NoDocuments => Ok(ExitCode::SUCCESS),
        RunOutcome::Completed(summary) => {
            println!(
                "Screened {} CVs for '{}', results saved to {}",
                summary.documents,
                summary.role,
                summary.output.display()
            );
            if summary.failed > 0 {
                println!("{} CVs could not be evaluated", summary.failed);
            }
            if !cli.no_summary {
                println!();
                print!("{}", SummaryReport::from_records(&summary.records));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Config file (or defaults) with command-line overrides applied.
fn load_config(cli: &Cli) -> Result<RuntimeConfig> {
    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RuntimeConfig::default(),
    };

    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(temperature) = cli.temperature {
        config.temperature = temperature;
    }
    if let Some(max_retries) = cli.max_retries {
        config.max_retries = max_retries;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}
