//! # convintel CLI entry point
//!
//! Analyzes a transcript against the policy store and prints the response as
//! JSON on stdout. Logs go to stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use convintel_core::analysis::lexicon::Lexicon;
use convintel_core::pipeline::ExternalSignals;
use convintel_core::{
    AnalysisRequest, Conversation, EngineConfig, PipelineOrchestrator, PolicyStore, TurnInput,
};

#[derive(Parser, Debug)]
#[command(name = "convintel", version, about = "Deterministic conversation intelligence")]
struct Cli {
    /// Policy store directory (one JSON document per domain).
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze one conversation.
    Analyze {
        /// Transcript file: `Speaker: text` lines, a JSON array of turns, or a full request object.
        transcript: PathBuf,

        /// Domain name or "auto".
        #[arg(long, default_value = "auto")]
        domain: String,

        /// Precomputed external signals (JSON).
        #[arg(long)]
        signals: Option<PathBuf>,
    },

    /// Print policy corpus coverage per domain.
    Domains,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("CONVINTEL_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(JsonStorageLayer)
            .with(BunyanFormattingLayer::new("convintel".into(), std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("tracing already initialized: {}", e);
    }
}

fn read_request(path: &Path, domain: &str) -> anyhow::Result<AnalysisRequest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading transcript {}", path.display()))?;
    let trimmed = raw.trim_start();

    let request = if trimmed.starts_with('{') {
        AnalysisRequest::from_json(&raw)?
    } else if trimmed.starts_with('[') {
        let turns: Vec<TurnInput> = serde_json::from_str(&raw).context("parsing JSON turns")?;
        AnalysisRequest::new(domain, turns)
    } else {
        let turns = Conversation::parse_transcript(&raw)
            .turns()
            .iter()
            .map(|t| TurnInput {
                speaker: t.speaker.label().to_string(),
                text: t.text.clone(),
            })
            .collect();
        AnalysisRequest::new(domain, turns)
    };
    Ok(request)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = EngineConfig::from_env()?;
    if let Some(dir) = &cli.store {
        config.pipeline.policy_store_dir = dir.clone();
    }
    debug!(store = %config.pipeline.policy_store_dir.display(), "Configuration loaded");

    let store = Arc::new(PolicyStore::new());
    let snapshot = store.load_dir(&config.pipeline.policy_store_dir)?;

    match cli.command {
        Commands::Domains => {
            let coverage = snapshot.coverage();
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "generation": snapshot.generation(),
                    "domains": coverage,
                    "quarantined": snapshot.quarantined(),
                }))?
            );
        }
        Commands::Analyze {
            transcript,
            domain,
            signals,
        } => {
            if snapshot.is_empty() {
                bail!(
                    "no domain could be loaded from {}",
                    config.pipeline.policy_store_dir.display()
                );
            }
            let mut request = read_request(&transcript, &domain)?;
            if let Some(path) = signals {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading signals {}", path.display()))?;
                request.signals = Some(ExternalSignals::from_json(&raw)?);
            }

            let orchestrator =
                PipelineOrchestrator::new(store, Arc::new(config), Arc::new(Lexicon::english()))?;
            let response = orchestrator.analyze(request).await?;
            info!(
                request_id = %response.request_id,
                elapsed_ms = response.elapsed_ms,
                "Request served"
            );
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
