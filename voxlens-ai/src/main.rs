//! voxlens-ai - speech analysis command line
//!
//! - `analyze`: run the three analysis stages over a transcript and a feature file
//! - `recover`: run the recovery parser over model text
//! - `init-config`: write the default configuration file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use voxlens_ai::capability::CapabilityGate;
use voxlens_ai::config::{default_config_path, AnalysisConfig};
use voxlens_ai::llm::resolve_model;
use voxlens_ai::stages::StageRuntime;
use voxlens_ai::{recover, AudioFeatures, Orchestrator, SharedState};
use voxlens_common::config::LoggingConfig;
use voxlens_common::logging::init_tracing;

/// Command-line arguments for voxlens-ai
#[derive(Parser, Debug)]
#[command(name = "voxlens-ai")]
#[command(about = "Speech communication, confidence and personality analysis")]
#[command(version, long_version = concat!(
    env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ", ", env!("BUILD_PROFILE"), ", built ", env!("BUILD_TIMESTAMP"), ")"
))]
struct Args {
    /// Configuration file (overrides VOXLENS_CONFIG and the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a transcript with its acoustic features
    Analyze {
        /// Transcript text file
        #[arg(short, long)]
        transcript: PathBuf,

        /// Acoustic features JSON file (omit to analyze without features)
        #[arg(short, long)]
        features: Option<PathBuf>,
    },

    /// Recover a JSON object from model output text (file, or stdin)
    Recover {
        input: Option<PathBuf>,
    },

    /// Write the default configuration file
    InitConfig {
        /// Target path (default: user config dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Recover { input } => {
            init_tracing(&LoggingConfig::default())?;
            let text = read_input(input.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&recover(text))?);
            Ok(())
        }
        Command::InitConfig { output, force } => {
            init_tracing(&LoggingConfig::default())?;
            init_config(output, force)
        }
        Command::Analyze {
            transcript,
            features,
        } => {
            let config = AnalysisConfig::load(args.config.as_deref())
                .context("Failed to load configuration")?;
            init_tracing(&config.logging)?;
            config.validate()?;
            analyze(&config, &transcript, features.as_deref()).await
        }
    }
}

async fn analyze(config: &AnalysisConfig, transcript: &Path, features: Option<&Path>) -> Result<()> {
    info!(
        "Starting voxlens-ai {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );

    let transcript = std::fs::read_to_string(transcript)
        .with_context(|| format!("Failed to read transcript {}", transcript.display()))?;
    let features = match features {
        Some(path) => Some(load_features(path)?),
        None => {
            warn!("No feature file given; feature-dependent stages will degrade");
            None
        }
    };

    let model = resolve_model(&config.llm)
        .await
        .context("Language model unavailable")?;
    let gate = CapabilityGate::from_config(&config.retriever, &config.validation);
    let capabilities = gate.resolve().await.clone();

    let runtime = StageRuntime::new(model, capabilities)
        .with_transcript_limit(config.pipeline.transcript_limit);
    let orchestrator =
        Orchestrator::standard(&runtime).with_failure_policy(config.pipeline.failure_policy);

    let report = orchestrator
        .run_with_report(SharedState::from_inputs(transcript, features))
        .await?;
    for (stage, reason) in &report.degraded {
        warn!(stage = %stage, reason = %reason, "Stage result degraded");
    }

    println!("{}", serde_json::to_string_pretty(&report.state)?);
    Ok(())
}

fn load_features(path: &Path) -> Result<AudioFeatures> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read features {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Features file {} is not a JSON object", path.display()))
}

fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

fn init_config(output: Option<PathBuf>, force: bool) -> Result<()> {
    let target = output
        .or_else(default_config_path)
        .context("No user config directory; pass --output")?;
    if target.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            target.display()
        );
    }
    AnalysisConfig::default().write(&target)?;
    println!("{}", target.display());
    Ok(())
}
