mod analyze;
mod display;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use verisight_ai::{EvidenceScorer, ScorerConfig};

#[derive(Parser)]
#[command(name = "verisight", version, about = "Tell real photographs from AI-generated images")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Label an image with an ONNX model and score it.
    Analyze {
        /// JPEG, PNG or WebP image to analyze.
        image: PathBuf,
        /// Directory holding model.onnx and labels.txt.
        #[arg(long, env = "VERISIGHT_MODEL_DIR")]
        model_dir: PathBuf,
        /// Scorer configuration overriding the built-in one.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
        /// Show the labels and the evidence behind the verdict.
        #[arg(long)]
        explain: bool,
    },
    /// Score a JSON array of {label, score} predictions without a model.
    Score {
        /// Predictions file, or `-` for stdin.
        predictions: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
        #[arg(long)]
        explain: bool,
    },
    /// Print the effective scorer configuration.
    Config {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!("verisight v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Analyze {
            image,
            model_dir,
            config,
            json,
            explain,
        } => {
            let config = load_config(config.as_deref())?;
            let report = analyze::analyze_image(&image, &model_dir, &config).await?;
            display::print_report(&report, json, explain)
        }
        Command::Score {
            predictions,
            config,
            json,
            explain,
        } => {
            let config = load_config(config.as_deref())?;
            let scorer = EvidenceScorer::new(&config).context("building scorer")?;
            let labels = analyze::read_predictions(&predictions)?;
            let source = predictions.display().to_string();
            let report = analyze::score_predictions(&scorer, source, labels)?;
            display::print_report(&report, json, explain)
        }
        Command::Config { config } => {
            let config = load_config(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ScorerConfig> {
    match path {
        Some(path) => ScorerConfig::from_path(path)
            .with_context(|| format!("loading scorer config {}", path.display())),
        None => Ok(ScorerConfig::default()),
    }
}
