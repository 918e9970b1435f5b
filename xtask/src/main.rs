use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod tasks;

#[derive(Parser)]
#[command(
    name = "deeplab-eval",
    about = "DeepLab-ResNet semantic segmentation evaluation toolkit",
    author,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute mean IoU and pixel accuracy of a checkpoint on a labeled dataset
    Evaluate(tasks::evaluate::EvaluateArgs),
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the progress and metric lines.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Evaluate(args) => tasks::evaluate::run(args),
    }
}
