mod config;
mod errors;
mod models;
mod pipeline;
mod render;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::models::CvRecord;
use crate::pipeline::{ArtifactPair, Pipeline};

/// Generate a CV as PDF and DOCX from a JSON record.
#[derive(Debug, Parser)]
#[command(name = "cvgen", version)]
struct Cli {
    /// CV record in JSON
    record: PathBuf,

    /// Create the working area under this directory instead of the system temp dir
    #[arg(long)]
    work_root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(root) = cli.work_root {
        config.work_root = Some(root);
    }

    // Logs go to stderr; stdout carries the JSON result only
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting cvgen v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Template {}/{}, compiler '{}' ({:?} per pass)",
        config.template_dir.display(),
        config.template_name,
        config.latex_bin,
        config.pass_timeout
    );

    let record = load_record(&cli.record)?;
    let pipeline = Pipeline::from_config(&config).context("Failed to set up the pipeline")?;

    match pipeline.generate(&record).await {
        Ok(artifacts) => {
            print_artifacts(&artifacts)?;
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&e.to_json())?);
            std::process::exit(1);
        }
    }
}

fn load_record(path: &Path) -> Result<CvRecord> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read CV record {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a valid CV record", path.display()))
}

fn print_artifacts(artifacts: &ArtifactPair) -> Result<()> {
    let body = serde_json::json!({
        "status": "success",
        "message": "CV generated successfully",
        "pdf_path": artifacts.pdf,
        "docx_path": artifacts.docx,
        "directory": artifacts.directory,
        "generated_at": artifacts.generated_at,
    });
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
