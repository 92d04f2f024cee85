// src/main.rs

mod aggregator;
mod analyzer;
mod cli;
mod config;
mod correlator;
mod error;
mod loader;
mod model;
mod renderer;
mod report;
mod segmenter;
mod trends;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Args, Charts};
use config::{AnalysisConfig, FileConfig};
use std::time::Instant;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = args.config.as_deref().map(FileConfig::load).transpose()?;
    let config = AnalysisConfig::resolve(&args, file_config)?;

    let start_time = Instant::now();
    let analysis = analyzer::analyze(&args.input, &config)
        .with_context(|| format!("Error analyzing ratings in {}", args.input.display()))?;
    info!(
        "Analysis finished in {:.2?}. Loaded {} ratings, rejected {} rows.",
        start_time.elapsed(),
        analysis.by_year.total_count(),
        analysis.rejected.len()
    );

    let (report_path, markdown) = report::write_outputs(&analysis, &args)?;
    println!("{}", markdown);

    if args.charts == Charts::All {
        let render_start = Instant::now();
        let charts = renderer::render_charts(&analysis, &args)?;
        info!("Rendered {} charts in {:.2?}.", charts.len(), render_start.elapsed());
    }

    info!("Report written to {}. Total time: {:.2?}", report_path.display(), start_time.elapsed());
    Ok(())
}
