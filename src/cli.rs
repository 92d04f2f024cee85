// src/cli.rs

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the IMDb ratings CSV export
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory to write the report, charts and JSON result into
    #[arg(short, long, default_value = "imdb-report")]
    pub output: PathBuf,

    /// Optional TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of years in the consumption era
    #[arg(long)]
    pub consumption_years: Option<u32>,

    /// Number of years in the maturation era, following the consumption era
    #[arg(long)]
    pub maturation_years: Option<u32>,

    /// First year of the consumption era (defaults to the earliest rating year)
    #[arg(long)]
    pub anchor_year: Option<i32>,

    /// Buckets with fewer samples are flagged as low-confidence
    #[arg(long)]
    pub min_samples: Option<usize>,

    /// Year content age is measured from (defaults to the current year)
    #[arg(long)]
    pub reference_year: Option<i32>,

    /// Ratings at or above this value count as high
    #[arg(long)]
    pub high_rating: Option<u8>,

    /// Number of most frequent genres tracked per year
    #[arg(long)]
    pub trend_genres: Option<usize>,

    /// Length of ranked lists in the report
    #[arg(long)]
    pub top: Option<usize>,

    /// Width of the chart images in pixels
    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    /// Height of the chart images in pixels
    #[arg(long, default_value_t = 720)]
    pub height: u32,

    /// Which charts to render
    #[arg(long, value_enum, default_value_t = Charts::All)]
    pub charts: Charts,

    /// Also write the structured result as analysis.json
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::ValueEnum, Clone, Debug, Copy, PartialEq, Eq)]
pub enum Charts {
    /// Render every chart
    All,
    /// Only write the text report
    None,
}
