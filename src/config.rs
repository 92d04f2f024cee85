// src/config.rs

use crate::cli::Args;
use crate::error::ConfigError;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONSUMPTION_YEARS: u32 = 3;
pub const DEFAULT_MATURATION_YEARS: u32 = 6;
pub const DEFAULT_MIN_SAMPLES: usize = 3;
pub const DEFAULT_HIGH_RATING: u8 = 8;
pub const DEFAULT_TREND_GENRES: usize = 5;
pub const DEFAULT_TOP: usize = 10;
pub const DEFAULT_RUNTIME_EDGES: [u32; 3] = [90, 120, 150];
pub const DEFAULT_CONTENT_AGE_EDGES: [u32; 4] = [6, 16, 31, 51];

/// Era boundaries, counted in years from the anchor year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EraConfig {
    pub consumption_years: u32,
    pub maturation_years: u32,
    /// First year of the consumption era. Defaults to the earliest rated year.
    pub anchor_year: Option<i32>,
}

impl Default for EraConfig {
    fn default() -> Self {
        Self {
            consumption_years: DEFAULT_CONSUMPTION_YEARS,
            maturation_years: DEFAULT_MATURATION_YEARS,
            anchor_year: None,
        }
    }
}

/// Everything a run depends on besides its input records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisConfig {
    pub eras: EraConfig,
    /// Buckets with fewer samples are flagged low-confidence
    pub min_samples: usize,
    /// Year content age is measured from
    pub reference_year: i32,
    pub runtime_edges: Vec<u32>,
    pub content_age_edges: Vec<u32>,
    /// Ratings at or above this count as high
    pub high_rating: u8,
    pub trend_genres: usize,
    pub top: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            eras: EraConfig::default(),
            min_samples: DEFAULT_MIN_SAMPLES,
            reference_year: chrono::Local::now().year(),
            runtime_edges: DEFAULT_RUNTIME_EDGES.to_vec(),
            content_age_edges: DEFAULT_CONTENT_AGE_EDGES.to_vec(),
            high_rating: DEFAULT_HIGH_RATING,
            trend_genres: DEFAULT_TREND_GENRES,
            top: DEFAULT_TOP,
        }
    }
}

/// On-disk TOML configuration. Every field is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub consumption_years: Option<u32>,
    pub maturation_years: Option<u32>,
    pub anchor_year: Option<i32>,
    pub min_samples: Option<usize>,
    pub reference_year: Option<i32>,
    pub runtime_edges: Option<Vec<u32>>,
    pub content_age_edges: Option<Vec<u32>>,
    pub high_rating: Option<u8>,
    pub trend_genres: Option<usize>,
    pub top: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }
}

impl AnalysisConfig {
    /// Resolve the configuration: explicit CLI flags win over the file,
    /// the file wins over built-in defaults.
    pub fn resolve(cli: &Args, file_config: Option<FileConfig>) -> Result<Self, ConfigError> {
        let file = file_config.unwrap_or_default();
        let defaults = AnalysisConfig::default();

        let config = AnalysisConfig {
            eras: EraConfig {
                consumption_years: cli
                    .consumption_years
                    .or(file.consumption_years)
                    .unwrap_or(defaults.eras.consumption_years),
                maturation_years: cli
                    .maturation_years
                    .or(file.maturation_years)
                    .unwrap_or(defaults.eras.maturation_years),
                anchor_year: cli.anchor_year.or(file.anchor_year),
            },
            min_samples: cli.min_samples.or(file.min_samples).unwrap_or(defaults.min_samples),
            reference_year: cli.reference_year.or(file.reference_year).unwrap_or(defaults.reference_year),
            runtime_edges: file.runtime_edges.unwrap_or(defaults.runtime_edges),
            content_age_edges: file.content_age_edges.unwrap_or(defaults.content_age_edges),
            high_rating: cli.high_rating.or(file.high_rating).unwrap_or(defaults.high_rating),
            trend_genres: cli.trend_genres.or(file.trend_genres).unwrap_or(defaults.trend_genres),
            top: cli.top.or(file.top).unwrap_or(defaults.top),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.eras.consumption_years == 0 {
            return Err(ConfigError::EmptyEra { era: "consumption" });
        }
        if self.eras.maturation_years == 0 {
            return Err(ConfigError::EmptyEra { era: "maturation" });
        }
        if self.min_samples == 0 {
            return Err(ConfigError::ZeroMinSamples);
        }
        if !(1..=10).contains(&self.high_rating) {
            return Err(ConfigError::HighRatingOutOfRange(self.high_rating));
        }
        check_edges("runtime", &self.runtime_edges)?;
        check_edges("content age", &self.content_age_edges)?;
        Ok(())
    }
}

fn check_edges(name: &'static str, edges: &[u32]) -> Result<(), ConfigError> {
    let ascending = edges.windows(2).all(|pair| pair[0] < pair[1]);
    if !ascending || edges.first() == Some(&0) {
        return Err(ConfigError::BadBandEdges { name, edges: edges.to_vec() });
    }
    Ok(())
}
