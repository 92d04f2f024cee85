// src/error.rs

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// A single input row that could not be turned into a record.
/// `row` is the zero-based index of the data row (header excluded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("row {row}: field `{field}` {problem}")]
pub struct MalformedRecordError {
    pub row: usize,
    pub field: String,
    pub problem: String,
}

impl MalformedRecordError {
    pub fn missing(row: usize, field: &str) -> Self {
        Self { row, field: field.to_string(), problem: "is missing".to_string() }
    }

    pub fn invalid(row: usize, field: &str, value: &str, expected: &str) -> Self {
        Self {
            row,
            field: field.to_string(),
            problem: format!("has invalid value {value:?} (expected {expected})"),
        }
    }
}

/// A derived statistic that could not be computed. Only the affected
/// statistic is lost; the rest of the analysis still completes.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
pub enum StatisticError {
    #[error(
        "{}{}: {} observation(s), at least {} required",
        .statistic,
        key_suffix(.key),
        .observations,
        .required
    )]
    InsufficientData {
        statistic: &'static str,
        key: Option<String>,
        observations: usize,
        required: usize,
    },

    #[error("{statistic}: {axis} values are constant across {observations} observation(s)")]
    ZeroVariance {
        statistic: &'static str,
        axis: &'static str,
        observations: usize,
    },
}

fn key_suffix(key: &Option<String>) -> String {
    key.as_ref().map(|k| format!(" [{k}]")).unwrap_or_default()
}

impl StatisticError {
    pub fn insufficient(statistic: &'static str, observations: usize, required: usize) -> Self {
        StatisticError::InsufficientData { statistic, key: None, observations, required }
    }
}

/// Invalid configuration. Always fatal, raised before any record is read.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("era `{era}` must span at least one year")]
    EmptyEra { era: &'static str },

    #[error("min_samples must be at least 1")]
    ZeroMinSamples,

    #[error("high_rating must lie in 1..=10, got {0}")]
    HighRatingOutOfRange(u8),

    #[error("{name} edges must be positive and strictly ascending, got {edges:?}")]
    BadBandEdges { name: &'static str, edges: Vec<u32> },

    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// The input file as a whole could not be read.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read CSV data: {0}")]
    Csv(#[from] csv::Error),
}
