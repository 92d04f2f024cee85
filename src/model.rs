// src/model.rs

use crate::aggregator::{Grouping, OverallStats};
use crate::config::AnalysisConfig;
use crate::correlator::Correlation;
use crate::error::{MalformedRecordError, StatisticError};
use crate::segmenter::Segmentation;
use crate::trends::{GenreTrend, YearPoint};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Genre key used for records that carry no genre at all
pub const UNCLASSIFIED_GENRE: &str = "Unclassified";

/// Director key used for records that carry no director at all
pub const UNATTRIBUTED_DIRECTOR: &str = "Unattributed";

/// One raw input row: column name to cell text
pub type RawRow = std::collections::HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContentType {
    Movie,
    TvSeries,
    TvEpisode,
    /// Any other export title type, kept verbatim
    Other(String),
}

impl ContentType {
    pub fn from_label(label: &str) -> Self {
        match label {
            "Movie" => ContentType::Movie,
            "TV Series" | "TV Mini Series" => ContentType::TvSeries,
            "TV Episode" => ContentType::TvEpisode,
            other => ContentType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentType::Movie => f.write_str("Movie"),
            ContentType::TvSeries => f.write_str("TV Series"),
            ContentType::TvEpisode => f.write_str("TV Episode"),
            ContentType::Other(label) if label.is_empty() => f.write_str("Unknown"),
            ContentType::Other(label) => f.write_str(label),
        }
    }
}

// Serialized by label so it can key a JSON object
impl Serialize for ContentType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A single rated title. Never mutated after loading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingRecord {
    pub title: String,
    pub content_type: ContentType,
    /// Always in 1..=10
    pub user_rating: u8,
    /// Population rating, 0.0..=10.0
    pub reference_rating: Option<f64>,
    pub rated_at: NaiveDate,
    pub release_year: i32,
    pub runtime_minutes: Option<u32>,
    pub genres: BTreeSet<String>,
    /// Deduplicated, in export order
    pub directors: Vec<String>,
}

/// Viewing phase a calendar year falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Era {
    Consumption,
    Maturation,
    Selective,
}

impl fmt::Display for Era {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Era::Consumption => "consumption",
            Era::Maturation => "maturation",
            Era::Selective => "selective",
        })
    }
}

/// Decade of release, stored as its first year (1994 -> 1990)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Decade(pub i32);

impl Decade {
    pub fn of(year: i32) -> Self {
        Decade(year.div_euclid(10) * 10)
    }
}

impl fmt::Display for Decade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// A half-open numeric band `[lo, hi)`, or the open-ended last band.
/// `Unknown` collects records whose value is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Band {
    Range { lo: u32, hi: Option<u32> },
    Unknown,
}

impl Band {
    /// Places `value` among ascending `edges`. Edges `[90, 120]` yield the
    /// bands `0-89`, `90-119` and `120+`.
    pub fn locate(value: u32, edges: &[u32]) -> Self {
        let idx = edges.partition_point(|&edge| edge <= value);
        let lo = if idx == 0 { 0 } else { edges[idx - 1] };
        Band::Range { lo, hi: edges.get(idx).copied() }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Band::Range { lo, hi: Some(hi) } => write!(f, "{}-{}", lo, hi - 1),
            Band::Range { lo, hi: None } => write!(f, "{}+", lo),
            Band::Unknown => f.write_str("unknown"),
        }
    }
}

/// Everything one run derives from its input. A statistic that could not
/// be computed keeps its error so the report can say why it is missing.
#[derive(Debug, Serialize)]
pub struct AnalysisResult {
    pub config: AnalysisConfig,
    pub rows_read: usize,
    pub rejected: Vec<MalformedRecordError>,
    pub overall: Result<OverallStats, StatisticError>,
    pub segmentation: Segmentation,
    pub by_year: Grouping<i32>,
    pub by_era: Grouping<Era>,
    pub by_director: Grouping<String>,
    pub by_genre: Grouping<String>,
    pub by_release_decade: Grouping<Decade>,
    pub by_runtime: Grouping<Band>,
    pub by_content_age: Grouping<Band>,
    pub by_content_type: Grouping<ContentType>,
    pub top_directors: Result<Vec<String>, StatisticError>,
    pub yearly: Vec<YearPoint>,
    pub genre_trends: Vec<GenreTrend>,
    pub correlation: Result<Correlation, StatisticError>,
    /// Kept for the scatter chart; one pair per record with a reference rating
    pub rating_pairs: Vec<(f64, f64)>,
}

#[cfg(test)]
pub mod fixtures {
    use super::*;

    /// A movie rated on January 1st of `year`, released the same year.
    pub fn rated(year: i32, rating: u8) -> RatingRecord {
        RatingRecord {
            title: format!("Title {year}-{rating}"),
            content_type: ContentType::Movie,
            user_rating: rating,
            reference_rating: None,
            rated_at: NaiveDate::from_ymd_opt(year, 1, 1).unwrap(),
            release_year: year,
            runtime_minutes: None,
            genres: BTreeSet::new(),
            directors: Vec::new(),
        }
    }

    pub fn with_genres(mut record: RatingRecord, genres: &[&str]) -> RatingRecord {
        record.genres = genres.iter().map(|g| g.to_string()).collect();
        record
    }

    pub fn with_directors(mut record: RatingRecord, directors: &[&str]) -> RatingRecord {
        record.directors = directors.iter().map(|d| d.to_string()).collect();
        record
    }

    pub fn with_reference(mut record: RatingRecord, reference: f64) -> RatingRecord {
        record.reference_rating = Some(reference);
        record
    }
}
