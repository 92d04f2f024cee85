// src/trends.rs

use crate::aggregator::{Bucket, Grouping};
use crate::model::*;
use crate::segmenter::Segmentation;
use chrono::Datelike;
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-year series derived from the yearly grouping
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearPoint {
    pub year: i32,
    pub era: Option<Era>,
    pub cumulative_count: usize,
    pub mean_content_age: f64,
    /// Percentage of the year's ratings at or above the high rating
    pub generosity_pct: f64,
}

/// Share of each year's ratings that carry one genre
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenreTrend {
    pub genre: String,
    pub points: Vec<(i32, f64)>,
}

pub fn yearly_series(
    by_year: &Grouping<i32>,
    segmentation: &Segmentation,
    reference_year: i32,
) -> Vec<YearPoint> {
    let mut cumulative_count = 0;
    by_year
        .buckets
        .iter()
        .map(|bucket: &Bucket<i32>| {
            cumulative_count += bucket.count;
            YearPoint {
                year: bucket.key,
                era: segmentation.era_of_year(bucket.key),
                cumulative_count,
                mean_content_age: (f64::from(reference_year) - bucket.mean_release_year).max(0.0),
                generosity_pct: bucket.high_rating_share * 100.0,
            }
        })
        .collect()
}

/// Percentage of each year's ratings tagged with `genres`, one series per genre.
/// Every year with ratings gets a point, zero when the genre is absent.
pub fn genre_trends(records: &[RatingRecord], genres: &[String]) -> Vec<GenreTrend> {
    let mut totals: BTreeMap<i32, usize> = BTreeMap::new();
    let mut hits: BTreeMap<(&str, i32), usize> = BTreeMap::new();
    for record in records {
        let year = record.rated_at.year();
        *totals.entry(year).or_insert(0) += 1;
        for genre in genres {
            if record.genres.contains(genre) {
                *hits.entry((genre.as_str(), year)).or_insert(0) += 1;
            }
        }
    }

    genres
        .iter()
        .map(|genre| GenreTrend {
            genre: genre.clone(),
            points: totals
                .iter()
                .map(|(&year, &total)| {
                    let hit = hits.get(&(genre.as_str(), year)).copied().unwrap_or(0);
                    (year, hit as f64 / total as f64 * 100.0)
                })
                .collect(),
        })
        .collect()
}

/// The `n` most frequent real genres, most frequent first
pub fn leading_genres(by_genre: &Grouping<String>, n: usize) -> Vec<String> {
    by_genre
        .rank_by_count()
        .into_iter()
        .filter(|b| b.key != UNCLASSIFIED_GENRE)
        .take(n)
        .map(|b| b.key.clone())
        .collect()
}
