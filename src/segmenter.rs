// src/segmenter.rs

use crate::config::EraConfig;
use crate::model::*;
use chrono::Datelike;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Year and era tags for one record set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segmentation {
    pub anchor_year: Option<i32>,
    /// Every rating year present in the input
    pub year_eras: BTreeMap<i32, Era>,
    /// Parallel to the record slice that was segmented
    pub record_eras: Vec<Era>,
}

impl Segmentation {
    pub fn era_of_year(&self, year: i32) -> Option<Era> {
        self.year_eras.get(&year).copied()
    }
}

/// Classify a year by its distance from the anchor. Years before the
/// anchor fall into the consumption era.
pub fn classify(year: i32, anchor: i32, eras: &EraConfig) -> Era {
    let offset = i64::from(year) - i64::from(anchor);
    if offset < i64::from(eras.consumption_years) {
        Era::Consumption
    } else if offset < i64::from(eras.consumption_years) + i64::from(eras.maturation_years) {
        Era::Maturation
    } else {
        Era::Selective
    }
}

pub fn segment(records: &[RatingRecord], eras: &EraConfig) -> Segmentation {
    let first_year = records.iter().map(|r| r.rated_at.year()).min();
    let anchor_year = eras.anchor_year.or(first_year);

    let Some(anchor) = anchor_year else {
        return Segmentation { anchor_year, year_eras: BTreeMap::new(), record_eras: Vec::new() };
    };

    let mut year_eras = BTreeMap::new();
    let record_eras = records
        .iter()
        .map(|record| {
            let year = record.rated_at.year();
            *year_eras.entry(year).or_insert_with(|| classify(year, anchor, eras))
        })
        .collect();

    debug!("Segmented {} years from anchor {}", year_eras.len(), anchor);
    Segmentation { anchor_year, year_eras, record_eras }
}
