// src/analyzer.rs

use crate::aggregator::*;
use crate::config::AnalysisConfig;
use crate::correlator::{correlate, rating_pairs};
use crate::error::LoadError;
use crate::loader::{load_records, open_rows, LoadOutcome};
use crate::model::*;
use crate::segmenter::segment;
use crate::trends::{genre_trends, leading_genres, yearly_series};
use std::path::Path;
use tracing::{info, warn};

pub fn analyze(csv_path: &Path, config: &AnalysisConfig) -> Result<AnalysisResult, LoadError> {
    let rows = open_rows(csv_path)?;
    let rows_read = rows.len();
    let outcome = load_records(rows);
    Ok(run(outcome, rows_read, config))
}

/// Run every stage over already loaded records. Stage failures are kept in
/// the result rather than aborting the run.
pub fn run(outcome: LoadOutcome, rows_read: usize, config: &AnalysisConfig) -> AnalysisResult {
    let LoadOutcome { records, rejected } = outcome;
    let records = records.as_slice();

    // 1. Tag years and records with eras
    let segmentation = segment(records, &config.eras);

    // 2. Independent groupings over the same immutable records
    let by_age = ByContentAge { reference_year: config.reference_year, edges: &config.content_age_edges };
    let ((by_year, by_era, by_content_type), ((by_director, by_genre), (by_release_decade, by_runtime, by_content_age))) =
        rayon::join(
            || {
                (
                    group(records, &ByRatedYear, config),
                    group(records, &ByEra(&segmentation), config),
                    group(records, &ByContentType, config),
                )
            },
            || {
                rayon::join(
                    || (group(records, &ByDirector, config), group(records, &ByGenre, config)),
                    || {
                        (
                            group(records, &ByReleaseDecade, config),
                            group(records, &ByRuntime(&config.runtime_edges), config),
                            group(records, &by_age, config),
                        )
                    },
                )
            },
        );
    info!(
        "Grouped {} records into {} years, {} directors, {} genres",
        records.len(),
        by_year.buckets.len(),
        by_director.buckets.len(),
        by_genre.buckets.len()
    );

    // 3. Summary, rankings and trends
    let overall = summarize(records, config);
    let top_directors: Result<Vec<String>, _> = by_director
        .top_by_mean(config.top, &[UNATTRIBUTED_DIRECTOR.to_string()])
        .map(|top| top.into_iter().map(|b| b.key.clone()).collect());
    let yearly = yearly_series(&by_year, &segmentation, config.reference_year);
    let genre_trends = genre_trends(records, &leading_genres(&by_genre, config.trend_genres));

    // 4. Alignment with the reference ratings
    let correlation = correlate(records);

    for failure in [overall.as_ref().err(), top_directors.as_ref().err(), correlation.as_ref().err()]
        .into_iter()
        .flatten()
    {
        warn!("Statistic unavailable: {}", failure);
    }

    AnalysisResult {
        config: config.clone(),
        rows_read,
        rejected,
        overall,
        segmentation,
        by_year,
        by_era,
        by_director,
        by_genre,
        by_release_decade,
        by_runtime,
        by_content_age,
        by_content_type,
        top_directors,
        yearly,
        genre_trends,
        correlation,
        rating_pairs: rating_pairs(records),
    }
}
