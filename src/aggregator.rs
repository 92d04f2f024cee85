// src/aggregator.rs

use crate::config::AnalysisConfig;
use crate::error::StatisticError;
use crate::model::*;
use crate::segmenter::Segmentation;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Extracts the grouping keys of a record. Single-valued rules return
/// exactly one key; multi-valued rules return one key per value.
pub trait KeyRule {
    type Key: Ord + Clone + fmt::Display;

    fn name(&self) -> &'static str;

    fn keys(&self, index: usize, record: &RatingRecord) -> Vec<Self::Key>;
}

pub struct ByRatedYear;

impl KeyRule for ByRatedYear {
    type Key = i32;
    fn name(&self) -> &'static str {
        "year"
    }
    fn keys(&self, _: usize, record: &RatingRecord) -> Vec<i32> {
        vec![record.rated_at.year()]
    }
}

/// Groups by the era tag assigned to each record
pub struct ByEra<'a>(pub &'a Segmentation);

impl KeyRule for ByEra<'_> {
    type Key = Era;
    fn name(&self) -> &'static str {
        "era"
    }
    fn keys(&self, index: usize, _: &RatingRecord) -> Vec<Era> {
        self.0.record_eras.get(index).copied().into_iter().collect()
    }
}

pub struct ByDirector;

impl KeyRule for ByDirector {
    type Key = String;
    fn name(&self) -> &'static str {
        "director"
    }
    fn keys(&self, _: usize, record: &RatingRecord) -> Vec<String> {
        if record.directors.is_empty() {
            return vec![UNATTRIBUTED_DIRECTOR.to_string()];
        }
        record.directors.clone()
    }
}

pub struct ByGenre;

impl KeyRule for ByGenre {
    type Key = String;
    fn name(&self) -> &'static str {
        "genre"
    }
    fn keys(&self, _: usize, record: &RatingRecord) -> Vec<String> {
        if record.genres.is_empty() {
            return vec![UNCLASSIFIED_GENRE.to_string()];
        }
        record.genres.iter().cloned().collect()
    }
}

pub struct ByReleaseDecade;

impl KeyRule for ByReleaseDecade {
    type Key = Decade;
    fn name(&self) -> &'static str {
        "release decade"
    }
    fn keys(&self, _: usize, record: &RatingRecord) -> Vec<Decade> {
        vec![Decade::of(record.release_year)]
    }
}

pub struct ByRuntime<'a>(pub &'a [u32]);

impl KeyRule for ByRuntime<'_> {
    type Key = Band;
    fn name(&self) -> &'static str {
        "runtime"
    }
    fn keys(&self, _: usize, record: &RatingRecord) -> Vec<Band> {
        vec![record.runtime_minutes.map_or(Band::Unknown, |minutes| Band::locate(minutes, self.0))]
    }
}

/// Groups by years between release and `reference_year`, clamped at zero
pub struct ByContentAge<'a> {
    pub reference_year: i32,
    pub edges: &'a [u32],
}

impl KeyRule for ByContentAge<'_> {
    type Key = Band;
    fn name(&self) -> &'static str {
        "content age"
    }
    fn keys(&self, _: usize, record: &RatingRecord) -> Vec<Band> {
        vec![Band::locate(content_age(self.reference_year, record), self.edges)]
    }
}

pub struct ByContentType;

impl KeyRule for ByContentType {
    type Key = ContentType;
    fn name(&self) -> &'static str {
        "content type"
    }
    fn keys(&self, _: usize, record: &RatingRecord) -> Vec<ContentType> {
        vec![record.content_type.clone()]
    }
}

pub fn content_age(reference_year: i32, record: &RatingRecord) -> u32 {
    let age = i64::from(reference_year) - i64::from(record.release_year);
    age.clamp(0, i64::from(u32::MAX)) as u32
}

/// One (record, key) pair produced by the fan-out step
#[derive(Debug)]
pub struct Contribution<'r, K> {
    pub record: &'r RatingRecord,
    pub key: K,
}

/// Expand records into one contribution per key. A record with three
/// genres yields three contributions under the genre rule.
pub fn fan_out<'r, R: KeyRule>(records: &'r [RatingRecord], rule: &R) -> Vec<Contribution<'r, R::Key>> {
    records
        .iter()
        .enumerate()
        .flat_map(|(index, record)| {
            rule.keys(index, record).into_iter().map(move |key| Contribution { record, key })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket<K> {
    pub key: K,
    pub count: usize,
    pub mean_rating: f64,
    /// Sample standard deviation, absent below two samples
    pub rating_std_dev: Option<f64>,
    /// Mean over the records that carry a reference rating
    pub mean_reference: Option<f64>,
    pub reference_count: usize,
    pub mean_release_year: f64,
    /// Fraction of ratings at or above the configured high rating
    pub high_rating_share: f64,
    pub latest_rated: Option<NaiveDate>,
    pub low_confidence: bool,
}

#[derive(Default)]
struct Accumulator {
    count: usize,
    rating_sum: f64,
    rating_sq_sum: f64,
    reference_sum: f64,
    reference_count: usize,
    release_sum: f64,
    high_count: usize,
    latest_rated: Option<NaiveDate>,
}

impl Accumulator {
    fn add(&mut self, record: &RatingRecord, high_rating: u8) {
        let rating = f64::from(record.user_rating);
        self.count += 1;
        self.rating_sum += rating;
        self.rating_sq_sum += rating * rating;
        self.release_sum += f64::from(record.release_year);
        self.latest_rated = self.latest_rated.max(Some(record.rated_at));
        if record.user_rating >= high_rating {
            self.high_count += 1;
        }
        if let Some(reference) = record.reference_rating {
            self.reference_sum += reference;
            self.reference_count += 1;
        }
    }

    fn finish<K>(self, key: K, min_samples: usize) -> Bucket<K> {
        let n = self.count as f64;
        let mean_rating = self.rating_sum / n;
        let rating_std_dev = (self.count >= 2).then(|| {
            let variance = (self.rating_sq_sum - n * mean_rating * mean_rating) / (n - 1.0);
            variance.max(0.0).sqrt()
        });
        Bucket {
            key,
            count: self.count,
            mean_rating,
            rating_std_dev,
            mean_reference: (self.reference_count > 0)
                .then(|| self.reference_sum / self.reference_count as f64),
            reference_count: self.reference_count,
            mean_release_year: self.release_sum / n,
            high_rating_share: self.high_count as f64 / n,
            latest_rated: self.latest_rated,
            low_confidence: self.count < min_samples,
        }
    }
}

/// Buckets of one grouping, in ascending key order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grouping<K> {
    pub rule: &'static str,
    pub buckets: Vec<Bucket<K>>,
    /// Number of (record, key) contributions; exceeds the record count for
    /// multi-valued rules
    pub contributions: usize,
    pub min_samples: usize,
}

pub fn group<R: KeyRule>(records: &[RatingRecord], rule: &R, config: &AnalysisConfig) -> Grouping<R::Key> {
    let contributions = fan_out(records, rule);
    let total = contributions.len();

    let mut accumulators: BTreeMap<R::Key, Accumulator> = BTreeMap::new();
    for Contribution { record, key } in contributions {
        accumulators.entry(key).or_default().add(record, config.high_rating);
    }

    let buckets = accumulators
        .into_iter()
        .map(|(key, acc)| acc.finish(key, config.min_samples))
        .collect();

    Grouping { rule: rule.name(), buckets, contributions: total, min_samples: config.min_samples }
}

impl<K: Ord + Clone + fmt::Display> Grouping<K> {
    pub fn get(&self, key: &K) -> Option<&Bucket<K>> {
        self.buckets
            .binary_search_by(|bucket| bucket.key.cmp(key))
            .ok()
            .map(|idx| &self.buckets[idx])
    }

    pub fn total_count(&self) -> usize {
        self.buckets.iter().map(|b| b.count).sum()
    }

    /// Highest mean first; ties by larger sample, then by key.
    pub fn rank_by_mean(&self) -> Vec<&Bucket<K>> {
        let mut ranked: Vec<&Bucket<K>> = self.buckets.iter().collect();
        ranked.sort_by(|a, b| {
            b.mean_rating
                .partial_cmp(&a.mean_rating)
                .unwrap_or(Ordering::Equal)
                .then(b.count.cmp(&a.count))
                .then_with(|| a.key.cmp(&b.key))
        });
        ranked
    }

    /// Largest sample first; ties by key.
    pub fn rank_by_count(&self) -> Vec<&Bucket<K>> {
        let mut ranked: Vec<&Bucket<K>> = self.buckets.iter().collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        ranked
    }

    /// The `n` best confident buckets by mean, skipping `exclude` keys.
    /// On failure the error carries the largest candidate sample against
    /// the configured minimum.
    pub fn top_by_mean(&self, n: usize, exclude: &[K]) -> Result<Vec<&Bucket<K>>, StatisticError> {
        let candidates: Vec<_> = self.rank_by_mean().into_iter().filter(|b| !exclude.contains(&b.key)).collect();
        let largest = candidates.iter().map(|b| b.count).max().unwrap_or(0);
        let top: Vec<_> = candidates.into_iter().filter(|b| !b.low_confidence).take(n).collect();
        if top.is_empty() {
            return Err(StatisticError::InsufficientData {
                statistic: "top by mean rating",
                key: Some(self.rule.to_string()),
                observations: largest,
                required: self.min_samples,
            });
        }
        Ok(top)
    }
}

/// Whole-dataset summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallStats {
    pub count: usize,
    pub mean: f64,
    pub std_dev: Option<f64>,
    /// Most frequent rating; the lowest wins a tie
    pub mode: u8,
    /// Index 0 holds the count of 1s, index 9 the count of 10s
    pub distribution: [usize; 10],
    pub content_types: BTreeMap<ContentType, usize>,
    pub high_share: f64,
    pub low_share: f64,
    pub generous_share: f64,
    pub first_rated: NaiveDate,
    pub last_rated: NaiveDate,
}

pub const LOW_RATING: u8 = 5;
pub const GENEROUS_RATING: u8 = 7;

pub fn summarize(records: &[RatingRecord], config: &AnalysisConfig) -> Result<OverallStats, StatisticError> {
    let (Some(first_rated), Some(last_rated)) = (
        records.iter().map(|r| r.rated_at).min(),
        records.iter().map(|r| r.rated_at).max(),
    ) else {
        return Err(StatisticError::insufficient("overall statistics", 0, 1));
    };

    let mut distribution = [0usize; 10];
    let mut content_types = BTreeMap::new();
    let mut acc = Accumulator::default();
    for record in records {
        distribution[usize::from(record.user_rating - 1)] += 1;
        *content_types.entry(record.content_type.clone()).or_insert(0) += 1;
        acc.add(record, config.high_rating);
    }

    let low_share = share_of(records, |rating| rating <= LOW_RATING);
    let generous_share = share_of(records, |rating| rating >= GENEROUS_RATING);

    // max_by_key keeps the last maximum, so walk from 10 down to 1
    let mode = (1..=10u8)
        .rev()
        .max_by_key(|r| distribution[usize::from(r - 1)])
        .unwrap_or(1);

    let bucket = acc.finish((), 1);
    Ok(OverallStats {
        count: bucket.count,
        mean: bucket.mean_rating,
        std_dev: bucket.rating_std_dev,
        mode,
        distribution,
        content_types,
        high_share: bucket.high_rating_share,
        low_share,
        generous_share,
        first_rated,
        last_rated,
    })
}

fn share_of(records: &[RatingRecord], pred: impl Fn(u8) -> bool) -> f64 {
    records.iter().filter(|r| pred(r.user_rating)).count() as f64 / records.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EraConfig;
    use crate::model::fixtures::*;
    use crate::segmenter::segment;

    fn config() -> AnalysisConfig {
        AnalysisConfig { reference_year: 2025, ..AnalysisConfig::default() }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn two_years() -> Vec<RatingRecord> {
        let mut records: Vec<_> = [6, 7, 8, 9, 10].iter().map(|&r| rated(2001, r)).collect();
        records.extend([5, 5, 6, 6, 7].iter().map(|&r| rated(2002, r)));
        records
    }

    #[test]
    fn test_per_year_scenario() {
        let records = two_years();
        let by_year = group(&records, &ByRatedYear, &config());

        assert_eq!(by_year.buckets.len(), 2);
        let y1 = by_year.get(&2001).unwrap();
        let y2 = by_year.get(&2002).unwrap();
        assert_eq!((y1.count, y2.count), (5, 5));
        assert!(close(y1.mean_rating, 8.0));
        assert!(close(y2.mean_rating, 5.8));

        let overall = summarize(&records, &config()).unwrap();
        assert_eq!(overall.count, 10);
        assert!(close(overall.mean, 6.9));
    }

    #[test]
    fn test_single_valued_counts_sum_to_total() {
        let mut records = two_years();
        records.push(with_genres(rated(2003, 4), &["Drama", "Action"]));
        let cfg = config();
        let segmentation = segment(&records, &cfg.eras);

        assert_eq!(group(&records, &ByRatedYear, &cfg).total_count(), records.len());
        assert_eq!(group(&records, &ByEra(&segmentation), &cfg).total_count(), records.len());
        assert_eq!(group(&records, &ByReleaseDecade, &cfg).total_count(), records.len());
        assert_eq!(group(&records, &ByRuntime(&cfg.runtime_edges), &cfg).total_count(), records.len());
        assert_eq!(group(&records, &ByContentType, &cfg).total_count(), records.len());
        let by_age = ByContentAge { reference_year: cfg.reference_year, edges: &cfg.content_age_edges };
        assert_eq!(group(&records, &by_age, &cfg).total_count(), records.len());
    }

    #[test]
    fn test_multi_valued_fan_out() {
        let records = vec![
            with_genres(rated(2001, 9), &["Drama", "Action"]),
            with_genres(rated(2001, 5), &["Drama"]),
            rated(2001, 7),
        ];
        let contributions = fan_out(&records, &ByGenre);
        assert_eq!(contributions.len(), 4);

        let by_genre = group(&records, &ByGenre, &config());
        assert_eq!(by_genre.contributions, 4);
        assert!(by_genre.total_count() > records.len());

        let action = by_genre.get(&"Action".to_string()).unwrap();
        assert_eq!(action.count, 1);
        assert!(close(action.mean_rating, 9.0));
        let drama = by_genre.get(&"Drama".to_string()).unwrap();
        assert_eq!(drama.count, 2);
        assert!(close(drama.mean_rating, 7.0));
        assert_eq!(by_genre.get(&UNCLASSIFIED_GENRE.to_string()).unwrap().count, 1);
    }

    #[test]
    fn test_multi_valued_equality_iff_single_values() {
        let single = vec![
            with_directors(rated(2001, 8), &["A"]),
            with_directors(rated(2001, 6), &["B"]),
            rated(2001, 7),
        ];
        assert_eq!(group(&single, &ByDirector, &config()).total_count(), single.len());

        let mut multi = single.clone();
        multi.push(with_directors(rated(2002, 9), &["A", "C"]));
        assert!(group(&multi, &ByDirector, &config()).total_count() > multi.len());
    }

    #[test]
    fn test_low_confidence_flagged_not_dropped() {
        let records = vec![
            with_directors(rated(2001, 10), &["Solo"]),
            with_directors(rated(2001, 6), &["Busy"]),
            with_directors(rated(2002, 7), &["Busy"]),
            with_directors(rated(2003, 8), &["Busy"]),
        ];
        let by_director = group(&records, &ByDirector, &config());
        assert_eq!(by_director.buckets.len(), 2);
        assert!(by_director.get(&"Solo".to_string()).unwrap().low_confidence);
        assert!(!by_director.get(&"Busy".to_string()).unwrap().low_confidence);

        let top = by_director.top_by_mean(5, &[]).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].key, "Busy");
    }

    #[test]
    fn test_top_by_mean_without_confident_buckets() {
        let records = vec![with_directors(rated(2001, 10), &["Solo"])];
        let by_director = group(&records, &ByDirector, &config());
        let err = by_director.top_by_mean(3, &[]).unwrap_err();
        assert!(matches!(
            err,
            StatisticError::InsufficientData { statistic: "top by mean rating", observations: 1, required: 3, .. }
        ));
        assert_eq!(err.to_string(), "top by mean rating [director]: 1 observation(s), at least 3 required");

        let empty = group(&[], &ByDirector, &config());
        assert!(matches!(
            empty.top_by_mean(3, &[]),
            Err(StatisticError::InsufficientData { observations: 0, required: 3, .. })
        ));
    }

    #[test]
    fn test_top_by_mean_ignores_excluded_sample_sizes() {
        let mut records: Vec<_> = (0..5).map(|_| rated(2001, 9)).collect();
        records.extend((0..2).map(|_| with_directors(rated(2001, 7), &["Pair"])));
        let by_director = group(&records, &ByDirector, &config());
        let err = by_director.top_by_mean(3, &[UNATTRIBUTED_DIRECTOR.to_string()]).unwrap_err();
        assert!(matches!(err, StatisticError::InsufficientData { observations: 2, required: 3, .. }));
    }

    #[test]
    fn test_latest_rated_per_bucket() {
        let mut late = with_directors(rated(2001, 7), &["Ann"]);
        late.rated_at = NaiveDate::from_ymd_opt(2003, 6, 30).unwrap();
        let records = vec![with_directors(rated(2002, 9), &["Ann"]), late, with_directors(rated(2001, 5), &["Bo"])];
        let by_director = group(&records, &ByDirector, &config());
        assert_eq!(
            by_director.get(&"Ann".to_string()).unwrap().latest_rated,
            NaiveDate::from_ymd_opt(2003, 6, 30)
        );
        assert_eq!(by_director.get(&"Bo".to_string()).unwrap().latest_rated, NaiveDate::from_ymd_opt(2001, 1, 1));
    }

    #[test]
    fn test_content_age_at_extreme_years() {
        let mut ancient = rated(2001, 7);
        ancient.release_year = i32::MIN;
        assert_eq!(content_age(i32::MAX, &ancient), u32::MAX);
        let mut future = rated(2001, 7);
        future.release_year = i32::MAX;
        assert_eq!(content_age(i32::MIN, &future), 0);

        ancient.release_year = -2_147_483_000;
        let cfg = config();
        let by_age = ByContentAge { reference_year: cfg.reference_year, edges: &cfg.content_age_edges };
        let grouping = group(&[ancient], &by_age, &cfg);
        assert_eq!(grouping.buckets[0].key.to_string(), "51+");
    }

    #[test]
    fn test_ranking_tie_breaks() {
        let records = vec![
            with_directors(rated(2001, 8), &["Zed"]),
            with_directors(rated(2001, 8), &["Zed"]),
            with_directors(rated(2001, 8), &["Amy"]),
            with_directors(rated(2001, 8), &["Bob"]),
            with_directors(rated(2001, 9), &["Cat"]),
        ];
        let by_director = group(&records, &ByDirector, &config());
        let keys: Vec<_> = by_director.rank_by_mean().iter().map(|b| b.key.clone()).collect();
        assert_eq!(keys, vec!["Cat", "Zed", "Amy", "Bob"]);

        let keys: Vec<_> = by_director.rank_by_count().iter().map(|b| b.key.clone()).collect();
        assert_eq!(keys, vec!["Zed", "Amy", "Bob", "Cat"]);
    }

    #[test]
    fn test_reference_mean_only_over_present_values() {
        let records = vec![
            with_reference(rated(2001, 8), 7.0),
            with_reference(rated(2001, 6), 8.0),
            rated(2001, 4),
        ];
        let by_year = group(&records, &ByRatedYear, &config());
        let bucket = by_year.get(&2001).unwrap();
        assert_eq!(bucket.reference_count, 2);
        assert!(close(bucket.mean_reference.unwrap(), 7.5));
        assert!(close(bucket.rating_std_dev.unwrap(), 2.0));

        let none = group(&[rated(2001, 8)], &ByRatedYear, &config());
        assert_eq!(none.buckets[0].mean_reference, None);
        assert_eq!(none.buckets[0].rating_std_dev, None);
    }

    #[test]
    fn test_band_rules() {
        let cfg = config();
        let mut long = rated(2001, 8);
        long.runtime_minutes = Some(170);
        let mut old = rated(2001, 6);
        old.release_year = 1960;
        old.runtime_minutes = Some(95);
        let records = vec![long, old, rated(2030, 7)];

        let by_runtime = group(&records, &ByRuntime(&cfg.runtime_edges), &cfg);
        let keys: Vec<_> = by_runtime.buckets.iter().map(|b| b.key.to_string()).collect();
        assert_eq!(keys, vec!["90-119", "150+", "unknown"]);

        let by_age = ByContentAge { reference_year: 2025, edges: &cfg.content_age_edges };
        let grouping = group(&records, &by_age, &cfg);
        let keys: Vec<_> = grouping.buckets.iter().map(|b| b.key.to_string()).collect();
        // 2030 release clamps to age 0
        assert_eq!(keys, vec!["0-5", "16-30", "51+"]);
    }

    #[test]
    fn test_era_grouping() {
        let records: Vec<_> = (1..=12).map(|n| rated(2000 + n, 5 + (n % 5) as u8)).collect();
        let cfg = AnalysisConfig {
            eras: EraConfig { consumption_years: 3, maturation_years: 6, anchor_year: None },
            ..config()
        };
        let segmentation = segment(&records, &cfg.eras);
        let by_era = group(&records, &ByEra(&segmentation), &cfg);
        let counts: Vec<_> = by_era.buckets.iter().map(|b| (b.key, b.count)).collect();
        assert_eq!(
            counts,
            vec![(Era::Consumption, 3), (Era::Maturation, 6), (Era::Selective, 3)]
        );
    }

    #[test]
    fn test_summarize_shares_and_mode() {
        let records: Vec<_> = [9, 9, 8, 8, 5, 3, 7, 10].iter().map(|&r| rated(2001, r)).collect();
        let overall = summarize(&records, &config()).unwrap();
        assert_eq!(overall.mode, 8);
        assert_eq!(overall.distribution[8], 2);
        assert!(close(overall.high_share, 5.0 / 8.0));
        assert!(close(overall.low_share, 2.0 / 8.0));
        assert!(close(overall.generous_share, 6.0 / 8.0));
        assert_eq!(overall.content_types[&ContentType::Movie], 8);
    }

    #[test]
    fn test_summarize_empty() {
        let err = summarize(&[], &config()).unwrap_err();
        assert_eq!(err, StatisticError::insufficient("overall statistics", 0, 1));
    }
}
