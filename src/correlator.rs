// src/correlator.rs

use crate::error::StatisticError;
use crate::model::RatingRecord;
use serde::Serialize;
use tracing::debug;

pub const MIN_PAIRS: usize = 2;

const STATISTIC: &str = "rating correlation";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Correlation {
    /// Pearson coefficient in -1.0..=1.0
    pub coefficient: f64,
    /// Number of (user, reference) pairs the coefficient was computed from
    pub observations: usize,
    /// Mean of user rating minus reference rating over the same pairs
    pub mean_offset: f64,
}

/// Pairs of (user rating, reference rating) for records that have both
pub fn rating_pairs(records: &[RatingRecord]) -> Vec<(f64, f64)> {
    records
        .iter()
        .filter_map(|r| r.reference_rating.map(|reference| (f64::from(r.user_rating), reference)))
        .collect()
}

pub fn correlate(records: &[RatingRecord]) -> Result<Correlation, StatisticError> {
    let pairs = rating_pairs(records);
    debug!("Correlating {} of {} records", pairs.len(), records.len());
    pearson(&pairs)
}

pub fn pearson(pairs: &[(f64, f64)]) -> Result<Correlation, StatisticError> {
    let observations = pairs.len();
    if observations < MIN_PAIRS {
        return Err(StatisticError::insufficient(STATISTIC, observations, MIN_PAIRS));
    }

    let n = observations as f64;
    let mean_x = pairs.iter().map(|&(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|&(_, y)| y).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for &(x, y) in pairs {
        let (dx, dy) = (x - mean_x, y - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    for (axis, variance) in [("user", var_x), ("reference", var_y)] {
        if variance <= f64::EPSILON {
            return Err(StatisticError::ZeroVariance { statistic: STATISTIC, axis, observations });
        }
    }

    let coefficient = (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0);
    Ok(Correlation { coefficient, observations, mean_offset: mean_x - mean_y })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::*;

    fn sample() -> Vec<RatingRecord> {
        vec![
            with_reference(rated(2001, 9), 8.4),
            with_reference(rated(2001, 6), 6.1),
            with_reference(rated(2002, 8), 7.9),
            with_reference(rated(2002, 4), 5.5),
            with_reference(rated(2003, 7), 7.6),
            rated(2003, 10),
        ]
    }

    #[test]
    fn test_uses_only_paired_records() {
        let correlation = correlate(&sample()).unwrap();
        assert_eq!(correlation.observations, 5);
        assert!(correlation.coefficient > 0.9 && correlation.coefficient <= 1.0);
    }

    #[test]
    fn test_scale_invariance() {
        let records = sample();
        let base = correlate(&records).unwrap();

        let doubled: Vec<_> = records
            .iter()
            .cloned()
            .map(|mut r| {
                r.reference_rating = r.reference_rating.map(|v| v * 2.0);
                r
            })
            .collect();
        let scaled = correlate(&doubled).unwrap();
        assert!((base.coefficient - scaled.coefficient).abs() < 1e-9);

        let shifted: Vec<_> = rating_pairs(&records).iter().map(|&(x, y)| (x * 3.0 + 1.0, y)).collect();
        let affine = pearson(&shifted).unwrap();
        assert!((base.coefficient - affine.coefficient).abs() < 1e-9);
    }

    #[test]
    fn test_insufficient_below_two() {
        assert_eq!(
            pearson(&[]).unwrap_err(),
            StatisticError::insufficient(STATISTIC, 0, 2)
        );
        assert_eq!(
            pearson(&[(7.0, 7.5)]).unwrap_err(),
            StatisticError::insufficient(STATISTIC, 1, 2)
        );
        assert!(correlate(&[rated(2001, 5), rated(2001, 6)]).is_err());
    }

    #[test]
    fn test_exactly_two_pairs() {
        let correlation = pearson(&[(5.0, 6.0), (8.0, 7.0)]).unwrap();
        assert_eq!(correlation.observations, 2);
        assert!((correlation.coefficient - 1.0).abs() < 1e-12);

        let inverse = pearson(&[(5.0, 7.0), (8.0, 6.0)]).unwrap();
        assert!((inverse.coefficient + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_variance() {
        let err = pearson(&[(7.0, 6.0), (7.0, 8.0), (7.0, 9.0)]).unwrap_err();
        assert!(matches!(err, StatisticError::ZeroVariance { axis: "user", observations: 3, .. }));
    }

    #[test]
    fn test_mean_offset() {
        let correlation = pearson(&[(8.0, 7.0), (6.0, 6.0)]).unwrap();
        assert!((correlation.mean_offset - 0.5).abs() < 1e-12);
    }
}
