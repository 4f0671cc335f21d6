//! Krippendorff's alpha for nominal, ordinal and interval data
//!
//! Reliability is computed from the coincidence matrix of pairable values:
//!
//! ```text
//! alpha = 1 - (n - 1) * Σ o_ck δ²_ck / Σ n_c n_k δ²_ck
//! ```
//!
//! where `o_ck` counts c-k pairs within a unit weighted by 1/(m_u - 1),
//! `n_c` are the marginals and `δ²` is the level's difference function.

use crate::ratings::RatingMatrix;
use crate::scale::MeasurementLevel;

/// Alpha over the human rating matrix with the degenerate cases resolved.
///
/// In order: fewer than two raters, no rated instance, or any rated instance
/// with a single rating gives `NaN`; identical ratings everywhere give 1;
/// anything else goes through [`alpha`].
pub fn reliability(ratings: &RatingMatrix, level: MeasurementLevel) -> f64 {
    if ratings.rater_count() < 2 || ratings.is_empty() || ratings.has_single_rated_instance() {
        return f64::NAN;
    }
    if ratings.all_identical() {
        return 1.0;
    }
    alpha(&ratings.units(), level)
}

/// Krippendorff's alpha over rating groups, one group per unit.
///
/// Units with fewer than two values are not pairable and are ignored.
/// Returns `NaN` when there is no expected disagreement.
pub fn alpha(units: &[Vec<f64>], level: MeasurementLevel) -> f64 {
    let pairable: Vec<&Vec<f64>> = units
        .iter()
        .filter(|u| u.iter().filter(|v| v.is_finite()).count() >= 2)
        .collect();
    if pairable.is_empty() {
        return f64::NAN;
    }

    let mut domain: Vec<f64> = pairable
        .iter()
        .flat_map(|u| u.iter().copied())
        .filter(|v| v.is_finite())
        .collect();
    domain.sort_by(f64::total_cmp);
    domain.dedup();
    let k = domain.len();

    let index = |v: f64| domain.partition_point(|&d| d < v);

    let mut coincidences = vec![vec![0.0_f64; k]; k];
    for unit in &pairable {
        let values: Vec<usize> = unit
            .iter()
            .filter(|v| v.is_finite())
            .map(|&v| index(v))
            .collect();
        let weight = 1.0 / (values.len() - 1) as f64;
        for (i, &c) in values.iter().enumerate() {
            for (j, &d) in values.iter().enumerate() {
                if i != j {
                    coincidences[c][d] += weight;
                }
            }
        }
    }

    let marginals: Vec<f64> = coincidences.iter().map(|row| row.iter().sum()).collect();
    let n: f64 = marginals.iter().sum();

    let distance = |c: usize, d: usize| -> f64 {
        match level {
            MeasurementLevel::Nominal => {
                if c == d {
                    0.0
                } else {
                    1.0
                }
            }
            MeasurementLevel::Interval => (domain[c] - domain[d]).powi(2),
            MeasurementLevel::Ordinal => {
                let (lo, hi) = if c <= d { (c, d) } else { (d, c) };
                let between: f64 = marginals[lo..=hi].iter().sum();
                (between - (marginals[c] + marginals[d]) / 2.0).powi(2)
            }
        }
    };

    let mut observed = 0.0;
    let mut expected = 0.0;
    for c in 0..k {
        for d in 0..k {
            let delta = distance(c, d);
            observed += coincidences[c][d] * delta;
            expected += marginals[c] * marginals[d] * delta;
        }
    }

    if expected == 0.0 {
        return f64::NAN;
    }
    1.0 - (n - 1.0) * observed / expected
}
