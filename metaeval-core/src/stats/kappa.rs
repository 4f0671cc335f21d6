//! Cohen's kappa over values treated as unordered classes

use std::collections::BTreeMap;

/// Cohen's kappa between two raters.
///
/// Values are classes, so graded scores take part by their numeric value.
/// Identical sequences score 1 even when constant. Empty or mismatched input
/// and non-integral (continuous) values have no kappa and give `NaN`.
pub fn cohen_kappa(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return f64::NAN;
    }
    if a == b {
        return 1.0;
    }
    if a.iter().chain(b).any(|v| !v.is_finite() || v.fract() != 0.0) {
        return f64::NAN;
    }

    let n = a.len() as f64;
    let mut marginals: BTreeMap<i64, (f64, f64)> = BTreeMap::new();
    let mut agreements = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        marginals.entry(x as i64).or_default().0 += 1.0;
        marginals.entry(y as i64).or_default().1 += 1.0;
        if x == y {
            agreements += 1.0;
        }
    }

    let observed = agreements / n;
    let expected: f64 = marginals.values().map(|(ca, cb)| (ca / n) * (cb / n)).sum();
    if expected >= 1.0 {
        return f64::NAN;
    }
    (observed - expected) / (1.0 - expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kappa_reference() {
        let human = [0.0, 1.0, 1.0, 0.0, 1.0];
        let model = [0.0, 1.0, 0.0, 0.0, 1.0];
        let k = cohen_kappa(&human, &model);
        assert!((k - 0.6153846153846154).abs() < 1e-12);
    }

    #[test]
    fn test_identical_constant_sequences() {
        assert_eq!(cohen_kappa(&[2.0, 2.0, 2.0], &[2.0, 2.0, 2.0]), 1.0);
        // continuous values still short-circuit when identical
        assert_eq!(cohen_kappa(&[0.25, 0.5], &[0.25, 0.5]), 1.0);
    }

    #[test]
    fn test_disjoint_constants_is_zero() {
        assert_eq!(cohen_kappa(&[1.0, 1.0], &[2.0, 2.0]), 0.0);
    }

    #[test]
    fn test_continuous_values_have_no_kappa() {
        assert!(cohen_kappa(&[3.5, 4.0], &[3.0, 4.0]).is_nan());
        assert!(cohen_kappa(&[], &[]).is_nan());
        assert!(cohen_kappa(&[1.0], &[1.0, 2.0]).is_nan());
    }

    #[test]
    fn test_systematic_disagreement_is_negative() {
        let k = cohen_kappa(&[0.0, 1.0, 0.0, 1.0], &[1.0, 0.0, 1.0, 0.0]);
        assert!((k + 1.0).abs() < 1e-12);
    }
}
