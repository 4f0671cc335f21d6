//! Pearson, Spearman and Kendall correlation with two-sided p-values
//!
//! Infeasible inputs (fewer than two pairs, constant series, non-finite
//! values) produce [`Correlation::NAN`] instead of an error.

use serde::{Deserialize, Serialize};

use super::special::{normal_two_tailed, t_two_tailed};

/// Largest sample for which Kendall's exact null distribution is used.
const KENDALL_EXACT_MAX_N: usize = 33;

/// A correlation coefficient and its two-sided p-value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub coefficient: f64,
    pub p_value: f64,
}

impl Correlation {
    pub const NAN: Correlation = Correlation {
        coefficient: f64::NAN,
        p_value: f64::NAN,
    };

    pub fn new(coefficient: f64, p_value: f64) -> Self {
        Self {
            coefficient,
            p_value,
        }
    }

    pub fn is_defined(&self) -> bool {
        !self.coefficient.is_nan()
    }
}

fn usable(x: &[f64], y: &[f64]) -> bool {
    x.len() == y.len()
        && x.len() >= 2
        && x.iter().chain(y).all(|v| v.is_finite())
        && !is_constant(x)
        && !is_constant(y)
}

fn is_constant(values: &[f64]) -> bool {
    values.iter().all(|v| *v == values[0])
}

/// Pearson product-moment correlation.
pub fn pearson(x: &[f64], y: &[f64]) -> Correlation {
    if !usable(x, y) {
        return Correlation::NAN;
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    Correlation::new(r, pearson_p_value(r, x.len()))
}

/// p-value for a product-moment coefficient from `n` pairs (t with n-2 df).
fn pearson_p_value(r: f64, n: usize) -> f64 {
    if n <= 2 {
        return 1.0;
    }
    if r.abs() >= 1.0 {
        return 0.0;
    }
    let df = (n - 2) as f64;
    let t = r * (df / ((1.0 - r) * (1.0 + r))).sqrt();
    t_two_tailed(t, df)
}

/// Spearman rank correlation: Pearson over average ranks.
pub fn spearman(x: &[f64], y: &[f64]) -> Correlation {
    if !usable(x, y) {
        return Correlation::NAN;
    }
    pearson(&rank(x), &rank(y))
}

/// 1-based ranks; tied values share the mean of the ranks they span.
pub fn rank(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let shared = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = shared;
        }
        i = j + 1;
    }
    ranks
}

/// Kendall's tau-b.
///
/// Untied samples of up to 33 pairs get the exact permutation p-value,
/// everything else the tie-corrected normal approximation.
pub fn kendall(x: &[f64], y: &[f64]) -> Correlation {
    if !usable(x, y) {
        return Correlation::NAN;
    }

    let n = x.len();
    let mut concordant: u64 = 0;
    let mut discordant: u64 = 0;
    for i in 0..n {
        for j in (i + 1)..n {
            let s = (x[i] - x[j]) * (y[i] - y[j]);
            if s > 0.0 {
                concordant += 1;
            } else if s < 0.0 {
                discordant += 1;
            }
        }
    }

    let x_ties = tie_groups(x);
    let y_ties = tie_groups(y);

    let total = (n * (n - 1) / 2) as f64;
    let x_tied_pairs: f64 = x_ties.iter().map(|&t| t * (t - 1.0) / 2.0).sum();
    let y_tied_pairs: f64 = y_ties.iter().map(|&t| t * (t - 1.0) / 2.0).sum();

    let denom = ((total - x_tied_pairs) * (total - y_tied_pairs)).sqrt();
    if denom == 0.0 {
        return Correlation::NAN;
    }
    let s = concordant as f64 - discordant as f64;
    let tau = (s / denom).clamp(-1.0, 1.0);

    let untied = x_ties.is_empty() && y_ties.is_empty();
    let c = discordant.min(concordant);
    let p_value = if untied && (n <= KENDALL_EXACT_MAX_N || c <= 1) {
        kendall_exact_p(n, c)
    } else {
        kendall_asymptotic_p(s, n as f64, &x_ties, &y_ties)
    };

    Correlation::new(tau, p_value)
}

/// Sizes of groups of equal values (only groups larger than one).
fn tie_groups(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut groups = Vec::new();
    let mut run = 1usize;
    for w in sorted.windows(2) {
        if w[0] == w[1] {
            run += 1;
        } else {
            if run > 1 {
                groups.push(run as f64);
            }
            run = 1;
        }
    }
    if run > 1 {
        groups.push(run as f64);
    }
    groups
}

/// Exact two-sided p-value given the smaller of the discordant and
/// concordant pair counts, from the distribution of inversion counts.
fn kendall_exact_p(n: usize, c: u64) -> f64 {
    if c == 0 {
        return (2.0 / factorial(n)).min(1.0);
    }
    if c == 1 {
        return (2.0 / factorial(n - 1)).min(1.0);
    }

    let c = c as usize;
    // dist[k] = P(permutation of size m has k inversions)
    let mut dist = vec![1.0_f64];
    for m in 2..=n {
        let mut next = vec![0.0; dist.len() + m - 1];
        let w = 1.0 / m as f64;
        for (k, &p) in dist.iter().enumerate() {
            if p == 0.0 {
                continue;
            }
            for slot in &mut next[k..k + m] {
                *slot += p * w;
            }
        }
        dist = next;
    }

    let tail: f64 = dist.iter().take(c + 1).sum();
    (2.0 * tail).min(1.0)
}

fn factorial(n: usize) -> f64 {
    (1..=n).fold(1.0, |acc, k| acc * k as f64)
}

/// Normal approximation with the tie-corrected variance of S.
fn kendall_asymptotic_p(s: f64, n: f64, x_ties: &[f64], y_ties: &[f64]) -> f64 {
    let v0 = n * (n - 1.0) * (2.0 * n + 5.0);
    let vt: f64 = x_ties.iter().map(|t| t * (t - 1.0) * (2.0 * t + 5.0)).sum();
    let vu: f64 = y_ties.iter().map(|t| t * (t - 1.0) * (2.0 * t + 5.0)).sum();

    let t1: f64 = x_ties.iter().map(|t| t * (t - 1.0)).sum();
    let u1: f64 = y_ties.iter().map(|t| t * (t - 1.0)).sum();
    let v1 = t1 * u1 / (2.0 * n * (n - 1.0));

    let v2 = if n > 2.0 {
        let t2: f64 = x_ties.iter().map(|t| t * (t - 1.0) * (t - 2.0)).sum();
        let u2: f64 = y_ties.iter().map(|t| t * (t - 1.0) * (t - 2.0)).sum();
        t2 * u2 / (9.0 * n * (n - 1.0) * (n - 2.0))
    } else {
        0.0
    };

    let var = (v0 - vt - vu) / 18.0 + v1 + v2;
    if var <= 0.0 {
        return f64::NAN;
    }
    normal_two_tailed(s / var.sqrt())
}
