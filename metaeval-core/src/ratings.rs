//! Sparse human rating matrix
//!
//! Rater counts vary per instance, so ratings are kept as
//! rater index -> (instance index -> value). A missing cell means the rater
//! did not rate that instance; it is never read as zero.

use std::collections::BTreeMap;

/// Individual human ratings, already encoded to numbers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatingMatrix {
    raters: BTreeMap<usize, BTreeMap<usize, f64>>,
    instances: usize,
}

impl RatingMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from rater rows, `None` marking an absent rating.
    pub fn from_rows(rows: &[Vec<Option<f64>>]) -> Self {
        let mut matrix = Self::new();
        for (rater, row) in rows.iter().enumerate() {
            for (instance, value) in row.iter().enumerate() {
                matrix.instances = matrix.instances.max(instance + 1);
                if let Some(v) = value {
                    matrix.insert(rater, instance, *v);
                }
            }
        }
        matrix
    }

    /// Append the next instance; the i-th rating is attributed to rater i.
    ///
    /// An instance with no ratings still occupies a column, so per-instance
    /// counts stay aligned with the evaluated sequence. Returns its index.
    pub fn push_instance<I>(&mut self, ratings: I) -> usize
    where
        I: IntoIterator<Item = f64>,
    {
        let instance = self.instances;
        self.instances += 1;
        for (rater, value) in ratings.into_iter().enumerate() {
            self.insert(rater, instance, value);
        }
        instance
    }

    /// Set a single cell. NaN is treated as absent.
    pub fn insert(&mut self, rater: usize, instance: usize, value: f64) {
        self.instances = self.instances.max(instance + 1);
        if value.is_nan() {
            return;
        }
        self.raters.entry(rater).or_default().insert(instance, value);
    }

    pub fn get(&self, rater: usize, instance: usize) -> Option<f64> {
        self.raters.get(&rater)?.get(&instance).copied()
    }

    /// Number of instance columns, including ones nobody rated.
    pub fn instance_count(&self) -> usize {
        self.instances
    }

    /// Number of raters with at least one rating.
    pub fn rater_count(&self) -> usize {
        self.raters.values().filter(|row| !row.is_empty()).count()
    }

    /// Ratings attached to one instance, in rater order.
    pub fn ratings_for(&self, instance: usize) -> Vec<f64> {
        self.raters
            .values()
            .filter_map(|row| row.get(&instance).copied())
            .collect()
    }

    /// Number of ratings per instance column.
    pub fn counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.instances];
        for row in self.raters.values() {
            for &instance in row.keys() {
                counts[instance] += 1;
            }
        }
        counts
    }

    /// Rating groups for every instance that received at least one rating.
    pub fn units(&self) -> Vec<Vec<f64>> {
        let mut units = vec![Vec::new(); self.instances];
        for row in self.raters.values() {
            for (&instance, &value) in row {
                units[instance].push(value);
            }
        }
        units.retain(|u| !u.is_empty());
        units
    }

    /// True when some instance carries a number of ratings other than `panel`.
    pub fn is_uneven(&self, panel: usize) -> bool {
        self.counts().iter().any(|&c| c != panel)
    }

    /// True when some rated instance has fewer than two ratings.
    pub fn has_single_rated_instance(&self) -> bool {
        self.counts().iter().any(|&c| c == 1)
    }

    /// True when every recorded rating has the same value.
    pub fn all_identical(&self) -> bool {
        let mut values = self.raters.values().flat_map(|row| row.values());
        match values.next() {
            Some(first) => values.all(|v| v == first),
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.raters.values().all(|row| row.is_empty())
    }
}
