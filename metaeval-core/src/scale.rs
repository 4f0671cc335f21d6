//! Measurement scales and the values that live on them

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// Scale kind
// =============================================================================

/// The three measurement scales a metric can be declared on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleKind {
    Categorical,
    Graded,
    Continuous,
}

impl ScaleKind {
    pub fn all() -> Vec<ScaleKind> {
        vec![ScaleKind::Categorical, ScaleKind::Graded, ScaleKind::Continuous]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleKind::Categorical => "categorical",
            ScaleKind::Graded => "graded",
            ScaleKind::Continuous => "continuous",
        }
    }

    /// Krippendorff measurement level used for inter-rater reliability.
    pub fn measurement_level(&self) -> MeasurementLevel {
        match self {
            ScaleKind::Categorical => MeasurementLevel::Nominal,
            ScaleKind::Graded => MeasurementLevel::Ordinal,
            ScaleKind::Continuous => MeasurementLevel::Interval,
        }
    }
}

impl fmt::Display for ScaleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ScaleKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "categorical" => Ok(ScaleKind::Categorical),
            "graded" => Ok(ScaleKind::Graded),
            "continuous" => Ok(ScaleKind::Continuous),
            other => Err(format!("unknown scale kind: {}", other)),
        }
    }
}

/// Level of measurement for Krippendorff's alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementLevel {
    Nominal,
    Ordinal,
    Interval,
}

// =============================================================================
// Labels
// =============================================================================

/// Ordered, case-insensitive label set of a categorical metric.
///
/// A label's position in the declared list is its integer encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSet {
    labels: Vec<String>,
    folded: Vec<String>,
}

impl LabelSet {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        let folded = labels.iter().map(|l| fold(l)).collect();
        Self { labels, folded }
    }

    /// Labels as declared.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Trimmed, lower-cased labels in declared order.
    pub fn folded(&self) -> &[String] {
        &self.folded
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Position of `label` in the declared list, ignoring case.
    pub fn encode(&self, label: &str) -> Result<usize> {
        let needle = fold(label);
        self.folded
            .iter()
            .position(|l| *l == needle)
            .ok_or_else(|| Error::UnknownLabel {
                label: label.to_string(),
                expected: self.labels.clone(),
            })
    }

    pub fn decode(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    fn first_duplicate(&self) -> Option<&str> {
        self.folded
            .iter()
            .enumerate()
            .find(|&(i, l)| self.folded[..i].contains(l))
            .map(|(i, _)| self.labels[i].as_str())
    }
}

fn fold(label: &str) -> String {
    label.trim().to_lowercase()
}

// =============================================================================
// Scale
// =============================================================================

/// A metric's scale together with its bounds.
#[derive(Debug, Clone, PartialEq)]
pub enum Scale {
    Categorical(LabelSet),
    Graded { worst: i64, best: i64 },
    Continuous { worst: f64, best: f64 },
}

impl Scale {
    pub fn categorical<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Scale::Categorical(LabelSet::new(labels))
    }

    pub fn graded(worst: i64, best: i64) -> Self {
        Scale::Graded { worst, best }
    }

    pub fn continuous(worst: f64, best: f64) -> Self {
        Scale::Continuous { worst, best }
    }

    pub fn kind(&self) -> ScaleKind {
        match self {
            Scale::Categorical(_) => ScaleKind::Categorical,
            Scale::Graded { .. } => ScaleKind::Graded,
            Scale::Continuous { .. } => ScaleKind::Continuous,
        }
    }

    /// Numeric bounds as `(low, high)`, whichever of worst/best is smaller first.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match *self {
            Scale::Categorical(_) => None,
            Scale::Graded { worst, best } => {
                Some((worst.min(best) as f64, worst.max(best) as f64))
            }
            Scale::Continuous { worst, best } => Some((worst.min(best), worst.max(best))),
        }
    }

    pub fn labels(&self) -> Option<&LabelSet> {
        match self {
            Scale::Categorical(labels) => Some(labels),
            _ => None,
        }
    }

    /// Whether `value` lies within the numeric bounds (inclusive).
    pub fn contains(&self, value: f64) -> bool {
        match self.bounds() {
            Some((lo, hi)) => value >= lo && value <= hi,
            None => false,
        }
    }

    /// Reject definitions no extraction or statistic can work with.
    pub fn validate(&self, metric: &str) -> Result<()> {
        let invalid = |reason: String| Error::InvalidScale {
            metric: metric.to_string(),
            reason,
        };
        match self {
            Scale::Categorical(labels) => {
                if labels.is_empty() {
                    return Err(invalid("empty label list".to_string()));
                }
                if labels.folded().iter().any(|l| l.is_empty()) {
                    return Err(invalid("blank label".to_string()));
                }
                if let Some(dup) = labels.first_duplicate() {
                    return Err(invalid(format!("duplicate label '{}'", dup)));
                }
            }
            Scale::Graded { .. } => {}
            Scale::Continuous { worst, best } => {
                if !worst.is_finite() || !best.is_finite() {
                    return Err(invalid("non-finite bounds".to_string()));
                }
            }
        }
        Ok(())
    }

    /// Encode a human summary value, enforcing the scale bounds.
    pub fn encode(&self, value: &ScaleValue) -> Result<f64> {
        let encoded = self.encode_rating(value)?;
        if let Some((lo, hi)) = self.bounds() {
            if !self.contains(encoded) {
                return Err(Error::OutOfBounds { value: encoded, lo, hi });
            }
        }
        Ok(encoded)
    }

    /// Encode an individual rating. Labels must be known; numbers pass as-is.
    pub fn encode_rating(&self, value: &ScaleValue) -> Result<f64> {
        match (self, value) {
            (Scale::Categorical(labels), ScaleValue::Label(label)) => {
                Ok(labels.encode(label)? as f64)
            }
            (Scale::Categorical(_), ScaleValue::Number(n)) => Err(Error::ValueKind {
                expected: "label",
                got: n.to_string(),
            }),
            (_, ScaleValue::Number(n)) => Ok(*n),
            (_, ScaleValue::Label(label)) => label
                .trim()
                .parse::<f64>()
                .map_err(|_| Error::ValueKind {
                    expected: "number",
                    got: label.clone(),
                }),
        }
    }

    /// Inverse of [`Scale::encode`] for categorical scales; numbers pass through.
    pub fn decode(&self, encoded: f64) -> Option<ScaleValue> {
        match self {
            Scale::Categorical(labels) => {
                if encoded < 0.0 || encoded.fract() != 0.0 {
                    return None;
                }
                labels
                    .decode(encoded as usize)
                    .map(|l| ScaleValue::Label(l.to_string()))
            }
            _ => Some(ScaleValue::Number(encoded)),
        }
    }
}

// =============================================================================
// Values
// =============================================================================

/// A value on some scale: a label or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScaleValue {
    Number(f64),
    Label(String),
}

impl ScaleValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ScaleValue::Number(n) => Some(*n),
            ScaleValue::Label(_) => None,
        }
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            ScaleValue::Label(l) => Some(l),
            ScaleValue::Number(_) => None,
        }
    }
}

impl fmt::Display for ScaleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleValue::Number(n) => write!(f, "{}", n),
            ScaleValue::Label(l) => write!(f, "{}", l),
        }
    }
}

impl From<f64> for ScaleValue {
    fn from(n: f64) -> Self {
        ScaleValue::Number(n)
    }
}

impl From<&str> for ScaleValue {
    fn from(s: &str) -> Self {
        ScaleValue::Label(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_encoding_ignores_case() {
        let labels = LabelSet::new(["Yes", "No"]);
        assert_eq!(labels.encode("yes").unwrap(), 0);
        assert_eq!(labels.encode(" NO ").unwrap(), 1);
        assert!(matches!(labels.encode("maybe"), Err(Error::UnknownLabel { .. })));
        assert_eq!(labels.decode(1), Some("No"));
        assert_eq!(labels.decode(2), None);
    }

    #[test]
    fn test_encode_enforces_bounds() {
        let scale = Scale::graded(1, 5);
        assert_eq!(scale.encode(&ScaleValue::Number(3.5)).unwrap(), 3.5);
        assert!(matches!(
            scale.encode(&ScaleValue::Number(6.0)),
            Err(Error::OutOfBounds { .. })
        ));
        // individual ratings are not bounds-checked
        assert_eq!(scale.encode_rating(&ScaleValue::Number(6.0)).unwrap(), 6.0);
    }

    #[test]
    fn test_reversed_bounds() {
        let scale = Scale::graded(5, 1);
        assert_eq!(scale.bounds(), Some((1.0, 5.0)));
        assert!(scale.contains(1.0));
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let scale = Scale::categorical(["yes", "YES"]);
        assert!(matches!(scale.validate("m"), Err(Error::InvalidScale { .. })));
        assert!(Scale::categorical(Vec::<String>::new()).validate("m").is_err());
        assert!(Scale::categorical(["a", "b"]).validate("m").is_ok());
    }

    #[test]
    fn test_categorical_decode_roundtrip() {
        let scale = Scale::categorical(["Good", "Bad"]);
        let encoded = scale.encode(&ScaleValue::from("BAD")).unwrap();
        assert_eq!(scale.decode(encoded), Some(ScaleValue::from("Bad")));
        assert_eq!(scale.decode(0.5), None);
    }

    #[test]
    fn test_scale_value_untagged() {
        let v: Vec<ScaleValue> = serde_json::from_str(r#"[1, 2.5, "yes"]"#).unwrap();
        assert_eq!(v[0], ScaleValue::Number(1.0));
        assert_eq!(v[1], ScaleValue::Number(2.5));
        assert_eq!(v[2], ScaleValue::Label("yes".to_string()));
    }
}
