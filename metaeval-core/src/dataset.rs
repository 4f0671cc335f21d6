//! Dataset records: metric definitions and annotated instances
//!
//! The JSON shape is the one shared by every converted dataset:
//!
//! ```json
//! {
//!   "dataset": "summeval",
//!   "annotations": [{"metric": "coherence", "category": "graded", "worst": 1, "best": 5}],
//!   "instances": [{
//!     "id": 0,
//!     "annotations": {"coherence": {
//!       "mean_human": 3.0,
//!       "individual_human_scores": [3, 2, 4],
//!       "gpt-4o": "4"
//!     }}
//!   }]
//! }
//! ```
//!
//! Inside a metric judgement, every key that is not a human summary field is
//! a model identifier mapped to that model's raw response.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::scale::{LabelSet, Scale, ScaleKind, ScaleValue};

fn default_expert() -> String {
    "unknown".to_string()
}

// =============================================================================
// Dataset
// =============================================================================

/// One evaluation dataset with its metric definitions and instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub dataset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_url: Option<String>,
    pub annotations: Vec<MetricDefinition>,
    pub instances: Vec<Instance>,
    /// `"true"`, `"false"` or `"unknown"`.
    #[serde(default = "default_expert")]
    pub expert_annotator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_prompt: Option<Value>,
}

impl Dataset {
    /// Dataset label: the first whitespace-separated token of `dataset`.
    pub fn name(&self) -> &str {
        self.dataset.split_whitespace().next().unwrap_or("")
    }

    pub fn metric(&self, name: &str) -> Result<&MetricDefinition> {
        self.annotations
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| Error::UnknownMetric(name.to_string()))
    }

    /// Every model with at least one response, in first-seen order.
    pub fn models(&self) -> Vec<String> {
        let mut models = IndexSet::new();
        for instance in &self.instances {
            for judgement in instance.annotations.values() {
                models.extend(judgement.responses.keys().cloned());
            }
        }
        models.into_iter().collect()
    }

    /// Check metric definitions: valid scales and unique names.
    pub fn validate(&self) -> Result<()> {
        let mut seen = IndexSet::new();
        for metric in &self.annotations {
            metric.scale.validate(&metric.name)?;
            if !seen.insert(metric.name.as_str()) {
                return Err(Error::InvalidScale {
                    metric: metric.name.clone(),
                    reason: "metric defined twice".to_string(),
                });
            }
        }
        Ok(())
    }
}

// =============================================================================
// Metric definitions
// =============================================================================

/// A scored metric and its scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMetric", into = "RawMetric")]
pub struct MetricDefinition {
    pub name: String,
    pub scale: Scale,
    pub prompt: Option<String>,
}

impl MetricDefinition {
    pub fn new(name: impl Into<String>, scale: Scale) -> Self {
        Self {
            name: name.into(),
            scale,
            prompt: None,
        }
    }

    pub fn kind(&self) -> ScaleKind {
        self.scale.kind()
    }
}

/// Flat wire form of a metric definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawMetric {
    metric: String,
    category: ScaleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    worst: Option<Bound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    best: Option<Bound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    labels_list: Option<Vec<String>>,
}

/// Scale bound as written by converters: a number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum Bound {
    Number(f64),
    Text(String),
}

impl Bound {
    fn value(&self) -> Option<f64> {
        match self {
            Bound::Number(v) => Some(*v),
            Bound::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl TryFrom<RawMetric> for MetricDefinition {
    type Error = Error;

    fn try_from(raw: RawMetric) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidScale {
            metric: raw.metric.clone(),
            reason: reason.to_string(),
        };
        let bounds = |kind: ScaleKind| -> Result<(f64, f64)> {
            match (&raw.worst, &raw.best) {
                (Some(worst), Some(best)) => worst
                    .value()
                    .zip(best.value())
                    .ok_or_else(|| invalid("worst/best must be numeric")),
                _ => Err(invalid(&format!("{} metric without worst/best", kind))),
            }
        };

        let scale = match raw.category {
            ScaleKind::Categorical => {
                let labels = raw
                    .labels_list
                    .clone()
                    .ok_or_else(|| invalid("categorical metric without labels_list"))?;
                Scale::Categorical(LabelSet::new(labels))
            }
            ScaleKind::Graded => {
                let (worst, best) = bounds(ScaleKind::Graded)?;
                if worst.fract() != 0.0 || best.fract() != 0.0 {
                    return Err(invalid("graded bounds must be integers"));
                }
                Scale::graded(worst as i64, best as i64)
            }
            ScaleKind::Continuous => {
                let (worst, best) = bounds(ScaleKind::Continuous)?;
                Scale::continuous(worst, best)
            }
        };
        scale.validate(&raw.metric)?;

        Ok(Self {
            name: raw.metric,
            scale,
            prompt: raw.prompt,
        })
    }
}

impl From<MetricDefinition> for RawMetric {
    fn from(def: MetricDefinition) -> Self {
        let category = def.scale.kind();
        let (worst, best, labels_list) = match def.scale {
            Scale::Categorical(labels) => (None, None, Some(labels.labels().to_vec())),
            Scale::Graded { worst, best } => (
                Some(Bound::Number(worst as f64)),
                Some(Bound::Number(best as f64)),
                None,
            ),
            Scale::Continuous { worst, best } => (Some(Bound::Number(worst)), Some(Bound::Number(best)), None),
        };
        RawMetric {
            metric: def.name,
            category,
            prompt: def.prompt,
            worst,
            best,
            labels_list,
        }
    }
}

// =============================================================================
// Instances
// =============================================================================

/// Instance identifiers are integers in some datasets and strings in others.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InstanceId {
    Int(i64),
    Str(String),
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceId::Int(i) => write!(f, "{}", i),
            InstanceId::Str(s) => write!(f, "{}", s),
        }
    }
}

/// One scored text with its per-metric judgements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    /// The judged text, or a structured record for multi-part instances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<Value>,
    pub annotations: IndexMap<String, MetricJudgement>,
}

impl Instance {
    pub fn judgement(&self, metric: &str) -> Result<&MetricJudgement> {
        self.annotations
            .get(metric)
            .ok_or_else(|| Error::MissingMetric {
                metric: metric.to_string(),
                instance: self.id.to_string(),
            })
    }
}

/// Human and model judgements of one instance under one metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricJudgement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_human: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub majority_human: Option<ScaleValue>,
    #[serde(default)]
    pub individual_human_scores: Vec<ScaleValue>,
    /// Model identifier -> raw response.
    #[serde(flatten)]
    pub responses: IndexMap<String, Value>,
}

impl MetricJudgement {
    /// The model's raw response, if it answered with text.
    pub fn response(&self, model: &str) -> Option<&str> {
        self.responses.get(model).and_then(Value::as_str)
    }

    /// Majority label for categorical metrics, mean score otherwise.
    pub fn human_summary(&self, kind: ScaleKind) -> Option<ScaleValue> {
        match kind {
            ScaleKind::Categorical => self.majority_human.clone(),
            ScaleKind::Graded | ScaleKind::Continuous => self.mean_human.map(ScaleValue::Number),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "dataset": "toxic_chat (user prompts)",
        "annotations": [
            {"metric": "toxicity", "category": "categorical", "labels_list": ["Yes", "No"]},
            {"metric": "fluency", "category": "graded", "worst": 1, "best": 5}
        ],
        "instances": [
            {"id": "a1", "instance": "hello", "annotations": {
                "toxicity": {"majority_human": "no", "individual_human_scores": ["no", "yes"], "gpt-4o": "No."},
                "fluency": {"mean_human": 4.5, "individual_human_scores": [4, 5], "gpt-4o": "5"}
            }},
            {"id": 7, "annotations": {
                "toxicity": {"majority_human": "Yes", "individual_human_scores": [], "mistralai/Mistral-7B": "yes"}
            }}
        ]
    }"#;

    fn sample() -> Dataset {
        serde_json::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_parse_dataset() {
        let ds = sample();
        assert_eq!(ds.name(), "toxic_chat");
        assert_eq!(ds.expert_annotator, "unknown");
        assert_eq!(ds.instances[0].id, InstanceId::Str("a1".to_string()));
        assert_eq!(ds.instances[1].id, InstanceId::Int(7));
        assert_eq!(ds.models(), vec!["gpt-4o", "mistralai/Mistral-7B"]);
        ds.validate().unwrap();
    }

    #[test]
    fn test_metric_definitions() {
        let ds = sample();
        let tox = ds.metric("toxicity").unwrap();
        assert_eq!(tox.kind(), ScaleKind::Categorical);
        let fluency = ds.metric("fluency").unwrap();
        assert_eq!(fluency.scale, Scale::graded(1, 5));
        assert!(matches!(ds.metric("bleu"), Err(Error::UnknownMetric(_))));
    }

    #[test]
    fn test_judgement_fields() {
        let ds = sample();
        let j = ds.instances[0].judgement("fluency").unwrap();
        assert_eq!(j.response("gpt-4o"), Some("5"));
        assert_eq!(j.response("claude"), None);
        assert_eq!(j.human_summary(ScaleKind::Graded), Some(ScaleValue::Number(4.5)));
        assert_eq!(j.individual_human_scores.len(), 2);

        let j = ds.instances[0].judgement("toxicity").unwrap();
        assert_eq!(j.human_summary(ScaleKind::Categorical), Some(ScaleValue::from("no")));
        assert!(!j.responses.contains_key("majority_human"));
    }

    #[test]
    fn test_missing_metric_is_structural() {
        let ds = sample();
        let err = ds.instances[1].judgement("fluency").unwrap_err();
        assert_eq!(
            err,
            Error::MissingMetric {
                metric: "fluency".to_string(),
                instance: "7".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_definitions_fail_to_load() {
        let fractional = r#"{"metric": "m", "category": "graded", "worst": 0.5, "best": 5}"#;
        assert!(serde_json::from_str::<MetricDefinition>(fractional).is_err());

        let no_labels = r#"{"metric": "m", "category": "categorical"}"#;
        assert!(serde_json::from_str::<MetricDefinition>(no_labels).is_err());

        let unknown_kind = r#"{"metric": "m", "category": "pairwise", "labels_list": ["a"]}"#;
        assert!(serde_json::from_str::<MetricDefinition>(unknown_kind).is_err());
    }

    #[test]
    fn test_string_bounds_accepted() {
        // toxic_chat writes its categorical bounds as strings
        let toxic = r#"{
            "dataset": "toxic_chat",
            "annotations": [
                {"metric": "toxicity", "category": "categorical", "labels_list": ["0", "1"], "best": "0", "worst": "1"},
                {"metric": "jailbreaking", "category": "categorical", "labels_list": ["0", "1"], "best": "0", "worst": "1"}
            ],
            "instances": []
        }"#;
        let ds: Dataset = serde_json::from_str(toxic).unwrap();
        ds.validate().unwrap();
        let tox = ds.metric("toxicity").unwrap();
        assert_eq!(tox.scale, Scale::categorical(["0", "1"]));

        let graded = r#"{"metric": "m", "category": "graded", "worst": "1", "best": " 5 "}"#;
        let def: MetricDefinition = serde_json::from_str(graded).unwrap();
        assert_eq!(def.scale, Scale::graded(1, 5));

        let junk = r#"{"metric": "m", "category": "continuous", "worst": "low", "best": 5}"#;
        assert!(serde_json::from_str::<MetricDefinition>(junk).is_err());
    }

    #[test]
    fn test_definition_serializes_flat() {
        let def = MetricDefinition::new("coherence", Scale::continuous(0.0, 100.0));
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["metric"], "coherence");
        assert_eq!(json["category"], "continuous");
        assert_eq!(json["best"], 100.0);
        assert!(json.get("labels_list").is_none());
    }

    #[test]
    fn test_duplicate_metric_rejected() {
        let mut ds = sample();
        ds.annotations.push(MetricDefinition::new("fluency", Scale::graded(1, 3)));
        assert!(matches!(ds.validate(), Err(Error::InvalidScale { .. })));
    }
}
