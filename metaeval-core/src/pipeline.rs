//! Orchestration over (dataset, metric, model) units
//!
//! Each unit builds its own [`Extractor`] from the run seed, so units are
//! independent and can be evaluated in any order with identical output.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::dataset::{Dataset, MetricDefinition};
use crate::error::{Error, Result};
use crate::evaluate::{evaluate, AgreementResult, EvaluationInput, UnitLabels};
use crate::extract::{ExtractionTally, Extractor, PromptMode, Termination, Validity};
use crate::ratings::RatingMatrix;

/// What to do when a unit hits a structural error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure and evaluate the remaining units.
    #[default]
    Continue,
    /// Stop at the first failure.
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub mode: PromptMode,
    pub seed: u64,
    pub failure_policy: FailurePolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: PromptMode::Direct,
            seed: 42,
            failure_policy: FailurePolicy::Continue,
        }
    }
}

/// Result of one (dataset, metric, model) unit.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricEvaluation {
    pub metric: String,
    pub result: AgreementResult,
    pub extraction: ExtractionTally,
    /// Evaluated instances carry different numbers of human ratings.
    pub uneven_human_ratings: bool,
}

/// A unit that could not be evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitFailure {
    pub metric: String,
    pub model: String,
    pub error: Error,
}

impl std::fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {}: {}", self.model, self.metric, self.error)
    }
}

/// Extract every response of `model` under `metric` and evaluate agreement.
///
/// Instances the model did not answer are skipped and not counted.
pub fn evaluate_metric(
    dataset: &Dataset,
    metric: &MetricDefinition,
    model: &str,
    labels: &UnitLabels,
    options: &RunOptions,
) -> Result<MetricEvaluation> {
    let scale = &metric.scale;
    let kind = scale.kind();
    let mut extractor = Extractor::with_termination(
        metric.name.as_str(),
        scale.clone(),
        options.mode,
        Termination::for_dataset(dataset.name()),
        options.seed,
    )?;

    // largest human panel over every instance, answered or not
    let panel = dataset
        .instances
        .iter()
        .filter_map(|instance| instance.annotations.get(&metric.name))
        .map(|judgement| judgement.individual_human_scores.len())
        .max()
        .unwrap_or(0);

    let mut human = Vec::new();
    let mut model_values = Vec::new();
    let mut ratings = RatingMatrix::new();
    let mut valid = 0;

    for instance in &dataset.instances {
        let judgement = instance.judgement(&metric.name)?;
        let Some(raw) = judgement.response(model) else {
            continue;
        };

        let summary = judgement
            .human_summary(kind)
            .ok_or_else(|| Error::MissingHumanSummary {
                metric: metric.name.clone(),
                instance: instance.id.to_string(),
            })?;
        let encoded_human = scale.encode(&summary)?;

        let individual = judgement
            .individual_human_scores
            .iter()
            .map(|v| scale.encode_rating(v))
            .collect::<Result<Vec<_>>>()?;

        let extraction = extractor.extract(raw);
        if extraction.validity == Validity::Valid {
            valid += 1;
        }
        let encoded_model = extraction
            .value
            .as_ref()
            .map(|v| scale.encode(v))
            .transpose()?;

        human.push(encoded_human);
        model_values.push(encoded_model);
        ratings.push_instance(individual);
    }

    let uneven = ratings.is_uneven(panel);
    let input = EvaluationInput {
        human,
        model: model_values,
        ratings,
        valid_responses: valid,
        scale_kind: kind,
        labels: labels.clone(),
    };
    let result = evaluate(&input)?;
    let extraction = extractor.into_tally();

    tracing::debug!(
        "{} / {} / {}: {}/{} valid, {} unresolved",
        dataset.name(),
        metric.name,
        model,
        result.valid_responses,
        result.total_responses,
        extraction.unresolved
    );

    Ok(MetricEvaluation {
        metric: metric.name.clone(),
        result,
        extraction,
        uneven_human_ratings: uneven,
    })
}

/// All metric evaluations of one model on one dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelEvaluation {
    pub model: String,
    pub metrics: IndexMap<String, MetricEvaluation>,
    pub failures: Vec<UnitFailure>,
    pub uneven_human_ratings: bool,
}

impl ModelEvaluation {
    pub fn results(&self) -> IndexMap<String, AgreementResult> {
        self.metrics
            .iter()
            .map(|(name, eval)| (name.clone(), eval.result.clone()))
            .collect()
    }
}

/// Evaluate `model` under every metric the dataset defines.
///
/// With [`FailurePolicy::Continue`] failed units are collected in
/// [`ModelEvaluation::failures`]; with [`FailurePolicy::Abort`] the first
/// one is returned as the error.
pub fn evaluate_model(
    dataset: &Dataset,
    model: &str,
    labels: &UnitLabels,
    options: &RunOptions,
) -> Result<ModelEvaluation> {
    let mut out = ModelEvaluation {
        model: model.to_string(),
        ..Default::default()
    };

    for metric in &dataset.annotations {
        match evaluate_metric(dataset, metric, model, labels, options) {
            Ok(eval) => {
                out.uneven_human_ratings |= eval.uneven_human_ratings;
                out.metrics.insert(metric.name.clone(), eval);
            }
            Err(e) if options.failure_policy == FailurePolicy::Abort => return Err(e),
            Err(e) => {
                tracing::warn!("{} / {} / {} failed: {}", dataset.name(), metric.name, model, e);
                out.failures.push(UnitFailure {
                    metric: metric.name.clone(),
                    model: model.to_string(),
                    error: e,
                });
            }
        }
    }

    Ok(out)
}

/// Every model evaluated on one dataset, keyed by display name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetEvaluation {
    pub dataset: String,
    pub task: String,
    pub models: IndexMap<String, ModelEvaluation>,
    pub uneven_human_ratings: bool,
}

impl DatasetEvaluation {
    pub fn new(dataset: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            task: task.into(),
            ..Default::default()
        }
    }

    pub fn push(&mut self, name: impl Into<String>, evaluation: ModelEvaluation) {
        self.uneven_human_ratings |= evaluation.uneven_human_ratings;
        self.models.insert(name.into(), evaluation);
    }

    /// `{model: {metric: result}}`, the layout of result files.
    pub fn results(&self) -> IndexMap<String, IndexMap<String, AgreementResult>> {
        self.models
            .iter()
            .map(|(name, eval)| (name.clone(), eval.results()))
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitFailure> {
        self.models.values().flat_map(|m| m.failures.iter())
    }
}

/// Evaluate every model that answered anything in `dataset`.
pub fn evaluate_dataset(
    dataset: &Dataset,
    labels: &UnitLabels,
    options: &RunOptions,
) -> Result<DatasetEvaluation> {
    let mut out = DatasetEvaluation::new(labels.dataset.as_str(), labels.task.as_str());
    for model in dataset.models() {
        let eval = evaluate_model(dataset, &model, labels, options)?;
        out.push(model, eval);
    }
    if out.uneven_human_ratings {
        tracing::warn!("uneven number of human ratings in [{}]", labels.dataset);
    }
    Ok(out)
}
