//! Agreement evaluation for one (model, metric) pair

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::ratings::RatingMatrix;
use crate::scale::ScaleKind;
use crate::stats::{self, Correlation};

/// One statistic computed three ways.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatTriple {
    #[serde(deserialize_with = "nan_if_null")]
    pub pearson: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub spearman: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub kendall: f64,
}

impl StatTriple {
    pub const NAN: StatTriple = StatTriple {
        pearson: f64::NAN,
        spearman: f64::NAN,
        kendall: f64::NAN,
    };
}

/// Labels copied verbatim into every result of a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitLabels {
    pub dataset: String,
    pub task: String,
    pub expert: String,
}

/// Agreement between human and model judgements under one metric.
///
/// Undefined statistics are `NaN` and serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementResult {
    pub corr_coeff: StatTriple,
    pub p_value: StatTriple,
    #[serde(deserialize_with = "nan_if_null")]
    pub kappa_score: f64,
    pub total_responses: usize,
    pub valid_responses: usize,
    /// Reliability among human raters only.
    #[serde(deserialize_with = "nan_if_null")]
    pub krippendorff_alpha: f64,
    #[serde(rename = "type")]
    pub scale_kind: ScaleKind,
    pub expert: String,
    pub task: String,
    #[serde(default)]
    pub dataset: String,
}

impl AgreementResult {
    /// The statistic a report leads with: Spearman for ordered scales, kappa
    /// for labels. Returns `(value, p_value)`.
    pub fn headline(&self) -> (f64, Option<f64>) {
        match self.scale_kind {
            ScaleKind::Categorical => (self.kappa_score, None),
            ScaleKind::Graded | ScaleKind::Continuous => {
                (self.corr_coeff.spearman, Some(self.p_value.spearman))
            }
        }
    }

    /// Coefficient and p-value of `pearson`, `spearman` or `kendall`.
    pub fn correlation(&self, name: &str) -> Option<Correlation> {
        let (c, p) = match name {
            "pearson" => (self.corr_coeff.pearson, self.p_value.pearson),
            "spearman" => (self.corr_coeff.spearman, self.p_value.spearman),
            "kendall" => (self.corr_coeff.kendall, self.p_value.kendall),
            _ => return None,
        };
        Some(Correlation::new(c, p))
    }
}

fn nan_if_null<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// Everything the evaluator needs for one unit, already encoded to numbers.
#[derive(Debug, Clone)]
pub struct EvaluationInput {
    /// Human summary per evaluated instance.
    pub human: Vec<f64>,
    /// Model value per evaluated instance; `None` when unresolved.
    pub model: Vec<Option<f64>>,
    /// Individual human ratings over the same instances.
    pub ratings: RatingMatrix,
    pub valid_responses: usize,
    pub scale_kind: ScaleKind,
    pub labels: UnitLabels,
}

/// Compute every agreement statistic for one unit.
///
/// Correlations and kappa use the instances where the model produced some
/// value. Degenerate input yields `NaN`; only a length mismatch is an error.
pub fn evaluate(input: &EvaluationInput) -> Result<AgreementResult> {
    if input.human.len() != input.model.len() {
        return Err(Error::LengthMismatch {
            human: input.human.len(),
            model: input.model.len(),
        });
    }

    let (human, model): (Vec<f64>, Vec<f64>) = input
        .human
        .iter()
        .zip(&input.model)
        .filter_map(|(&h, m)| m.map(|m| (h, m)))
        .unzip();

    let pearson = stats::pearson(&human, &model);
    let spearman = stats::spearman(&human, &model);
    let kendall = stats::kendall(&human, &model);

    let kappa = stats::cohen_kappa(&human, &model);
    let alpha = stats::reliability(&input.ratings, input.scale_kind.measurement_level());

    tracing::debug!(
        "{} pairs: spearman={:.4} kappa={:.4} alpha={:.4}",
        human.len(),
        spearman.coefficient,
        kappa,
        alpha
    );

    Ok(AgreementResult {
        corr_coeff: StatTriple {
            pearson: pearson.coefficient,
            spearman: spearman.coefficient,
            kendall: kendall.coefficient,
        },
        p_value: StatTriple {
            pearson: pearson.p_value,
            spearman: spearman.p_value,
            kendall: kendall.p_value,
        },
        kappa_score: kappa,
        total_responses: input.human.len(),
        valid_responses: input.valid_responses,
        krippendorff_alpha: alpha,
        scale_kind: input.scale_kind,
        expert: input.labels.expert.clone(),
        task: input.labels.task.clone(),
        dataset: input.labels.dataset.clone(),
    })
}
