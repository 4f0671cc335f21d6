//! Meta-evaluation of LLM judges against human judgements.
//!
//! Two stages, the first feeding the second:
//!
//! - [`extract`] turns a model's free-text response into a value on the
//!   metric's scale (or flags it as unparseable);
//! - [`evaluate`] compares the human and model series with correlation,
//!   kappa and Krippendorff's alpha over the individual human ratings.
//!
//! [`pipeline`] runs both over every (metric, model) unit of a [`Dataset`].
//!
//! ```
//! use metaeval::{Extractor, PromptMode, Scale, ScaleValue};
//!
//! let mut ex = Extractor::new("toxicity", Scale::categorical(["Yes", "No"]), PromptMode::Direct, 42)?;
//! let e = ex.extract("I think the answer is Yes, clearly.");
//! assert_eq!(e.value, Some(ScaleValue::from("Yes")));
//! # Ok::<(), metaeval::Error>(())
//! ```

pub mod dataset;
pub mod error;
pub mod evaluate;
pub mod extract;
pub mod pipeline;
pub mod ratings;
pub mod scale;
pub mod stats;

pub use dataset::{Dataset, Instance, InstanceId, MetricDefinition, MetricJudgement};
pub use error::{Error, Result};
pub use evaluate::{evaluate, AgreementResult, EvaluationInput, StatTriple, UnitLabels};
pub use extract::{Extraction, ExtractionTally, Extractor, PromptMode, Termination, Validity};
pub use pipeline::{
    evaluate_dataset, evaluate_metric, evaluate_model, DatasetEvaluation, FailurePolicy,
    MetricEvaluation, ModelEvaluation, RunOptions, UnitFailure,
};
pub use ratings::RatingMatrix;
pub use scale::{LabelSet, MeasurementLevel, Scale, ScaleKind, ScaleValue};
