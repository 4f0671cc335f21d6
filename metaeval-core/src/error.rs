//! Structural errors that abort a single (dataset, metric, model) unit.
//!
//! Degenerate statistics never surface here; they are reported as `NaN` or
//! short-circuit values inside [`crate::AgreementResult`].

/// Fatal precondition violations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("length mismatch: {human} human values vs {model} model values")]
    LengthMismatch { human: usize, model: usize },

    #[error("instance {instance} has no annotations for metric '{metric}'")]
    MissingMetric { metric: String, instance: String },

    #[error("instance {instance} has no human summary for metric '{metric}'")]
    MissingHumanSummary { metric: String, instance: String },

    #[error("unknown label '{label}' (expected one of {expected:?})")]
    UnknownLabel { label: String, expected: Vec<String> },

    #[error("value {value} outside scale bounds [{lo}, {hi}]")]
    OutOfBounds { value: f64, lo: f64, hi: f64 },

    #[error("expected a {expected} value, got {got}")]
    ValueKind { expected: &'static str, got: String },

    #[error("invalid scale for metric '{metric}': {reason}")]
    InvalidScale { metric: String, reason: String },

    #[error("unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("pattern error: {0}")]
    Pattern(String),
}

impl From<regex::Error> for Error {
    fn from(e: regex::Error) -> Self {
        Error::Pattern(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
