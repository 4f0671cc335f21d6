//! Answer extraction from free-text model responses
//!
//! One [`Extractor`] is built per metric. It compiles a matcher for the
//! metric's scale and prompting mode once, then maps each raw response to a
//! scale value:
//!
//! | scale       | direct mode                         | chain-of-thought                    |
//! |-------------|-------------------------------------|-------------------------------------|
//! | categorical | first label found as a whole word   | `therefore, <label> is correct.`    |
//! | graded      | first standalone integer in range   | `therefore, <n> is correct.`        |
//! | continuous  | first signed numeral in range       | `therefore, <n> is correct.`        |
//!
//! A direct-mode miss is replaced by a seeded random value and marked
//! non-valid. A chain-of-thought miss stays unresolved and is kept for
//! manual inspection.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::scale::{Scale, ScaleValue};

/// How the model was prompted for its verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
    /// Answer only.
    #[default]
    Direct,
    /// Reasoning followed by a closing `therefore, X is correct.` verdict.
    ChainOfThought,
}

impl PromptMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptMode::Direct => "direct",
            PromptMode::ChainOfThought => "cot",
        }
    }
}

impl std::fmt::Display for PromptMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a chain-of-thought verdict may appear for numeric scales.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    #[default]
    Anywhere,
    /// The verdict must close the response.
    AtEnd,
}

impl Termination {
    /// Recipe planning datasets must end on their verdict.
    pub fn for_dataset(dataset: &str) -> Self {
        if dataset.starts_with("recipe") {
            Termination::AtEnd
        } else {
            Termination::Anywhere
        }
    }
}

/// Outcome classification of one extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
    /// The response contained a value on the scale.
    Valid,
    /// Nothing matched; a random substitute was used.
    NonValid,
    /// Nothing matched in chain-of-thought mode; no value.
    Unresolved,
}

/// A value pulled out of one response.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub value: Option<ScaleValue>,
    pub validity: Validity,
}

impl Extraction {
    pub fn is_valid(&self) -> bool {
        self.validity == Validity::Valid
    }
}

/// Running counts over every response an extractor has seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionTally {
    pub total: usize,
    pub valid: usize,
    pub non_valid: usize,
    pub unresolved: usize,
    /// Raw text of unresolved responses, for manual inspection.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved_responses: Vec<String>,
}

impl ExtractionTally {
    fn record(&mut self, validity: Validity, raw: &str) {
        self.total += 1;
        match validity {
            Validity::Valid => self.valid += 1,
            Validity::NonValid => self.non_valid += 1,
            Validity::Unresolved => {
                self.unresolved += 1;
                self.unresolved_responses.push(raw.to_string());
            }
        }
    }
}

/// Scale- and mode-specific matching rule, compiled once per metric.
#[derive(Debug)]
enum Matcher {
    /// Declared labels with their whole-word patterns.
    Labels(Vec<(String, Regex)>),
    /// Declared labels with their closing verdict phrases.
    LabelVerdicts(Vec<(String, String)>),
    /// Maximal digit runs read as integers in `[lo, hi]`.
    Integers { runs: Regex, lo: i64, hi: i64 },
    /// Signed decimal or integer numerals in `[lo, hi]`.
    Numerals { numerals: Regex, lo: f64, hi: f64 },
    /// Closing verdict naming an integer in `[lo, hi]`.
    IntegerVerdicts {
        verdict: Regex,
        closing: Regex,
        lo: i64,
        hi: i64,
        termination: Termination,
    },
}

const VERDICT: &str = r"therefore, (-?(?:0|[1-9][0-9]*)) is correct\.";

impl Matcher {
    fn compile(scale: &Scale, mode: PromptMode, termination: Termination) -> Result<Self> {
        let matcher = match (scale, mode) {
            (Scale::Categorical(labels), PromptMode::Direct) => {
                let patterns = labels
                    .labels()
                    .iter()
                    .zip(labels.folded())
                    .map(|(declared, folded)| -> Result<(String, Regex)> {
                        let re = Regex::new(&format!(r"\b{}\b", regex::escape(folded)))?;
                        Ok((declared.clone(), re))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Matcher::Labels(patterns)
            }
            (Scale::Categorical(labels), PromptMode::ChainOfThought) => Matcher::LabelVerdicts(
                labels
                    .labels()
                    .iter()
                    .zip(labels.folded())
                    .map(|(declared, folded)| {
                        (declared.clone(), format!("therefore, {} is correct.", folded))
                    })
                    .collect(),
            ),
            (Scale::Graded { worst, best }, PromptMode::Direct) => Matcher::Integers {
                runs: Regex::new(r"[0-9]+")?,
                lo: (*worst).min(*best),
                hi: (*worst).max(*best),
            },
            (Scale::Continuous { .. }, PromptMode::Direct) => {
                let (lo, hi) = numeric_bounds(scale);
                Matcher::Numerals {
                    numerals: Regex::new(r"[-+]?[0-9]*\.?[0-9]+")?,
                    lo,
                    hi,
                }
            }
            (_, PromptMode::ChainOfThought) => {
                let (lo, hi) = numeric_bounds(scale);
                Matcher::IntegerVerdicts {
                    verdict: Regex::new(VERDICT)?,
                    closing: Regex::new(&format!("{}$", VERDICT))?,
                    lo: lo.ceil() as i64,
                    hi: hi.floor() as i64,
                    termination,
                }
            }
        };
        Ok(matcher)
    }

    /// Find a value in already lower-cased, trimmed text.
    fn find(&self, text: &str) -> Option<ScaleValue> {
        match self {
            Matcher::Labels(patterns) => patterns
                .iter()
                .find(|(_, re)| re.is_match(text))
                .map(|(label, _)| ScaleValue::Label(label.clone())),

            Matcher::LabelVerdicts(verdicts) => {
                let text = strip_emphasis(text);
                verdicts
                    .iter()
                    .find(|(_, phrase)| text.contains(phrase.as_str()))
                    .map(|(label, _)| ScaleValue::Label(label.clone()))
            }

            Matcher::Integers { runs, lo, hi } => runs
                .find_iter(text)
                .map(|m| m.as_str())
                .filter(|digits| digits.len() == 1 || !digits.starts_with('0'))
                .filter_map(|digits| digits.parse::<i64>().ok())
                .find(|v| v >= lo && v <= hi)
                .map(|v| ScaleValue::Number(v as f64)),

            Matcher::Numerals { numerals, lo, hi } => numerals
                .find_iter(text)
                .filter_map(|m| m.as_str().parse::<f64>().ok())
                .find(|v| v >= lo && v <= hi)
                .map(ScaleValue::Number),

            Matcher::IntegerVerdicts {
                verdict,
                closing,
                lo,
                hi,
                termination,
            } => {
                let text = strip_emphasis(text);
                let in_range = |caps: regex::Captures<'_>| {
                    caps.get(1)
                        .and_then(|m| m.as_str().parse::<i64>().ok())
                        .filter(|v| v >= lo && v <= hi)
                };
                let found = match termination {
                    Termination::AtEnd => closing.captures(&text).and_then(in_range),
                    // the lowest verdict in range wins
                    Termination::Anywhere => verdict.captures_iter(&text).filter_map(in_range).min(),
                };
                found.map(|v| ScaleValue::Number(v as f64))
            }
        }
    }
}

fn numeric_bounds(scale: &Scale) -> (f64, f64) {
    scale.bounds().unwrap_or((0.0, 0.0))
}

fn strip_emphasis(text: &str) -> String {
    text.replace("**", "").trim_end().to_string()
}

/// Maps raw responses of one metric to scale values.
#[derive(Debug)]
pub struct Extractor {
    metric: String,
    scale: Scale,
    mode: PromptMode,
    matcher: Matcher,
    rng: StdRng,
    tally: ExtractionTally,
}

impl Extractor {
    /// Build an extractor for `scale`, seeding the fallback generator.
    pub fn new(metric: impl Into<String>, scale: Scale, mode: PromptMode, seed: u64) -> Result<Self> {
        Self::with_termination(metric, scale, mode, Termination::default(), seed)
    }

    /// Like [`Extractor::new`] with an explicit chain-of-thought termination rule.
    pub fn with_termination(
        metric: impl Into<String>,
        scale: Scale,
        mode: PromptMode,
        termination: Termination,
        seed: u64,
    ) -> Result<Self> {
        let metric = metric.into();
        scale.validate(&metric)?;
        let matcher = Matcher::compile(&scale, mode, termination)?;
        Ok(Self {
            metric,
            scale,
            mode,
            matcher,
            rng: StdRng::seed_from_u64(seed),
            tally: ExtractionTally::default(),
        })
    }

    pub fn scale(&self) -> &Scale {
        &self.scale
    }

    pub fn mode(&self) -> PromptMode {
        self.mode
    }

    pub fn tally(&self) -> &ExtractionTally {
        &self.tally
    }

    pub fn into_tally(self) -> ExtractionTally {
        self.tally
    }

    /// Extract a value from one raw response.
    pub fn extract(&mut self, raw: &str) -> Extraction {
        let text = raw.trim().to_lowercase();

        let extraction = match self.matcher.find(&text) {
            Some(value) => Extraction {
                value: Some(value),
                validity: Validity::Valid,
            },
            None => match self.mode {
                PromptMode::ChainOfThought => {
                    tracing::warn!(
                        "Unresolved chain-of-thought response for '{}': {}",
                        self.metric,
                        text
                    );
                    Extraction {
                        value: None,
                        validity: Validity::Unresolved,
                    }
                }
                PromptMode::Direct => {
                    let value = self.fallback();
                    tracing::debug!(
                        "No {} value in response for '{}', substituted {:?}",
                        self.scale.kind(),
                        self.metric,
                        value
                    );
                    Extraction {
                        validity: if value.is_some() {
                            Validity::NonValid
                        } else {
                            Validity::Unresolved
                        },
                        value,
                    }
                }
            },
        };

        self.tally.record(extraction.validity, raw);
        extraction
    }

    /// Uniformly random value on the scale.
    fn fallback(&mut self) -> Option<ScaleValue> {
        match &self.scale {
            Scale::Categorical(labels) => labels
                .labels()
                .choose(&mut self.rng)
                .map(|l| ScaleValue::Label(l.clone())),
            Scale::Graded { worst, best } => {
                let v = self.rng.gen_range((*worst).min(*best)..=(*worst).max(*best));
                Some(ScaleValue::Number(v as f64))
            }
            Scale::Continuous { .. } => {
                let (lo, hi) = numeric_bounds(&self.scale);
                let (int_lo, int_hi) = (lo.ceil(), hi.floor());
                let v = if int_lo <= int_hi {
                    self.rng.gen_range(int_lo as i64..=int_hi as i64) as f64
                } else {
                    self.rng.gen_range(lo..=hi)
                };
                Some(ScaleValue::Number(v))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct(scale: Scale) -> Extractor {
        Extractor::new("m", scale, PromptMode::Direct, 7).unwrap()
    }

    fn cot(scale: Scale) -> Extractor {
        Extractor::new("m", scale, PromptMode::ChainOfThought, 7).unwrap()
    }

    #[test]
    fn test_categorical_direct_whole_word() {
        let mut ex = direct(Scale::categorical(["Yes", "No"]));
        let e = ex.extract("I think the answer is Yes, clearly.");
        assert_eq!(e.value, Some(ScaleValue::from("Yes")));
        assert!(e.is_valid());

        // "no" inside "nothing" is not a label
        let e = ex.extract("Nothing to add. YES");
        assert_eq!(e.value, Some(ScaleValue::from("Yes")));
    }

    #[test]
    fn test_categorical_direct_declared_order_wins() {
        let mut ex = direct(Scale::categorical(["bad", "good"]));
        let e = ex.extract("good, not bad");
        assert_eq!(e.value, Some(ScaleValue::from("bad")));
    }

    #[test]
    fn test_categorical_direct_fallback() {
        let mut ex = direct(Scale::categorical(["yes", "no"]));
        let e = ex.extract("I cannot decide");
        assert_eq!(e.validity, Validity::NonValid);
        let label = e.value.unwrap();
        assert!(["yes", "no"].contains(&label.as_label().unwrap()));
        assert_eq!(ex.tally().non_valid, 1);
    }

    #[test]
    fn test_categorical_cot_verdict() {
        let mut ex = cot(Scale::categorical(["yes", "no"]));
        let e = ex.extract(r#"The output drifts off topic... so, "Therefore, no is correct.""#);
        assert_eq!(e.value, Some(ScaleValue::from("no")));
        assert!(e.is_valid());

        let e = ex.extract("Therefore, **yes** is correct.");
        assert_eq!(e.value, Some(ScaleValue::from("yes")));
    }

    #[test]
    fn test_categorical_cot_unresolved() {
        let mut ex = cot(Scale::categorical(["yes", "no"]));
        let e = ex.extract("The answer is yes.");
        assert_eq!(e.value, None);
        assert_eq!(e.validity, Validity::Unresolved);
        assert_eq!(ex.tally().unresolved_responses, vec!["The answer is yes.".to_string()]);
    }

    #[test]
    fn test_graded_direct_standalone_digit() {
        let mut ex = direct(Scale::graded(1, 5));
        assert_eq!(ex.extract("Score: 4/5").value, Some(ScaleValue::Number(4.0)));
        assert_eq!(ex.extract("rating 3.5").value, Some(ScaleValue::Number(3.0)));
        // 12 is a multi-digit neighbour, not a 1 or a 2
        assert_eq!(ex.extract("12 reasons, final 2").value, Some(ScaleValue::Number(2.0)));
    }

    #[test]
    fn test_graded_direct_out_of_range_falls_back() {
        let mut ex = direct(Scale::graded(1, 5));
        let e = ex.extract("I'd rate this a 7 out of 10");
        assert_eq!(e.validity, Validity::NonValid);
        let v = e.value.unwrap().as_number().unwrap();
        assert!((1.0..=5.0).contains(&v));
        assert_eq!(v.fract(), 0.0);
    }

    #[test]
    fn test_graded_leading_zero_rejected() {
        let mut ex = direct(Scale::graded(0, 5));
        assert_eq!(ex.extract("05 then 0").value, Some(ScaleValue::Number(0.0)));
    }

    #[test]
    fn test_continuous_direct_signed_decimal() {
        let mut ex = direct(Scale::continuous(-1.0, 1.0));
        assert_eq!(ex.extract("score = -0.25").value, Some(ScaleValue::Number(-0.25)));
        // 75 is out of bounds, keep scanning
        assert_eq!(ex.extract("75 -> .5").value, Some(ScaleValue::Number(0.5)));
    }

    #[test]
    fn test_continuous_direct_fallback_in_bounds() {
        let mut ex = direct(Scale::continuous(0.0, 100.0));
        let e = ex.extract("no idea");
        assert_eq!(e.validity, Validity::NonValid);
        let v = e.value.unwrap().as_number().unwrap();
        assert!((0.0..=100.0).contains(&v));
    }

    #[test]
    fn test_graded_cot_scan() {
        let mut ex = cot(Scale::graded(1, 5));
        let e = ex.extract("It is fluent. Therefore, 4 is correct.");
        assert_eq!(e.value, Some(ScaleValue::Number(4.0)));
        // out of range verdicts are ignored
        let e = ex.extract("therefore, 9 is correct.");
        assert_eq!(e.validity, Validity::Unresolved);
    }

    #[test]
    fn test_continuous_cot_scan() {
        let mut ex = cot(Scale::continuous(0.0, 100.0));
        let e = ex.extract("Mostly coherent. Therefore, 85 is correct.");
        assert_eq!(e.value, Some(ScaleValue::Number(85.0)));
        assert_eq!(e.validity, Validity::Valid);

        let e = ex.extract("therefore, 101 is correct.");
        assert_eq!(e.validity, Validity::Unresolved);
        assert_eq!(e.value, None);

        // only integer verdicts count
        let e = ex.extract("therefore, 0.5 is correct.");
        assert_eq!(e.validity, Validity::Unresolved);
        assert_eq!(ex.tally().unresolved, 2);
    }

    #[test]
    fn test_continuous_cot_fractional_bounds() {
        // (0.5, 3.5) scans the integers 1..=3
        let mut ex = cot(Scale::continuous(0.5, 3.5));
        assert_eq!(ex.extract("therefore, 0 is correct.").value, None);
        assert_eq!(ex.extract("therefore, 4 is correct.").value, None);
        assert_eq!(ex.extract("therefore, 3 is correct.").value, Some(ScaleValue::Number(3.0)));
    }

    #[test]
    fn test_cot_lowest_verdict_wins() {
        let mut ex = cot(Scale::graded(1, 5));
        let e = ex.extract("therefore, 5 is correct. therefore, 2 is correct.");
        assert_eq!(e.value, Some(ScaleValue::Number(2.0)));
    }

    #[test]
    fn test_cot_at_end_termination() {
        let mut ex = Extractor::with_termination(
            "m",
            Scale::graded(1, 5),
            PromptMode::ChainOfThought,
            Termination::for_dataset("recipe_crowd_sourcing_data"),
            7,
        )
        .unwrap();
        assert_eq!(ex.extract("therefore, 3 is correct.  ").value, Some(ScaleValue::Number(3.0)));
        assert_eq!(ex.extract("therefore, 3 is correct. but maybe not").value, None);
    }

    #[test]
    fn test_empty_response_is_unparseable() {
        let mut ex = direct(Scale::graded(1, 3));
        assert_eq!(ex.extract("").validity, Validity::NonValid);
        assert_eq!(ex.extract("   ").validity, Validity::NonValid);
        let mut ex = cot(Scale::categorical(["a", "b"]));
        assert_eq!(ex.extract("").validity, Validity::Unresolved);
    }

    #[test]
    fn test_same_seed_same_fallback() {
        let mut a = direct(Scale::graded(1, 100));
        let mut b = direct(Scale::graded(1, 100));
        for _ in 0..5 {
            assert_eq!(a.extract("n/a"), b.extract("n/a"));
        }
    }

    #[test]
    fn test_tally_counts() {
        let mut ex = direct(Scale::categorical(["a", "b"]));
        ex.extract("a");
        ex.extract("zzz");
        let tally = ex.into_tally();
        assert_eq!(tally.total, 2);
        assert_eq!(tally.valid, 1);
        assert_eq!(tally.non_valid, 1);
        assert_eq!(tally.unresolved, 0);
    }
}
