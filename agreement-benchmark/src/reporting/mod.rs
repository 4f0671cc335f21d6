//! Results reporting

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use indexmap::IndexMap;
use metaeval::{AgreementResult, DatasetEvaluation};

/// `{model: {metric: result}}` as written to result files
pub type ResultTable = IndexMap<String, IndexMap<String, AgreementResult>>;

/// Error type for result output
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where the results of `evaluation` are written.
///
/// `<results_dir>/eval/<dd-mm-YYYY>/<dataset>.json` for several models,
/// `<dataset>_<model>.json` for a single one. The dataset is written with
/// hyphens (`persona-chat`).
pub fn result_path(results_dir: impl AsRef<Path>, evaluation: &DatasetEvaluation, date: NaiveDate) -> PathBuf {
    let dir = results_dir
        .as_ref()
        .join("eval")
        .join(date.format("%d-%m-%Y").to_string());
    let dataset = evaluation.dataset.replace('_', "-");
    let file = match evaluation.models.keys().next() {
        Some(model) if evaluation.models.len() == 1 => format!("{}_{}.json", dataset, model),
        _ => format!("{}.json", dataset),
    };
    dir.join(file)
}

/// Write the result table to `path`, creating parent directories
pub fn write_results(evaluation: &DatasetEvaluation, path: impl AsRef<Path>) -> Result<(), ReportError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&evaluation.results())?;
    std::fs::write(path, json)?;
    tracing::info!("Saved results to {}", path.display());
    Ok(())
}

/// Read a result file back
pub fn read_results(path: impl AsRef<Path>) -> Result<ResultTable, ReportError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn fmt_stat(value: f64) -> String {
    if value.is_nan() {
        "n/a".to_string()
    } else {
        format!("{:.3}", value)
    }
}

/// Generate a console report for one dataset
pub fn print_console_report(evaluation: &DatasetEvaluation) {
    println!("\n=== [{}] {} ===\n", evaluation.dataset, evaluation.task);

    println!(
        "{:<36} {:<20} {:>8} {:>8} {:>9} {:>8} {:>6}",
        "Model", "Metric", "Score", "p", "Valid", "Alpha", "Unres"
    );
    println!("{:-<100}", "");

    for (model, eval) in &evaluation.models {
        for (metric, unit) in &eval.metrics {
            let r = &unit.result;
            let (score, p) = r.headline();
            println!(
                "{:<36} {:<20} {:>8} {:>8} {:>9} {:>8} {:>6}",
                model,
                metric,
                fmt_stat(score),
                p.map(fmt_stat).unwrap_or_else(|| "-".to_string()),
                format!("{}/{}", r.valid_responses, r.total_responses),
                fmt_stat(r.krippendorff_alpha),
                unit.extraction.unresolved,
            );
        }
    }

    if evaluation.uneven_human_ratings {
        println!("\n[ALERT]: uneven number of human responses in [{}]!", evaluation.dataset);
    }

    let failures: Vec<_> = evaluation.failures().collect();
    if !failures.is_empty() {
        println!("\nFailed units ({}):", failures.len());
        for failure in failures {
            println!("  {}", failure);
        }
    }

    println!("\n{:=<100}", "");
}

/// Print unresolved chain-of-thought responses for manual inspection
pub fn print_unresolved(evaluation: &DatasetEvaluation) {
    for (model, eval) in &evaluation.models {
        for (metric, unit) in &eval.metrics {
            for response in &unit.extraction.unresolved_responses {
                println!("[UNRESOLVED {} / {}]: {}", model, metric, response);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaeval::{evaluate_dataset, Dataset, RunOptions, UnitLabels};

    fn evaluation() -> DatasetEvaluation {
        let ds: Dataset = serde_json::from_str(
            r#"{
            "dataset": "cola",
            "annotations": [{"metric": "grammatical", "category": "categorical", "labels_list": ["acceptable", "unacceptable"]}],
            "instances": [
                {"id": 0, "annotations": {"grammatical": {"majority_human": "acceptable", "individual_human_scores": ["acceptable"], "m": "acceptable"}}},
                {"id": 1, "annotations": {"grammatical": {"majority_human": "unacceptable", "individual_human_scores": ["unacceptable"], "m": "unacceptable"}}}
            ]
        }"#,
        )
        .unwrap();
        let labels = UnitLabels {
            dataset: "cola".to_string(),
            task: "Acceptability".to_string(),
            expert: "unknown".to_string(),
        };
        evaluate_dataset(&ds, &labels, &RunOptions::default()).unwrap()
    }

    #[test]
    fn test_result_path() {
        let eval = evaluation();
        let date = NaiveDate::from_ymd_opt(2024, 7, 5).unwrap();
        let path = result_path("results", &eval, date);
        assert_eq!(path, PathBuf::from("results/eval/05-07-2024/cola_m.json"));

        let mut two = eval.clone();
        two.push("other", eval.models["m"].clone());
        assert_eq!(
            result_path("results", &two, date),
            PathBuf::from("results/eval/05-07-2024/cola.json")
        );

        two.dataset = "persona_chat".to_string();
        assert_eq!(
            result_path("results", &two, date),
            PathBuf::from("results/eval/05-07-2024/persona-chat.json")
        );
    }

    #[test]
    fn test_write_and_read_results() {
        let dir = tempfile::tempdir().unwrap();
        let eval = evaluation();
        let path = dir.path().join("eval").join("cola_m.json");
        write_results(&eval, &path).unwrap();

        let table = read_results(&path).unwrap();
        let r = &table["m"]["grammatical"];
        assert_eq!(r.kappa_score, 1.0);
        // one rating per instance leaves alpha undefined
        assert!(r.krippendorff_alpha.is_nan());
        assert_eq!(r.task, "Acceptability");
    }

    #[test]
    fn test_fmt_stat() {
        assert_eq!(fmt_stat(f64::NAN), "n/a");
        assert_eq!(fmt_stat(0.12345), "0.123");
    }
}
