//! Evaluation of response files for one dataset

use std::path::{Path, PathBuf};

use metaeval::{evaluate_model, DatasetEvaluation, FailurePolicy, UnitLabels};

use crate::config::Config;
use crate::loader::{load_responses_file, LoadError, ResponsesFile};

/// Task label used when the catalogue has no entry for a dataset
pub const UNKNOWN_TASK: &str = "unknown";

/// Evaluate every model in `files` against the human judgements of `dataset`.
///
/// Files that fail to load are skipped with a warning unless the run is
/// fail-fast. Failed (metric, model) units are recorded in the returned
/// evaluation.
pub fn evaluate_files(
    dataset: &str,
    files: &[PathBuf],
    config: &Config,
) -> Result<DatasetEvaluation, LoadError> {
    let task = task_label(config, dataset);
    let mut evaluation = DatasetEvaluation::new(dataset, task.as_str());

    for path in files {
        let file = match load_responses_file(path) {
            Ok(file) => file,
            Err(e) if config.evaluation.fail_fast => return Err(e),
            Err(e) => {
                tracing::warn!("Failed to load {}: {}", path.display(), e);
                continue;
            }
        };
        evaluate_file(&mut evaluation, &file, config)?;
    }

    if evaluation.uneven_human_ratings {
        tracing::warn!("Uneven number of human ratings in [{}]", dataset);
    }
    Ok(evaluation)
}

/// Evaluate a single response file; the dataset name comes from the file.
pub fn evaluate_single_file(
    path: impl AsRef<Path>,
    config: &Config,
) -> Result<DatasetEvaluation, LoadError> {
    let file = load_responses_file(path)?;
    let dataset = file.dataset.name().to_string();
    let mut evaluation = DatasetEvaluation::new(dataset.as_str(), task_label(config, &dataset));
    evaluate_file(&mut evaluation, &file, config)?;
    Ok(evaluation)
}

fn evaluate_file(
    evaluation: &mut DatasetEvaluation,
    file: &ResponsesFile,
    config: &Config,
) -> Result<(), LoadError> {
    let details = &file.run_details;
    let options = config
        .evaluation
        .run_options(details.additional_prompt_id.as_deref());
    let labels = UnitLabels {
        dataset: evaluation.dataset.clone(),
        task: evaluation.task.clone(),
        expert: file.dataset.expert_annotator.clone(),
    };

    let name = details.display_name();
    tracing::info!("Evaluating {} ({} mode)", name, options.mode);

    let model = evaluate_model(&file.dataset, &details.model, &labels, &options)?;
    if options.failure_policy == FailurePolicy::Continue && !model.failures.is_empty() {
        tracing::warn!("{}: {} unit(s) failed", name, model.failures.len());
    }
    evaluation.push(name, model);
    Ok(())
}

fn task_label(config: &Config, dataset: &str) -> String {
    match config.task_for(dataset) {
        Some(task) => task.to_string(),
        None => {
            tracing::warn!("No task label for dataset [{}]", dataset);
            UNKNOWN_TASK.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_file(model: &str, ap: &str, answers: [&str; 3]) -> String {
        format!(
            r#"{{
            "dataset": "summeval",
            "expert_annotator": "true",
            "annotations": [{{"metric": "fluency", "category": "graded", "worst": 1, "best": 3}}],
            "instances": [
                {{"id": 0, "annotations": {{"fluency": {{"mean_human": 1, "individual_human_scores": [1, 1], "{m}": "{a0}"}}}}}},
                {{"id": 1, "annotations": {{"fluency": {{"mean_human": 2, "individual_human_scores": [2, 3], "{m}": "{a1}"}}}}}},
                {{"id": 2, "annotations": {{"fluency": {{"mean_human": 3, "individual_human_scores": [3], "{m}": "{a2}"}}}}}}
            ],
            "run_details": {{"model": "{m}", "additional_prompt_id": "{ap}"}}
        }}"#,
            m = model,
            ap = ap,
            a0 = answers[0],
            a1 = answers[1],
            a2 = answers[2],
        )
    }

    #[test]
    fn test_evaluate_files_two_models() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("summeval_a-spNone-apregular.json");
        let b = dir.path().join("summeval_b-spNone-apcot.json");
        std::fs::write(&a, response_file("org/a", "regular", ["1", "2", "3"])).unwrap();
        std::fs::write(
            &b,
            response_file("org/b", "cot", ["therefore, 1 is correct.", "therefore, 2 is correct.", "no idea"]),
        )
        .unwrap();

        let config = Config::default();
        let eval = evaluate_files("summeval", &[a, b], &config).unwrap();
        assert_eq!(eval.task, "Summarisation");
        assert!(eval.uneven_human_ratings);

        let results = eval.results();
        let ra = &results["a (AP: regular)"]["fluency"];
        assert_eq!(ra.valid_responses, 3);
        assert_eq!(ra.expert, "true");

        let cot = &eval.models["b (AP: cot)"].metrics["fluency"];
        assert_eq!(cot.result.valid_responses, 2);
        assert_eq!(cot.extraction.unresolved, 1);
    }

    #[test]
    fn test_broken_file_skipped_unless_fail_fast() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("summeval_a-spNone-apregular.json");
        let bad = dir.path().join("summeval_b-spNone-apregular.json");
        std::fs::write(&good, response_file("org/a", "regular", ["1", "2", "3"])).unwrap();
        std::fs::write(&bad, "not json").unwrap();

        let mut config = Config::default();
        let eval = evaluate_files("summeval", &[good.clone(), bad.clone()], &config).unwrap();
        assert_eq!(eval.models.len(), 1);

        config.evaluation.fail_fast = true;
        assert!(evaluate_files("summeval", &[good, bad], &config).is_err());
    }

    #[test]
    fn test_single_file_uses_dataset_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("responses.json");
        std::fs::write(&path, response_file("m", "regular", ["3", "3", "3"])).unwrap();
        let eval = evaluate_single_file(&path, &Config::default()).unwrap();
        assert_eq!(eval.dataset, "summeval");
        assert_eq!(eval.models.len(), 1);
    }
}
