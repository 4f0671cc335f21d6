//! Response file loading and discovery
//!
//! A response file is a dataset record extended with the `run_details` of
//! the model run that produced its responses.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use metaeval::Dataset;
use serde::{Deserialize, Serialize};

use crate::config::ResponseVariant;

/// Error type for response loading
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("no instances found in file: {0}")]
    NoInstances(String),

    #[error("no response files for [{dataset}] in {dir}")]
    NoFiles { dataset: String, dir: String },

    #[error(transparent)]
    Evaluation(#[from] metaeval::Error),
}

/// Model run that produced a response file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDetails {
    /// Model identifier, also the response key inside judgements
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_prompt_id: Option<String>,
}

impl RunDetails {
    /// Last path segment of the model id, plus the additional prompt id.
    pub fn display_name(&self) -> String {
        let short = self.model.rsplit('/').next().unwrap_or(&self.model);
        match &self.additional_prompt_id {
            Some(ap) if !ap.is_empty() => format!("{} (AP: {})", short, ap),
            _ => short.to_string(),
        }
    }
}

/// A dataset record together with the run that answered it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesFile {
    #[serde(flatten)]
    pub dataset: Dataset,
    pub run_details: RunDetails,
}

/// Load a response file from disk
pub fn load_responses_file(path: impl AsRef<Path>) -> Result<ResponsesFile, LoadError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    load_responses_str(&content, &path.display().to_string())
}

/// Parse a response file; `origin` names it in errors
pub fn load_responses_str(content: &str, origin: &str) -> Result<ResponsesFile, LoadError> {
    let file: ResponsesFile = serde_json::from_str(content).map_err(|e| LoadError::Parse {
        path: origin.to_string(),
        message: e.to_string(),
    })?;
    if file.dataset.instances.is_empty() {
        return Err(LoadError::NoInstances(origin.to_string()));
    }
    file.dataset.validate()?;
    Ok(file)
}

/// Short model name used in response file names
pub fn model_short_name(model: &str) -> &str {
    model.rsplit('/').next().unwrap_or(model)
}

/// Find the response files of `dataset` in `dir`, oldest first.
///
/// Files are named `<dataset>_<model>-spNone-ap<prompt id>...`. With `model`
/// set only the newest matching file is returned.
pub fn discover_response_files(
    dir: impl AsRef<Path>,
    dataset: &str,
    model: Option<&str>,
    variant: ResponseVariant,
    exclude: &[String],
) -> Result<Vec<PathBuf>, LoadError> {
    let dir = dir.as_ref();
    let prefix = match model {
        Some(m) => format!("{}_{}-spNone-ap", dataset, model_short_name(m)),
        None => format!("{}_", dataset),
    };

    let mut files: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with(&prefix) || !variant.matches(name) {
            continue;
        }
        if exclude.iter().any(|x| name.contains(x.as_str())) {
            tracing::debug!("Skipping excluded response file {}", name);
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        files.push((modified, path));
    }

    files.sort();
    let mut files: Vec<PathBuf> = files.into_iter().map(|(_, p)| p).collect();
    if model.is_some() {
        files = files.pop().into_iter().collect();
    }

    if files.is_empty() {
        return Err(LoadError::NoFiles {
            dataset: dataset.to_string(),
            dir: dir.display().to_string(),
        });
    }
    Ok(files)
}
