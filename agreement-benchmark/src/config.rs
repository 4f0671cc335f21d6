//! Configuration management for the agreement benchmark
//!
//! Loads run settings and the dataset -> task catalogue from TOML files.

use indexmap::IndexMap;
use metaeval::{FailurePolicy, PromptMode, RunOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// Dataset name -> task label
    #[serde(default = "default_tasks")]
    pub tasks: IndexMap<String, String>,
    #[serde(default)]
    pub models: ModelsConfig,
}

/// How the prompting mode of a response file is chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModeSetting {
    /// Chain-of-thought when the additional prompt id mentions `cot`
    #[default]
    Auto,
    Direct,
    Cot,
}

/// Which discovered response files take part in a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResponseVariant {
    /// Files produced with the regular prompt
    #[default]
    Regular,
    /// Files produced with the chain-of-thought prompt
    Cot,
    Any,
}

impl ResponseVariant {
    /// Whether a response file name belongs to this variant
    pub fn matches(&self, file_name: &str) -> bool {
        match self {
            ResponseVariant::Regular => file_name.contains("regular"),
            ResponseVariant::Cot => file_name.contains("cot"),
            ResponseVariant::Any => true,
        }
    }
}

/// Evaluation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Seed for the random fallback of unparseable responses
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub mode: ModeSetting,
    /// Stop at the first failed (metric, model) unit
    #[serde(default)]
    pub fail_fast: bool,
    #[serde(default)]
    pub response_variant: ResponseVariant,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            mode: ModeSetting::Auto,
            fail_fast: false,
            response_variant: ResponseVariant::Regular,
        }
    }
}

impl EvaluationConfig {
    /// Engine options for a run whose additional prompt id is `prompt_id`
    pub fn run_options(&self, prompt_id: Option<&str>) -> RunOptions {
        let mode = match self.mode {
            ModeSetting::Direct => PromptMode::Direct,
            ModeSetting::Cot => PromptMode::ChainOfThought,
            ModeSetting::Auto => match prompt_id {
                Some(id) if id.contains("cot") => PromptMode::ChainOfThought,
                _ => PromptMode::Direct,
            },
        };
        RunOptions {
            mode,
            seed: self.seed,
            failure_policy: if self.fail_fast {
                FailurePolicy::Abort
            } else {
                FailurePolicy::Continue
            },
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory holding response files; results go to `<results_dir>/eval`
    #[serde(default = "default_results_dir")]
    pub results_dir: String,
    #[serde(default = "default_true")]
    pub write_json: bool,
    #[serde(default = "default_true")]
    pub print_report: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            write_json: true,
            print_report: true,
        }
    }
}

/// Model file filtering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Response files whose names contain any of these are skipped
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            exclude: default_exclude(),
        }
    }
}

// Default value functions
fn default_true() -> bool { true }
fn default_seed() -> u64 { 42 }
fn default_results_dir() -> String { "results".to_string() }
fn default_exclude() -> Vec<String> { vec!["haiku".to_string()] }

fn default_tasks() -> IndexMap<String, String> {
    [
        ("cola", "Acceptability"),
        ("cola-grammar", "Acceptability"),
        ("dailydialog-acceptability", "Acceptability"),
        ("dices_990", "Toxicity \\ Safety"),
        ("dices_350_expert", "Toxicity \\ Safety"),
        ("dices_350_crowdsourced", "Toxicity \\ Safety"),
        ("newsroom", "Summarisation"),
        ("persona_chat", "Dialogue"),
        ("qags", "Summarisation"),
        ("roscoe-cosmos", "Reasoning"),
        ("roscoe-drop", "Reasoning"),
        ("roscoe-esnli", "Reasoning"),
        ("roscoe-gsm8k", "Reasoning"),
        ("summeval", "Summarisation"),
        ("switchboard-acceptability", "Acceptability"),
        ("topical_chat", "Dialogue"),
        ("toxic_chat", "Toxicity \\ Safety"),
        ("wmt-human_en_de", "Translation"),
        ("wmt-human_zh_en", "Translation"),
        ("wmt-23_en_de", "Translation"),
        ("wmt-23_zh_en", "Translation"),
        ("inferential-strategies", "Reasoning"),
        ("medical-safety", "Toxicity \\ Safety"),
        ("recipe_crowd_sourcing_data", "Planning"),
        ("llmbar-natural", "Instruction Following"),
        ("llmbar-adversarial", "Instruction Following"),
    ]
    .into_iter()
    .map(|(d, t)| (d.to_string(), t.to_string()))
    .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            evaluation: EvaluationConfig::default(),
            output: OutputConfig::default(),
            tasks: default_tasks(),
            models: ModelsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from default config location or return defaults
    pub fn load_or_default() -> Self {
        let config_paths = [
            "config/agreement.toml",
            "../config/agreement.toml",
            "agreement-benchmark/config/agreement.toml",
        ];

        for path in &config_paths {
            if let Ok(config) = Self::from_file(path) {
                tracing::info!("Loaded configuration from {}", path);
                return config;
            }
        }

        tracing::info!("Using default configuration");
        Self::default()
    }

    /// Save configuration to a TOML file
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        fs::write(path, content)
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }

    /// Task label of a dataset, trying `_` and `-` spellings of the name
    pub fn task_for(&self, dataset: &str) -> Option<&str> {
        [
            dataset.to_string(),
            dataset.replace('_', "-"),
            dataset.replace('-', "_"),
        ]
        .iter()
        .find_map(|name| self.tasks.get(name))
        .map(String::as_str)
    }

    /// Dataset names in catalogue order
    pub fn dataset_names(&self) -> Vec<&str> {
        self.tasks.keys().map(String::as_str).collect()
    }
}

/// Configuration errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    Io(String),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}
