//! Agreement Benchmark CLI

use std::path::PathBuf;

use chrono::Local;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use agreement_benchmark::{
    config::{Config, ModeSetting},
    loader::discover_response_files,
    reporting::{print_console_report, print_unresolved, result_path, write_results},
    runner::{evaluate_files, evaluate_single_file},
};
use metaeval::DatasetEvaluation;

#[derive(Parser)]
#[command(name = "agreement-benchmark")]
#[command(about = "Evaluate LLM judge responses against human judgements")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate stored model responses
    Evaluate {
        /// Path to a single model responses file (JSON)
        #[arg(long)]
        responses_file: Option<PathBuf>,

        /// Directory holding response files
        #[arg(long)]
        results_dir: Option<PathBuf>,

        /// Dataset to evaluate (default: every dataset in the catalogue)
        #[arg(short, long)]
        dataset: Option<String>,

        /// Only evaluate the newest responses file of this model
        #[arg(short, long)]
        model: Option<String>,

        /// Prompting mode of the responses
        #[arg(long, value_enum)]
        mode: Option<ModeSetting>,

        /// Seed for the random fallback of unparseable responses
        #[arg(long)]
        seed: Option<u64>,

        /// Stop at the first failure
        #[arg(long)]
        fail_fast: bool,

        /// Print the report without writing result files
        #[arg(long)]
        no_write: bool,
    },

    /// List datasets and their task labels
    ListDatasets,

    /// Generate sample configuration
    InitConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config/agreement.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("agreement_benchmark=debug,metaeval=debug,info")
    } else {
        EnvFilter::new("agreement_benchmark=info,metaeval=warn,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load_or_default(),
    };

    match cli.command {
        Commands::Evaluate {
            responses_file,
            results_dir,
            dataset,
            model,
            mode,
            seed,
            fail_fast,
            no_write,
        } => {
            if let Some(dir) = results_dir {
                config.output.results_dir = dir.display().to_string();
            }
            if let Some(mode) = mode {
                config.evaluation.mode = mode;
            }
            if let Some(seed) = seed {
                config.evaluation.seed = seed;
            }
            config.evaluation.fail_fast |= fail_fast;
            if no_write {
                config.output.write_json = false;
            }
            run_evaluation(&config, responses_file, dataset, model, cli.verbose)?;
        }

        Commands::ListDatasets => {
            list_datasets(&config);
        }

        Commands::InitConfig { output } => {
            init_config(output)?;
        }
    }

    Ok(())
}

fn run_evaluation(
    config: &Config,
    responses_file: Option<PathBuf>,
    dataset: Option<String>,
    model: Option<String>,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = responses_file {
        println!("\nevaluating responses from {}", path.display());
        let evaluation = evaluate_single_file(&path, config)?;
        finish(config, &evaluation, verbose)?;
        return Ok(());
    }

    let datasets: Vec<String> = match dataset {
        Some(d) => vec![d],
        None => config.dataset_names().iter().map(|d| d.to_string()).collect(),
    };

    for dataset in &datasets {
        println!("\nevaluating responses for [{}] dataset from models:", dataset);
        let files = match discover_response_files(
            &config.output.results_dir,
            dataset,
            model.as_deref(),
            config.evaluation.response_variant,
            &config.models.exclude,
        ) {
            Ok(files) => files,
            Err(e) if config.evaluation.fail_fast || datasets.len() == 1 => return Err(e.into()),
            Err(e) => {
                tracing::warn!("{}", e);
                continue;
            }
        };

        let evaluation = evaluate_files(dataset, &files, config)?;
        finish(config, &evaluation, verbose)?;
    }

    Ok(())
}

fn finish(
    config: &Config,
    evaluation: &DatasetEvaluation,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if config.output.print_report {
        print_console_report(evaluation);
    }
    if verbose {
        print_unresolved(evaluation);
    }
    if config.output.write_json {
        let path = result_path(&config.output.results_dir, evaluation, Local::now().date_naive());
        write_results(evaluation, &path)?;
        println!("...complete. saved results to: {}", path.display());
    }
    Ok(())
}

fn list_datasets(config: &Config) {
    println!("Datasets ({}):", config.tasks.len());
    println!("{:-<60}", "");

    for (dataset, task) in &config.tasks {
        println!("  {:<32} | {}", dataset, task);
    }
}

fn init_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();

    // Ensure parent directory exists
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    config.save_toml(&output)?;
    println!("Configuration written to: {}", output.display());
    Ok(())
}
