//! Agreement benchmark for LLM judges
//!
//! Loads stored model responses for human-annotated datasets, evaluates them
//! with [`metaeval`] and writes one result file per dataset.
//!
//! # Example
//!
//! ```no_run
//! use agreement_benchmark::{config::Config, loader, reporting, runner};
//!
//! let config = Config::load_or_default();
//! let files = loader::discover_response_files(
//!     &config.output.results_dir,
//!     "summeval",
//!     None,
//!     config.evaluation.response_variant,
//!     &config.models.exclude,
//! )?;
//! let evaluation = runner::evaluate_files("summeval", &files, &config)?;
//! reporting::print_console_report(&evaluation);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod loader;
pub mod reporting;
pub mod runner;

pub use config::Config;
