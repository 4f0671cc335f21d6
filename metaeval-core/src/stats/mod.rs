//! Agreement statistics

pub mod correlation;
pub mod kappa;
pub mod krippendorff;
mod special;

pub use correlation::{kendall, pearson, rank, spearman, Correlation};
pub use kappa::cohen_kappa;
pub use krippendorff::{alpha, reliability};
