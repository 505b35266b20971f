//! Core types, configuration, and error handling for cohort ranking.
//!
//! This crate provides the shared foundation used by all other cohort crates:
//! - [`CohortError`]: unified error type using `thiserror`
//! - [`CohortConfig`]: configuration loaded from `.cohort.toml`
//! - Shared types: [`MetricTable`], [`MetricSpec`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{AnalysisConfig, BatchConfig, CohortConfig, LogFormat, SubjectConfig};
pub use error::{CohortError, MissingBranch};
pub use types::{MetricSpec, MetricTable, OutputFormat};

/// A convenience `Result` type for cohort operations.
pub type Result<T> = std::result::Result<T, CohortError>;
