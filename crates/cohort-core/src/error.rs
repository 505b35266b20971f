use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Errors that can occur across the cohort ranking workspace.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary renders it through `miette` at the boundary.
///
/// # Examples
///
/// ```
/// use cohort_core::CohortError;
///
/// let err = CohortError::Config("missing metric table".into());
/// assert!(err.to_string().contains("missing metric table"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum CohortError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    #[diagnostic(code(cohort::io))]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(code(cohort::config), help("check your .cohort.toml"))]
    Config(String),

    /// Git operation failure.
    #[error("git error: {0}")]
    #[diagnostic(code(cohort::git))]
    Git(String),

    /// Raw log text could not be interpreted.
    #[error("parse error: {0}")]
    #[diagnostic(code(cohort::parse))]
    Parse(String),

    /// One or both branches of a comparison do not resolve to a ref.
    #[error("missing branch: {0}")]
    #[diagnostic(
        code(cohort::missing_branch),
        help("fetch the branch or fix default_branch/target_branch for this subject")
    )]
    MissingBranch(MissingBranch),

    /// A metric had no non-null samples, so no distribution exists.
    #[error("no samples for metric '{0}'")]
    #[diagnostic(code(cohort::empty_distribution))]
    EmptyDistribution(String),

    /// The external analysis tool failed or produced unusable output.
    #[error("analysis error: {0}")]
    #[diagnostic(code(cohort::analysis))]
    Analysis(String),

    /// A time-boxed operation ran past its deadline.
    #[error("timed out after {0}s")]
    #[diagnostic(code(cohort::timeout))]
    Timeout(u64),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    #[diagnostic(code(cohort::serialization))]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(cohort::toml))]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    #[diagnostic(code(cohort::file_not_found))]
    FileNotFound(PathBuf),
}

/// Which side of a branch comparison failed to resolve.
///
/// # Examples
///
/// ```
/// use cohort_core::MissingBranch;
///
/// assert_eq!(MissingBranch::from_flags(true, false), Some(MissingBranch::Default));
/// assert_eq!(MissingBranch::from_flags(false, false), None);
/// assert_eq!(MissingBranch::Both.to_string(), "both");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingBranch {
    /// Only the default branch is missing.
    Default,
    /// Only the target branch is missing.
    Target,
    /// Neither branch resolves.
    Both,
}

impl MissingBranch {
    /// Combine per-branch "is missing" flags into a single outcome.
    pub fn from_flags(default_missing: bool, target_missing: bool) -> Option<Self> {
        match (default_missing, target_missing) {
            (true, true) => Some(MissingBranch::Both),
            (true, false) => Some(MissingBranch::Default),
            (false, true) => Some(MissingBranch::Target),
            (false, false) => None,
        }
    }
}

impl fmt::Display for MissingBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingBranch::Default => write!(f, "default"),
            MissingBranch::Target => write!(f, "target"),
            MissingBranch::Both => write!(f, "both"),
        }
    }
}
