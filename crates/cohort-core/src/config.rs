use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CohortError;
use crate::types::MetricTable;

/// Top-level configuration loaded from `.cohort.toml`.
///
/// Every section has defaults, so an empty file is a valid configuration.
/// The loaded value is passed explicitly to whatever needs it; nothing in
/// the workspace reads configuration from global state.
///
/// # Examples
///
/// ```
/// use cohort_core::CohortConfig;
///
/// let config = CohortConfig::default();
/// assert_eq!(config.batch.max_workers, 4);
/// assert_eq!(config.log.delimiter, "##");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohortConfig {
    /// Commit log text format.
    #[serde(default)]
    pub log: LogFormat,
    /// Worker pool and rate limiting.
    #[serde(default)]
    pub batch: BatchConfig,
    /// External static-analysis tool.
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Metric table; empty means [`MetricTable::builtin`].
    #[serde(default)]
    pub metrics: MetricTable,
    /// Raw author display name to canonical handle.
    #[serde(default)]
    pub identities: BTreeMap<String, String>,
    /// Cohort members processed by `cohort run`.
    #[serde(default)]
    pub subjects: Vec<SubjectConfig>,
}

impl CohortConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CohortError::Io`] if the file cannot be read, or
    /// [`CohortError::Toml`] if the content is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, CohortError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`CohortError::Toml`] if parsing fails, or
    /// [`CohortError::Config`] if a value is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use cohort_core::CohortConfig;
    ///
    /// let toml = r#"
    /// [batch]
    /// max_workers = 8
    /// "#;
    /// let config = CohortConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.batch.max_workers, 8);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, CohortError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// The metric table to rank against.
    pub fn metric_table(&self) -> MetricTable {
        if self.metrics.is_empty() {
            MetricTable::builtin()
        } else {
            self.metrics.clone()
        }
    }

    fn validate(&self) -> Result<(), CohortError> {
        if self.log.boundary.is_empty() || self.log.delimiter.is_empty() {
            return Err(CohortError::Config(
                "log.boundary and log.delimiter must be non-empty".into(),
            ));
        }
        if self.batch.max_workers == 0 {
            return Err(CohortError::Config("batch.max_workers must be at least 1".into()));
        }
        if self.batch.rate_limit == 0 || self.batch.rate_window_secs == 0 {
            return Err(CohortError::Config(
                "batch.rate_limit and batch.rate_window_secs must be at least 1".into(),
            ));
        }
        if self.batch.analysis_timeout_secs == 0 {
            return Err(CohortError::Config(
                "batch.analysis_timeout_secs must be at least 1".into(),
            ));
        }
        for subject in &self.subjects {
            if subject.id.trim().is_empty() {
                return Err(CohortError::Config("subject id must be non-empty".into()));
            }
        }
        Ok(())
    }
}

/// Markers used to lay out `git log` output for the commit log parser.
///
/// # Examples
///
/// ```
/// use cohort_core::LogFormat;
///
/// let format = LogFormat::default();
/// assert_eq!(format.pretty(), "**%H##%at##%an##%s");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFormat {
    /// Commit-boundary marker, recognised at the start of a line.
    #[serde(default = "default_boundary")]
    pub boundary: String,
    /// Header field delimiter between sha, timestamp, author and subject.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

impl LogFormat {
    /// The `--format=` argument that makes `git log` emit this layout.
    pub fn pretty(&self) -> String {
        let d = &self.delimiter;
        format!("{}%H{d}%at{d}%an{d}%s", self.boundary)
    }
}

fn default_boundary() -> String {
    "**".into()
}

fn default_delimiter() -> String {
    "##".into()
}

impl Default for LogFormat {
    fn default() -> Self {
        Self {
            boundary: default_boundary(),
            delimiter: default_delimiter(),
        }
    }
}

/// Batch execution settings.
///
/// # Examples
///
/// ```
/// use cohort_core::BatchConfig;
///
/// let config = BatchConfig::default();
/// assert_eq!(config.rate_limit, 5);
/// assert_eq!(config.rate_window_secs, 60);
/// assert_eq!(config.analysis_timeout_secs, 120);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum subjects processed concurrently (default: 4).
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Subjects admitted per rate window (default: 5).
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    /// Length of the rate window in seconds (default: 60).
    #[serde(default = "default_rate_window_secs")]
    pub rate_window_secs: u64,
    /// Deadline for one subject's analysis run (default: 120).
    #[serde(default = "default_analysis_timeout_secs")]
    pub analysis_timeout_secs: u64,
}

fn default_max_workers() -> usize {
    4
}

fn default_rate_limit() -> u32 {
    5
}

fn default_rate_window_secs() -> u64 {
    60
}

fn default_analysis_timeout_secs() -> u64 {
    120
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            rate_limit: default_rate_limit(),
            rate_window_secs: default_rate_window_secs(),
            analysis_timeout_secs: default_analysis_timeout_secs(),
        }
    }
}

/// External static-analysis command.
///
/// `{path}` in any argument is replaced with the subject's checkout path.
/// The command must print a JSON object of metric name to number or null.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub command: Vec<String>,
}

/// One cohort member.
///
/// # Examples
///
/// ```
/// use cohort_core::SubjectConfig;
///
/// let subject: SubjectConfig = toml::from_str(r#"
/// id = "alice"
/// path = "repos/alice"
/// "#).unwrap();
/// assert_eq!(subject.default_branch, "main");
/// assert_eq!(subject.target_branch, "main");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectConfig {
    /// Subject identifier used as the key in every output record.
    pub id: String,
    /// Path to a local clone of the subject's repository.
    pub path: PathBuf,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    /// Branch under evaluation; equal to `default_branch` for a full-log run.
    #[serde(default = "default_branch")]
    pub target_branch: String,
}

fn default_branch() -> String {
    "main".into()
}
