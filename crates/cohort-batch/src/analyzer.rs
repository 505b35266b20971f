//! Boundary to the external static-analysis tool.
//!
//! The tool itself (complexity, maintainability, Halstead) is outside this
//! workspace. It is run once per subject and must print a JSON object of
//! metric name to number or null on stdout.

use std::collections::BTreeMap;
use std::process::Stdio;

use async_trait::async_trait;
use cohort_core::{AnalysisConfig, CohortError, SubjectConfig};
use tokio::process::Command;
use tracing::debug;

/// Raw measurements for one subject, keyed by metric name.
pub type Measurements = BTreeMap<String, Option<f64>>;

/// Produces metric samples for one subject.
#[async_trait]
pub trait MetricAnalyzer: Send + Sync {
    async fn analyze(&self, subject: &SubjectConfig) -> Result<Measurements, CohortError>;
}

/// Runs the configured analysis command in a child process.
///
/// `{path}` in any argument is replaced with the subject's checkout path.
/// The child is killed if the returned future is dropped, so wrapping
/// [`MetricAnalyzer::analyze`] in a timeout leaves no stray processes.
///
/// # Examples
///
/// ```
/// use cohort_core::AnalysisConfig;
/// use cohort_batch::analyzer::CommandAnalyzer;
///
/// let config = AnalysisConfig { command: vec!["metrics-tool".into(), "{path}".into()] };
/// assert!(CommandAnalyzer::from_config(&config).is_ok());
/// assert!(CommandAnalyzer::from_config(&AnalysisConfig::default()).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct CommandAnalyzer {
    program: String,
    args: Vec<String>,
}

impl CommandAnalyzer {
    /// # Errors
    ///
    /// Returns [`CohortError::Config`] when no command is configured.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, CohortError> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| CohortError::Config("analysis.command is empty".into()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn args_for(&self, subject: &SubjectConfig) -> Vec<String> {
        let path = subject.path.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace("{path}", &path))
            .collect()
    }
}

#[async_trait]
impl MetricAnalyzer for CommandAnalyzer {
    async fn analyze(&self, subject: &SubjectConfig) -> Result<Measurements, CohortError> {
        let args = self.args_for(subject);
        debug!(subject = %subject.id, program = %self.program, ?args, "running analysis");

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CohortError::Analysis(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CohortError::Analysis(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        parse_measurements(&output.stdout)
    }
}

/// Parse the tool's stdout: a JSON object of metric name to number or null.
///
/// # Errors
///
/// Returns [`CohortError::Analysis`] if stdout is not such an object.
///
/// # Examples
///
/// ```
/// use cohort_batch::analyzer::parse_measurements;
///
/// let m = parse_measurements(br#"{"cc": 2.5, "mi": null}"#).unwrap();
/// assert_eq!(m["cc"], Some(2.5));
/// assert_eq!(m["mi"], None);
/// ```
pub fn parse_measurements(stdout: &[u8]) -> Result<Measurements, CohortError> {
    serde_json::from_slice(stdout)
        .map_err(|e| CohortError::Analysis(format!("analysis output is not a metric object: {e}")))
}
