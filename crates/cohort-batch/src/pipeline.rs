//! Two-pass cohort batch: collect every subject, then rank once.
//!
//! The collect pass runs subjects on a bounded worker pool. Each worker
//! holds a semaphore permit, waits on the shared rate limiter, builds the
//! branch comparison on a blocking thread, and runs the time-boxed analysis.
//! Nothing a single subject does can fail the batch: missing branches,
//! history errors, analysis errors, timeouts and panics are recorded on
//! that subject's outcome and its samples become null.
//!
//! The rank pass starts only after every worker has joined, because each
//! metric's distribution needs the whole cohort.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cohort_core::{
    CohortConfig, CohortError, LogFormat, MetricTable, MissingBranch, SubjectConfig,
};
use cohort_gitlog::backend::GitCli;
use cohort_gitlog::divergence::{BranchComparison, BranchDivergenceAggregator};
use cohort_gitlog::identity::HandleMap;
use cohort_gitlog::parser::CommitLogParser;
use cohort_ranking::cohort::{rank_cohort, CohortReport, MetricFeed};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::analyzer::{Measurements, MetricAnalyzer};
use crate::limiter::RateLimiter;

/// Builds one subject's branch comparison. Called on a blocking thread.
pub trait HistoryProvider: Send + Sync {
    fn compare(&self, subject: &SubjectConfig) -> Result<BranchComparison, CohortError>;
}

/// [`HistoryProvider`] over local git clones.
pub struct GitHistoryProvider {
    aggregator: BranchDivergenceAggregator,
    format: LogFormat,
}

impl GitHistoryProvider {
    /// Uses the configured log format, and `[identities]` when present.
    pub fn from_config(config: &CohortConfig) -> Self {
        let mut aggregator =
            BranchDivergenceAggregator::new(CommitLogParser::new(config.log.clone()));
        if !config.identities.is_empty() {
            aggregator =
                aggregator.with_resolver(Arc::new(HandleMap::new(config.identities.clone())));
        }
        Self {
            aggregator,
            format: config.log.clone(),
        }
    }
}

impl HistoryProvider for GitHistoryProvider {
    fn compare(&self, subject: &SubjectConfig) -> Result<BranchComparison, CohortError> {
        let git = GitCli::new(&subject.path, self.format.clone());
        self.aggregator
            .aggregate(&git, &subject.default_branch, &subject.target_branch)
    }
}

/// Why part of a subject's work produced no data.
///
/// # Examples
///
/// ```
/// use cohort_batch::pipeline::SubjectFailure;
///
/// let failure = SubjectFailure::Timeout { seconds: 120 };
/// assert_eq!(failure.to_string(), "analysis timed out after 120s");
/// let json = serde_json::to_value(&failure).unwrap();
/// assert_eq!(json["kind"], "timeout");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SubjectFailure {
    MissingBranch { which: MissingBranch },
    History { message: String },
    Analysis { message: String },
    Timeout { seconds: u64 },
    /// The worker task panicked or was cancelled.
    Task { message: String },
}

impl fmt::Display for SubjectFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectFailure::MissingBranch { which } => write!(f, "missing branch: {which}"),
            SubjectFailure::History { message } => write!(f, "history failed: {message}"),
            SubjectFailure::Analysis { message } => write!(f, "analysis failed: {message}"),
            SubjectFailure::Timeout { seconds } => {
                write!(f, "analysis timed out after {seconds}s")
            }
            SubjectFailure::Task { message } => write!(f, "worker failed: {message}"),
        }
    }
}

/// Everything the collect pass learned about one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectOutcome {
    pub subject: String,
    pub history: Option<BranchComparison>,
    pub failures: Vec<SubjectFailure>,
}

impl SubjectOutcome {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result of a full batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// One outcome per subject, in input order.
    pub subjects: Vec<SubjectOutcome>,
    /// Samples gathered by the collect pass.
    pub feed: MetricFeed,
    pub ranking: CohortReport,
}

impl BatchReport {
    pub fn failed_subjects(&self) -> impl Iterator<Item = &SubjectOutcome> {
        self.subjects.iter().filter(|s| !s.is_clean())
    }
}

/// Drives the collect and rank passes over a cohort.
pub struct BatchRunner {
    history: Arc<dyn HistoryProvider>,
    analyzer: Arc<dyn MetricAnalyzer>,
    table: MetricTable,
    workers: Arc<Semaphore>,
    limiter: Arc<RateLimiter>,
    analysis_timeout: Duration,
    progress: Option<ProgressBar>,
}

impl BatchRunner {
    pub fn new(
        config: &CohortConfig,
        history: Arc<dyn HistoryProvider>,
        analyzer: Arc<dyn MetricAnalyzer>,
    ) -> Self {
        Self {
            history,
            analyzer,
            table: config.metric_table(),
            workers: Arc::new(Semaphore::new(config.batch.max_workers.max(1))),
            limiter: Arc::new(RateLimiter::from_config(&config.batch)),
            analysis_timeout: Duration::from_secs(config.batch.analysis_timeout_secs),
            progress: None,
        }
    }

    /// Tick `progress` once per finished subject.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Collect pass: process every subject and gather samples.
    ///
    /// Every subject appears in the feed with every table metric, null
    /// when it could not be measured.
    ///
    /// # Errors
    ///
    /// Returns [`CohortError::Config`] when two subjects share an id.
    pub async fn collect(
        &self,
        subjects: &[SubjectConfig],
    ) -> Result<(Vec<SubjectOutcome>, MetricFeed), CohortError> {
        let mut seen = BTreeSet::new();
        for subject in subjects {
            if !seen.insert(subject.id.as_str()) {
                return Err(CohortError::Config(format!(
                    "duplicate subject id '{}'",
                    subject.id
                )));
            }
        }

        info!(subjects = subjects.len(), "collect phase started");
        if let Some(progress) = &self.progress {
            progress.set_length(subjects.len() as u64);
        }

        let mut join_set = JoinSet::new();
        for (idx, subject) in subjects.iter().cloned().enumerate() {
            let workers = Arc::clone(&self.workers);
            let limiter = Arc::clone(&self.limiter);
            let history = Arc::clone(&self.history);
            let analyzer = Arc::clone(&self.analyzer);
            let timeout = self.analysis_timeout;
            join_set.spawn(async move {
                let _permit = workers.acquire_owned().await;
                limiter.acquire().await;
                let result = process_subject(subject, history, analyzer, timeout).await;
                (idx, result)
            });
        }

        let mut slots: Vec<Option<(SubjectOutcome, Measurements)>> = vec![None; subjects.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, result)) => slots[idx] = Some(result),
                Err(e) => warn!(error = %e, "subject worker did not finish"),
            }
            if let Some(progress) = &self.progress {
                progress.inc(1);
            }
        }

        let mut outcomes = Vec::with_capacity(subjects.len());
        let mut feed = MetricFeed::default();
        for (subject, slot) in subjects.iter().zip(slots) {
            let (outcome, measurements) = slot.unwrap_or_else(|| {
                (
                    SubjectOutcome {
                        subject: subject.id.clone(),
                        history: None,
                        failures: vec![SubjectFailure::Task {
                            message: "worker panicked or was cancelled".into(),
                        }],
                    },
                    Measurements::new(),
                )
            });

            feed.add_subject(&subject.id);
            for metric in self.table.names() {
                let value = measurements.get(metric).copied().flatten();
                feed.insert(&subject.id, metric, value);
            }
            outcomes.push(outcome);
        }

        if let Some(progress) = &self.progress {
            progress.finish_and_clear();
        }
        info!(
            subjects = outcomes.len(),
            failed = outcomes.iter().filter(|o| !o.is_clean()).count(),
            "collect phase finished"
        );
        Ok((outcomes, feed))
    }

    /// Collect every subject, then rank the cohort.
    ///
    /// # Errors
    ///
    /// Returns [`CohortError::Config`] when two subjects share an id.
    pub async fn run(&self, subjects: &[SubjectConfig]) -> Result<BatchReport, CohortError> {
        let (outcomes, feed) = self.collect(subjects).await?;
        info!(metrics = self.table.len(), "rank phase started");
        let ranking = rank_cohort(&feed, &self.table);
        Ok(BatchReport {
            subjects: outcomes,
            feed,
            ranking,
        })
    }
}

async fn process_subject(
    subject: SubjectConfig,
    history: Arc<dyn HistoryProvider>,
    analyzer: Arc<dyn MetricAnalyzer>,
    timeout: Duration,
) -> (SubjectOutcome, Measurements) {
    let mut failures = Vec::new();
    debug!(subject = %subject.id, path = %subject.path.display(), "processing subject");

    let blocking_subject = subject.clone();
    let comparison =
        match tokio::task::spawn_blocking(move || history.compare(&blocking_subject)).await {
            Ok(Ok(comparison)) => Some(comparison),
            Ok(Err(CohortError::MissingBranch(which))) => {
                warn!(subject = %subject.id, %which, "missing branch");
                failures.push(SubjectFailure::MissingBranch { which });
                None
            }
            Ok(Err(e)) => {
                warn!(subject = %subject.id, error = %e, "history failed");
                failures.push(SubjectFailure::History {
                    message: e.to_string(),
                });
                None
            }
            Err(e) => {
                warn!(subject = %subject.id, error = %e, "history task failed");
                failures.push(SubjectFailure::Task {
                    message: e.to_string(),
                });
                None
            }
        };

    // The checkout cannot stand for a branch that failed to resolve, so its
    // metrics would rank the wrong code.
    if comparison.is_none() {
        debug!(subject = %subject.id, "skipping analysis after history failure");
        let outcome = SubjectOutcome {
            subject: subject.id,
            history: None,
            failures,
        };
        return (outcome, Measurements::new());
    }

    let analysis = tokio::time::timeout(timeout, analyzer.analyze(&subject))
        .await
        .unwrap_or(Err(CohortError::Timeout(timeout.as_secs())));
    let measurements = match analysis {
        Ok(measurements) => measurements,
        Err(CohortError::Timeout(seconds)) => {
            warn!(subject = %subject.id, seconds, "analysis timed out");
            failures.push(SubjectFailure::Timeout { seconds });
            Measurements::new()
        }
        Err(e) => {
            warn!(subject = %subject.id, error = %e, "analysis failed");
            failures.push(SubjectFailure::Analysis {
                message: e.to_string(),
            });
            Measurements::new()
        }
    };

    let outcome = SubjectOutcome {
        subject: subject.id,
        history: comparison,
        failures,
    };
    (outcome, measurements)
}
