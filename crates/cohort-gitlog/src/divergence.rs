//! Branch comparison and per-author contribution rollups.
//!
//! Compares a subject's target branch against its default branch: when the
//! two are the same branch the full log is analyzed, otherwise only the
//! commits reachable from the target and not from the default.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use cohort_core::{CohortError, MissingBranch};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::identity::{IdentityResolver, NoResolver};
use crate::parser::{CommitLogParser, CommitRecord};

/// Version-control queries the aggregator needs.
///
/// Log text must be in the layout the aggregator's [`CommitLogParser`]
/// expects. [`crate::backend::GitCli`] is the git-backed implementation.
pub trait HistorySource {
    /// Whether `branch` resolves to an existing ref.
    fn branch_exists(&self, branch: &str) -> Result<bool, CohortError>;

    /// Raw log text for every commit reachable from `branch`.
    fn full_log(&self, branch: &str) -> Result<String, CohortError>;

    /// Raw log text for commits reachable from `tip` but not from `base`.
    fn range_log(&self, base: &str, tip: &str) -> Result<String, CohortError>;

    /// Number of commits reachable from `branch`.
    fn commit_count(&self, branch: &str) -> Result<u64, CohortError>;
}

/// Contribution totals for one canonical author.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use cohort_gitlog::divergence::ContributorStat;
///
/// let stat = ContributorStat {
///     author_handle: "alice".into(),
///     display_names: BTreeSet::from(["Alice".to_string(), "alice".to_string()]),
///     total_commits: 3,
///     total_additions: 40,
///     total_deletions: 7,
/// };
/// assert_eq!(stat.display_names.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributorStat {
    /// Canonical identity.
    pub author_handle: String,
    /// Raw author strings that resolved to this handle.
    pub display_names: BTreeSet<String>,
    /// Commits authored under any of `display_names`.
    pub total_commits: u64,
    /// Approximate lines added (stat-graph counts).
    pub total_additions: u64,
    /// Approximate lines deleted (stat-graph counts).
    pub total_deletions: u64,
}

/// Outcome of comparing a target branch against the default branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchComparison {
    pub default_branch: String,
    pub target_branch: String,
    /// Commits in the analyzed log: the whole branch, or the delta.
    pub commits_on_target_branch: u64,
    /// Full commit count of the default branch, used as a denominator.
    pub commits_on_default_branch: u64,
    /// Commit blocks in the analyzed log that failed to parse.
    pub skipped_blocks: usize,
    /// Parsed commits, newest first.
    pub history: Vec<CommitRecord>,
    /// Per-author rollups over `history`.
    pub contributions: Vec<ContributorStat>,
}

impl BranchComparison {
    /// `true` when `history` is the full branch log rather than a delta.
    pub fn is_full_log(&self) -> bool {
        self.default_branch == self.target_branch
    }
}

/// Compares branches through a [`HistorySource`] and rolls up contributions.
///
/// # Examples
///
/// ```
/// use cohort_gitlog::divergence::BranchDivergenceAggregator;
/// use cohort_gitlog::parser::CommitLogParser;
///
/// let aggregator = BranchDivergenceAggregator::new(CommitLogParser::default());
/// assert_eq!(aggregator.parser().format().delimiter, "##");
/// ```
#[derive(Clone)]
pub struct BranchDivergenceAggregator {
    parser: CommitLogParser,
    resolver: Arc<dyn IdentityResolver + Send + Sync>,
}

impl BranchDivergenceAggregator {
    /// Aggregator where every display name is its own handle.
    pub fn new(parser: CommitLogParser) -> Self {
        Self {
            parser,
            resolver: Arc::new(NoResolver),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn IdentityResolver + Send + Sync>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn parser(&self) -> &CommitLogParser {
        &self.parser
    }

    /// Compare `target_branch` against `default_branch`.
    ///
    /// # Errors
    ///
    /// Returns [`CohortError::MissingBranch`] naming `default`, `target` or
    /// `both` when refs do not resolve, or any error from `source`.
    pub fn aggregate(
        &self,
        source: &dyn HistorySource,
        default_branch: &str,
        target_branch: &str,
    ) -> Result<BranchComparison, CohortError> {
        let same_branch = default_branch == target_branch;

        let default_exists = source.branch_exists(default_branch)?;
        let target_exists = if same_branch {
            default_exists
        } else {
            source.branch_exists(target_branch)?
        };
        if let Some(missing) = MissingBranch::from_flags(!default_exists, !target_exists) {
            warn!(
                default_branch,
                target_branch,
                %missing,
                "branch comparison refs do not resolve"
            );
            return Err(CohortError::MissingBranch(missing));
        }

        let raw = if same_branch {
            source.full_log(default_branch)?
        } else {
            source.range_log(default_branch, target_branch)?
        };
        let parsed = self.parser.parse(&raw);
        let commits_on_default_branch = source.commit_count(default_branch)?;

        debug!(
            default_branch,
            target_branch,
            commits = parsed.commits.len(),
            skipped = parsed.skipped_blocks,
            "aggregated branch history"
        );

        let contributions = contributions(&parsed.commits, self.resolver.as_ref());
        Ok(BranchComparison {
            default_branch: default_branch.to_string(),
            target_branch: target_branch.to_string(),
            commits_on_target_branch: parsed.total_blocks() as u64,
            commits_on_default_branch,
            skipped_blocks: parsed.skipped_blocks,
            history: parsed.commits,
            contributions,
        })
    }
}

/// Group commits by display name, then merge names that resolve to the
/// same handle.
///
/// Sorted by commit count descending, then handle.
///
/// # Examples
///
/// ```
/// use cohort_gitlog::divergence::contributions;
/// use cohort_gitlog::identity::NoResolver;
///
/// assert!(contributions(&[], &NoResolver).is_empty());
/// ```
pub fn contributions(
    commits: &[CommitRecord],
    resolver: &(dyn IdentityResolver + Send + Sync),
) -> Vec<ContributorStat> {
    let mut by_name: BTreeMap<&str, (u64, u64, u64)> = BTreeMap::new();
    for commit in commits {
        let entry = by_name.entry(commit.author.as_str()).or_default();
        entry.0 += 1;
        entry.1 += commit.additions();
        entry.2 += commit.deletions();
    }

    let mut by_handle: BTreeMap<String, ContributorStat> = BTreeMap::new();
    for (name, (count, additions, deletions)) in by_name {
        let handle = resolver.resolve(name).unwrap_or_else(|| name.to_string());
        let stat = by_handle
            .entry(handle.clone())
            .or_insert_with(|| ContributorStat {
                author_handle: handle,
                display_names: BTreeSet::new(),
                total_commits: 0,
                total_additions: 0,
                total_deletions: 0,
            });
        stat.display_names.insert(name.to_string());
        stat.total_commits += count;
        stat.total_additions += additions;
        stat.total_deletions += deletions;
    }

    let mut stats: Vec<ContributorStat> = by_handle.into_values().collect();
    stats.sort_by(|a, b| {
        b.total_commits
            .cmp(&a.total_commits)
            .then_with(|| a.author_handle.cmp(&b.author_handle))
    });
    stats
}
