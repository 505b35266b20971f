//! Git-backed [`HistorySource`] for a local clone.
//!
//! Ref resolution and commit counting go through git2. Log text comes from
//! the `git` binary, because the parser consumes its `--raw`/`--stat`
//! layout.

use std::path::{Path, PathBuf};
use std::process::Command;

use cohort_core::{CohortError, LogFormat};
use git2::{ErrorCode, Repository};
use tracing::debug;

use crate::divergence::HistorySource;

/// Width handed to `--stat-width`/`--stat-name-width` so paths are never
/// abbreviated with `...`, which would break the join with raw lines.
const STAT_WIDTH: &str = "1000";

/// Reads history from the repository at `repo_path`.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use cohort_core::LogFormat;
/// use cohort_gitlog::backend::GitCli;
/// use cohort_gitlog::divergence::HistorySource;
///
/// let git = GitCli::new(Path::new("."), LogFormat::default());
/// let count = git.commit_count("main").unwrap();
/// println!("{count} commits on main");
/// ```
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_path: PathBuf,
    format: LogFormat,
}

impl GitCli {
    pub fn new(repo_path: &Path, format: LogFormat) -> Self {
        Self {
            repo_path: repo_path.to_path_buf(),
            format,
        }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    fn open(&self) -> Result<Repository, CohortError> {
        Repository::open(&self.repo_path)
            .map_err(|e| CohortError::Git(format!("failed to open repository: {e}")))
    }

    fn log(&self, revision: &str) -> Result<String, CohortError> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo_path)
            .args(["-c", "core.quotePath=false", "log", "--no-color", "-M", "--raw"])
            .arg(format!("--format={}", self.format.pretty()))
            .arg("--stat")
            .arg(format!("--stat-width={STAT_WIDTH}"))
            .arg(format!("--stat-name-width={STAT_WIDTH}"))
            .arg(revision)
            .arg("--")
            .output()
            .map_err(|e| CohortError::Git(format!("failed to run git log: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CohortError::Git(format!(
                "git log {revision} failed: {}",
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(
            repo = %self.repo_path.display(),
            revision,
            bytes = text.len(),
            "fetched log text"
        );
        Ok(text)
    }
}

impl HistorySource for GitCli {
    fn branch_exists(&self, branch: &str) -> Result<bool, CohortError> {
        let repo = self.open()?;
        let resolved = repo.resolve_reference_from_short_name(branch).map(|_| ());
        match resolved {
            Ok(()) => Ok(true),
            Err(e) if matches!(e.code(), ErrorCode::NotFound | ErrorCode::InvalidSpec) => {
                Ok(false)
            }
            Err(e) => Err(CohortError::Git(format!(
                "failed to resolve branch '{branch}': {e}"
            ))),
        }
    }

    fn full_log(&self, branch: &str) -> Result<String, CohortError> {
        self.log(branch)
    }

    fn range_log(&self, base: &str, tip: &str) -> Result<String, CohortError> {
        self.log(&format!("{base}..{tip}"))
    }

    fn commit_count(&self, branch: &str) -> Result<u64, CohortError> {
        let repo = self.open()?;
        let commit = repo
            .resolve_reference_from_short_name(branch)
            .and_then(|reference| reference.peel_to_commit())
            .map_err(|e| CohortError::Git(format!("failed to resolve branch '{branch}': {e}")))?;

        let mut revwalk = repo
            .revwalk()
            .map_err(|e| CohortError::Git(format!("failed to create revwalk: {e}")))?;
        revwalk
            .push(commit.id())
            .map_err(|e| CohortError::Git(format!("failed to push oid: {e}")))?;

        let mut count = 0u64;
        for oid in revwalk {
            oid.map_err(|e| CohortError::Git(format!("revwalk error: {e}")))?;
            count += 1;
        }
        Ok(count)
    }
}
