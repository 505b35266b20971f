//! Commit log text parsing.
//!
//! Turns the output of
//! `git log --format=<boundary>%H<d>%at<d>%an<d>%s --raw -M --stat` into
//! ordered [`CommitRecord`]s. Each block between boundary markers holds a
//! header line, raw change lines and stat lines. The upstream tool may
//! interleave the raw and stat sections, so lines are classified by shape
//! rather than by position.

use std::collections::HashMap;

use cohort_core::LogFormat;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One commit parsed from raw log text.
///
/// # Examples
///
/// ```
/// use cohort_gitlog::parser::CommitRecord;
///
/// let record = CommitRecord {
///     sha: "ae0a7365f5b3c2d1e0f9a8b7c6d5e4f3a2b1c0d9".into(),
///     timestamp: 1647421786,
///     author: "M. D. Ahwireng".into(),
///     message: "Adds template for server.js".into(),
///     file_changes: vec![],
/// };
/// assert_eq!(record.additions(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRecord {
    /// Full commit hash.
    pub sha: String,
    /// Author timestamp, seconds since the Unix epoch.
    #[serde(rename = "timestampEpoch")]
    pub timestamp: i64,
    /// Raw author display name as recorded in the commit.
    #[serde(rename = "authorDisplayName")]
    pub author: String,
    /// Subject line; may itself contain the header delimiter.
    pub message: String,
    /// Touched files, in raw-change order.
    pub file_changes: Vec<FileChange>,
}

impl CommitRecord {
    /// Approximate lines added across all files (see [`FileChange::additions`]).
    pub fn additions(&self) -> u64 {
        self.file_changes.iter().map(|f| f.additions).sum()
    }

    /// Approximate lines deleted across all files.
    pub fn deletions(&self) -> u64 {
        self.file_changes.iter().map(|f| f.deletions).sum()
    }
}

/// A single file change within a commit.
///
/// `additions` and `deletions` are counted from the `+`/`-` graph of the
/// stat line. Git scales that graph down to fit the terminal width for
/// large diffs, so above a few dozen lines these are proportional
/// estimates, not exact line counts.
///
/// # Examples
///
/// ```
/// use cohort_gitlog::parser::{ChangeStatus, FileChange};
///
/// let change = FileChange {
///     path: "old.rs".into(),
///     status: ChangeStatus::Renamed,
///     renamed_to: Some("new.rs".into()),
///     similarity: Some(86),
///     additions: 2,
///     deletions: 1,
/// };
/// assert_eq!(change.status, ChangeStatus::Renamed);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    /// File path; the pre-rename path for [`ChangeStatus::Renamed`].
    pub path: String,
    #[serde(rename = "changeStatus")]
    pub status: ChangeStatus,
    /// Post-rename path, present only for renames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renamed_to: Option<String>,
    /// Rename similarity index (0-100) when git reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<u8>,
    /// Approximate lines added.
    pub additions: u64,
    /// Approximate lines deleted.
    pub deletions: u64,
}

/// Status of a file change within a commit.
///
/// # Examples
///
/// ```
/// use cohort_gitlog::parser::ChangeStatus;
///
/// let status = ChangeStatus::Created;
/// assert_eq!(format!("{status:?}"), "Created");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    /// New file (`A`).
    Created,
    /// Existing file modified (`M`).
    Modified,
    /// File removed (`D`).
    Deleted,
    /// File moved to another path (`R` with optional similarity).
    Renamed,
}

/// Result of parsing one repository's log text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedLog {
    /// Commits in the order they appeared (newest first for `git log`).
    pub commits: Vec<CommitRecord>,
    /// Blocks dropped because their header was malformed.
    pub skipped_blocks: usize,
}

impl ParsedLog {
    /// Number of commit blocks seen, parsed or not.
    pub fn total_blocks(&self) -> usize {
        self.commits.len() + self.skipped_blocks
    }
}

/// Why a commit block was dropped.
#[derive(Debug, thiserror::Error, PartialEq)]
enum BlockError {
    #[error("no header line")]
    MissingHeader,
    #[error("header has {0} fields, expected 4")]
    FieldCount(usize),
    #[error("invalid sha '{0}'")]
    InvalidSha(String),
    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct StatCounts {
    additions: u64,
    deletions: u64,
}

#[derive(Debug, PartialEq)]
enum LineKind {
    Header,
    RawChange,
    Stat,
    Other,
}

/// Parser for commit log text in a configured [`LogFormat`].
///
/// # Examples
///
/// ```
/// use cohort_core::LogFormat;
/// use cohort_gitlog::parser::{ChangeStatus, CommitLogParser};
///
/// let raw = "**ae0a7365f5b3c2d1e0f9a8b7c6d5e4f3a2b1c0d9##1647421786##M. D. Ahwireng##Adds template for server.js\n\
///            :000000 100644 0000000 7b78207 A\tserver.js\n \
///            server.js | 18 ++++++++++++++++++\n";
/// let parsed = CommitLogParser::new(LogFormat::default()).parse(raw);
/// assert_eq!(parsed.commits.len(), 1);
/// let change = &parsed.commits[0].file_changes[0];
/// assert_eq!(change.status, ChangeStatus::Created);
/// assert_eq!(change.additions, 18);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CommitLogParser {
    format: LogFormat,
}

impl CommitLogParser {
    pub fn new(format: LogFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> &LogFormat {
        &self.format
    }

    /// Parse raw log text into commit records.
    ///
    /// Never fails as a whole: a block with a malformed header is dropped,
    /// logged at `warn`, and counted in [`ParsedLog::skipped_blocks`].
    pub fn parse(&self, raw: &str) -> ParsedLog {
        let mut parsed = ParsedLog::default();

        for (index, block) in self.split_blocks(raw).iter().enumerate() {
            match self.parse_block(block) {
                Ok(commit) => parsed.commits.push(commit),
                Err(reason) => {
                    warn!(block = index, %reason, "skipping malformed commit block");
                    parsed.skipped_blocks += 1;
                }
            }
        }

        debug!(
            commits = parsed.commits.len(),
            skipped = parsed.skipped_blocks,
            "parsed commit log"
        );
        parsed
    }

    /// Split on boundary markers at line starts. Text before the first
    /// marker is discarded.
    fn split_blocks<'a>(&self, raw: &'a str) -> Vec<Vec<&'a str>> {
        let mut blocks: Vec<Vec<&str>> = Vec::new();
        let mut preamble = 0usize;

        for line in raw.lines() {
            let line = line.trim_end_matches('\r');
            if let Some(rest) = line.strip_prefix(self.format.boundary.as_str()) {
                blocks.push(vec![rest]);
            } else if let Some(block) = blocks.last_mut() {
                block.push(line);
            } else if !line.trim().is_empty() {
                preamble += 1;
            }
        }

        if preamble > 0 {
            debug!(lines = preamble, "discarded text before first commit marker");
        }
        blocks
    }

    fn classify(&self, line: &str) -> LineKind {
        if line.contains(self.format.delimiter.as_str()) {
            LineKind::Header
        } else if is_raw_shape(line) {
            LineKind::RawChange
        } else if line.contains('|') {
            LineKind::Stat
        } else {
            LineKind::Other
        }
    }

    fn parse_block(&self, lines: &[&str]) -> Result<CommitRecord, BlockError> {
        let mut header: Option<&str> = None;
        let mut raw_changes: Vec<FileChange> = Vec::new();
        let mut stats: HashMap<String, StatCounts> = HashMap::new();

        for &line in lines {
            match self.classify(line) {
                LineKind::Header if header.is_none() => header = Some(line),
                // A later delimiter-bearing line is a file line whose path
                // happens to contain the delimiter.
                LineKind::Header | LineKind::RawChange => {
                    if let Some(change) = parse_raw_line(line) {
                        raw_changes.push(change);
                    } else if let Some((path, counts)) = parse_stat_line(line) {
                        merge_stat(&mut stats, path, counts);
                    }
                }
                LineKind::Stat => {
                    if let Some((path, counts)) = parse_stat_line(line) {
                        merge_stat(&mut stats, path, counts);
                    }
                }
                LineKind::Other => {}
            }
        }

        let header = header.ok_or(BlockError::MissingHeader)?;
        let (sha, timestamp, author, message) = self.parse_header(header)?;
        let file_changes = join_stats(raw_changes, stats, &sha);

        Ok(CommitRecord {
            sha,
            timestamp,
            author,
            message,
            file_changes,
        })
    }

    fn parse_header(&self, line: &str) -> Result<(String, i64, String, String), BlockError> {
        let fields: Vec<&str> = line.splitn(4, self.format.delimiter.as_str()).collect();
        let [sha, timestamp, author, message] = fields[..] else {
            return Err(BlockError::FieldCount(fields.len()));
        };

        let sha = sha.trim();
        if sha.is_empty() || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BlockError::InvalidSha(sha.to_string()));
        }

        let timestamp = timestamp
            .trim()
            .parse::<i64>()
            .map_err(|_| BlockError::InvalidTimestamp(timestamp.trim().to_string()))?;

        Ok((
            sha.to_string(),
            timestamp,
            author.trim().to_string(),
            message.to_string(),
        ))
    }
}

/// Attach stat counts to raw changes by path.
///
/// Only paths with a raw change line survive: a stat entry without one is
/// dropped. Raw changes without a stat entry get zero counts.
fn join_stats(
    raw_changes: Vec<FileChange>,
    stats: HashMap<String, StatCounts>,
    sha: &str,
) -> Vec<FileChange> {
    let mut matched = 0usize;
    let changes: Vec<FileChange> = raw_changes
        .into_iter()
        .map(|mut change| {
            if let Some(counts) = stats.get(&change.path) {
                change.additions = counts.additions;
                change.deletions = counts.deletions;
                matched += 1;
            }
            change
        })
        .collect();

    let unmatched = stats
        .keys()
        .filter(|path| !changes.iter().any(|c| &c.path == *path))
        .count();
    if unmatched > 0 {
        debug!(sha, unmatched, "dropped stat lines without a raw change");
    }
    debug!(sha, files = changes.len(), matched, "joined raw and stat lines");
    changes
}

fn merge_stat(stats: &mut HashMap<String, StatCounts>, path: String, counts: StatCounts) {
    let entry = stats.entry(path).or_default();
    entry.additions += counts.additions;
    entry.deletions += counts.deletions;
}

/// `:<modes> <shas> <STATUS>\t...` or bare `<STATUS>\t...`.
fn is_raw_shape(line: &str) -> bool {
    if line.starts_with(':') {
        return line.contains('\t');
    }
    match line.split_once('\t') {
        Some((token, _)) => is_status_token(token),
        None => false,
    }
}

fn is_status_token(token: &str) -> bool {
    let mut chars = token.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase()) && chars.all(|c| c.is_ascii_digit())
}

fn parse_status(token: &str) -> Option<(ChangeStatus, Option<u8>)> {
    if !is_status_token(token) {
        return None;
    }
    let (code, score) = token.split_at(1);
    let status = match code {
        "M" => ChangeStatus::Modified,
        "A" => ChangeStatus::Created,
        "D" => ChangeStatus::Deleted,
        "R" => ChangeStatus::Renamed,
        _ => return None,
    };
    let similarity = match status {
        ChangeStatus::Renamed => score.parse::<u8>().ok(),
        _ => None,
    };
    Some((status, similarity))
}

fn parse_raw_line(line: &str) -> Option<FileChange> {
    let (token, paths) = match line.strip_prefix(':') {
        Some(rest) => {
            let (meta, paths) = rest.split_once('\t')?;
            (meta.split_whitespace().last()?, paths)
        }
        None => {
            let (token, paths) = line.split_once('\t')?;
            (token, paths)
        }
    };

    let Some((status, similarity)) = parse_status(token) else {
        debug!(token, "ignoring raw line with unsupported status");
        return None;
    };

    let mut parts = paths.split('\t');
    let path = parts.next().filter(|p| !p.is_empty())?.to_string();

    let renamed_to = if status == ChangeStatus::Renamed {
        let Some(to) = parts.next().filter(|p| !p.is_empty()) else {
            debug!(path = %path, "ignoring rename line without a destination");
            return None;
        };
        Some(to.to_string())
    } else {
        None
    };

    Some(FileChange {
        path,
        status,
        renamed_to,
        similarity,
        additions: 0,
        deletions: 0,
    })
}

/// ` path | 18 +++++---` or ` path | Bin 0 -> 12 bytes`.
fn parse_stat_line(line: &str) -> Option<(String, StatCounts)> {
    let (path, graph) = line.rsplit_once('|')?;
    let path = path.trim();
    if path.is_empty() {
        return None;
    }

    let graph = graph.trim();
    if graph.starts_with("Bin") {
        return Some((rename_source(path), StatCounts::default()));
    }

    let mut tokens = graph.split_whitespace();
    tokens.next()?.parse::<u64>().ok()?;
    let bar = tokens.next().unwrap_or("");
    let counts = StatCounts {
        additions: bar.chars().filter(|&c| c == '+').count() as u64,
        deletions: bar.chars().filter(|&c| c == '-').count() as u64,
    };
    Some((rename_source(path), counts))
}

/// Stat lines show renames as `old => new` or `dir/{old => new}/file`;
/// raw changes key renames on the old path, so stats do too.
fn rename_source(path: &str) -> String {
    if let (Some(open), Some(close)) = (path.find('{'), path.rfind('}')) {
        if open < close {
            if let Some((from, _)) = path[open + 1..close].split_once(" => ") {
                let joined = format!("{}{}{}", &path[..open], from, &path[close + 1..]);
                return joined.replace("//", "/");
            }
        }
    }
    match path.split_once(" => ") {
        Some((from, _)) => from.to_string(),
        None => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA_A: &str = "ae0a7365f5b3c2d1e0f9a8b7c6d5e4f3a2b1c0d9";
    const SHA_B: &str = "1b2c3d4e5f60718293a4b5c6d7e8f90112233445";

    fn parser() -> CommitLogParser {
        CommitLogParser::new(LogFormat::default())
    }

    #[test]
    fn parses_fixture_block() {
        let raw = format!(
            "**{SHA_A}##1647421786##M. D. Ahwireng##Adds template for server.js\n\
             :000000 100644 0000000 7b78207 A\tserver.js\n \
             server.js | 18 ++++++++++++++++++\n"
        );
        let parsed = parser().parse(&raw);
        assert_eq!(parsed.skipped_blocks, 0);
        assert_eq!(parsed.commits.len(), 1);

        let commit = &parsed.commits[0];
        assert_eq!(commit.sha, SHA_A);
        assert_eq!(commit.timestamp, 1647421786);
        assert_eq!(commit.author, "M. D. Ahwireng");
        assert_eq!(commit.message, "Adds template for server.js");
        assert_eq!(
            commit.file_changes,
            vec![FileChange {
                path: "server.js".into(),
                status: ChangeStatus::Created,
                renamed_to: None,
                similarity: None,
                additions: 18,
                deletions: 0,
            }]
        );
    }

    #[test]
    fn message_keeps_embedded_delimiters() {
        let raw = format!("**{SHA_A}##100##alice##fix: a##b ## c\n");
        let parsed = parser().parse(&raw);
        assert_eq!(parsed.commits[0].message, "fix: a##b ## c");
    }

    #[test]
    fn interleaved_raw_and_stat_lines_join_by_path() {
        let raw = format!(
            "**{SHA_A}##100##alice##mixed\n \
             b.rs | 3 ++-\n\
             :100644 100644 1111111 2222222 M\ta.rs\n \
             a.rs | 4 ----\n\
             :100644 100644 3333333 4444444 M\tb.rs\n"
        );
        let commit = &parser().parse(&raw).commits[0];
        assert_eq!(commit.file_changes.len(), 2);
        assert_eq!(commit.file_changes[0].path, "a.rs");
        assert_eq!(commit.file_changes[0].deletions, 4);
        assert_eq!(commit.file_changes[1].path, "b.rs");
        assert_eq!(commit.file_changes[1].additions, 2);
        assert_eq!(commit.file_changes[1].deletions, 1);
    }

    #[test]
    fn stat_without_raw_change_is_dropped() {
        let raw = format!(
            "**{SHA_A}##100##alice##drop\n\
             :100644 100644 1111111 2222222 M\tkept.rs\n \
             kept.rs | 1 +\n \
             orphan.rs | 9 +++++++++\n"
        );
        let commit = &parser().parse(&raw).commits[0];
        assert_eq!(commit.file_changes.len(), 1);
        assert_eq!(commit.file_changes[0].path, "kept.rs");
        assert_eq!(commit.additions(), 1);
    }

    #[test]
    fn raw_change_without_stat_has_zero_counts() {
        let raw = format!("**{SHA_A}##100##alice##delete\nD\tgone.rs\n");
        let commit = &parser().parse(&raw).commits[0];
        assert_eq!(commit.file_changes[0].status, ChangeStatus::Deleted);
        assert_eq!(commit.file_changes[0].additions, 0);
        assert_eq!(commit.file_changes[0].deletions, 0);
    }

    #[test]
    fn rename_keys_on_old_path_and_keeps_similarity() {
        let raw = format!(
            "**{SHA_A}##100##alice##move\n\
             :100644 100644 1111111 2222222 R086\tsrc/old.rs\tsrc/new.rs\n \
             src/{{old.rs => new.rs}} | 3 ++-\n"
        );
        let change = &parser().parse(&raw).commits[0].file_changes[0];
        assert_eq!(change.status, ChangeStatus::Renamed);
        assert_eq!(change.path, "src/old.rs");
        assert_eq!(change.renamed_to.as_deref(), Some("src/new.rs"));
        assert_eq!(change.similarity, Some(86));
        assert_eq!(change.additions, 2);
        assert_eq!(change.deletions, 1);
    }

    #[test]
    fn rename_without_destination_is_ignored() {
        let raw = format!("**{SHA_A}##100##alice##bad rename\nR100\tonly-old.rs\n");
        let commit = &parser().parse(&raw).commits[0];
        assert!(commit.file_changes.is_empty());
    }

    #[test]
    fn unsupported_status_codes_are_ignored() {
        let raw = format!(
            "**{SHA_A}##100##alice##copy\n\
             :100644 100644 1111111 2222222 C075\ta.rs\tb.rs\n\
             :100644 120000 1111111 2222222 T\tlink\n\
             M\tc.rs\n"
        );
        let commit = &parser().parse(&raw).commits[0];
        assert_eq!(commit.file_changes.len(), 1);
        assert_eq!(commit.file_changes[0].path, "c.rs");
    }

    #[test]
    fn binary_stat_joins_with_zero_counts() {
        let raw = format!(
            "**{SHA_A}##100##alice##logo\n\
             A\tlogo.png\n \
             logo.png | Bin 0 -> 1234 bytes\n"
        );
        let change = &parser().parse(&raw).commits[0].file_changes[0];
        assert_eq!(change.path, "logo.png");
        assert_eq!(change.additions, 0);
    }

    #[test]
    fn malformed_block_is_skipped_not_fatal() {
        let raw = format!(
            "**{SHA_A}##100##alice##first\nM\ta.rs\n\
             **not a header at all\nM\tb.rs\n\
             **{SHA_B}##notanumber##bob##bad ts\n\
             **zzzz##100##carol##bad sha\n\
             **{SHA_B}##200##bob##last\nM\tc.rs\n"
        );
        let parsed = parser().parse(&raw);
        assert_eq!(parsed.skipped_blocks, 3);
        assert_eq!(parsed.total_blocks(), 5);
        let messages: Vec<&str> = parsed.commits.iter().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "last"]);
    }

    #[test]
    fn header_with_too_few_fields_is_rejected() {
        let err = parser().parse_header(&format!("{SHA_A}##100##alice")).unwrap_err();
        assert_eq!(err, BlockError::FieldCount(3));
    }

    #[test]
    fn preamble_before_first_marker_is_discarded() {
        let raw = format!("warning: noise\n\n**{SHA_A}##100##alice##only\n");
        let parsed = parser().parse(&raw);
        assert_eq!(parsed.commits.len(), 1);
        assert_eq!(parsed.skipped_blocks, 0);
    }

    #[test]
    fn blocks_keep_input_order() {
        let raw = format!(
            "**{SHA_B}##300##bob##newest\n\n**{SHA_A}##100##alice##oldest\n"
        );
        let parsed = parser().parse(&raw);
        assert_eq!(parsed.commits[0].sha, SHA_B);
        assert_eq!(parsed.commits[1].sha, SHA_A);
    }

    #[test]
    fn boundary_inside_subject_does_not_split() {
        let raw = format!("**{SHA_A}##100##alice##make **this** bold\nM\ta.md\n");
        let parsed = parser().parse(&raw);
        assert_eq!(parsed.commits.len(), 1);
        assert_eq!(parsed.commits[0].message, "make **this** bold");
        assert_eq!(parsed.commits[0].file_changes.len(), 1);
    }

    #[test]
    fn crlf_line_endings_are_tolerated() {
        let raw = format!("**{SHA_A}##100##alice##win\r\nM\ta.rs\r\n a.rs | 2 ++\r\n");
        let commit = &parser().parse(&raw).commits[0];
        assert_eq!(commit.message, "win");
        assert_eq!(commit.file_changes[0].additions, 2);
    }

    #[test]
    fn custom_format_markers() {
        let format = LogFormat {
            boundary: "@@C@@".into(),
            delimiter: "\u{1f}".into(),
        };
        let raw = format!("@@C@@{SHA_A}\u{1f}100\u{1f}alice\u{1f}custom ## text\nA\tx.rs\n");
        let parsed = CommitLogParser::new(format).parse(&raw);
        assert_eq!(parsed.commits[0].message, "custom ## text");
        assert_eq!(parsed.commits[0].file_changes[0].status, ChangeStatus::Created);
    }

    #[test]
    fn summary_line_is_ignored() {
        let raw = format!(
            "**{SHA_A}##100##alice##sum\nM\ta.rs\n a.rs | 1 +\n 1 file changed, 1 insertion(+)\n"
        );
        let commit = &parser().parse(&raw).commits[0];
        assert_eq!(commit.file_changes.len(), 1);
    }

    #[test]
    fn rename_source_expands_brace_notation() {
        assert_eq!(rename_source("src/{a.rs => b.rs}"), "src/a.rs");
        assert_eq!(rename_source("{old => new}/lib.rs"), "old/lib.rs");
        assert_eq!(rename_source("src/{ => nested}/x.rs"), "src/x.rs");
        assert_eq!(rename_source("a.txt => b.txt"), "a.txt");
        assert_eq!(rename_source("plain.rs"), "plain.rs");
    }

    #[test]
    fn empty_input_yields_nothing() {
        let parsed = parser().parse("");
        assert!(parsed.commits.is_empty());
        assert_eq!(parsed.skipped_blocks, 0);
    }
}
