//! Text and Markdown rendering for command results.
//!
//! JSON output is serialized directly from the library types in `main.rs`.

use std::fmt::Write;

use chrono::DateTime;
use cohort_batch::pipeline::BatchReport;
use cohort_gitlog::divergence::BranchComparison;
use cohort_gitlog::parser::{ChangeStatus, CommitRecord, ParsedLog};
use cohort_ranking::cohort::CohortReport;

fn status_code(status: ChangeStatus) -> char {
    match status {
        ChangeStatus::Created => 'A',
        ChangeStatus::Modified => 'M',
        ChangeStatus::Deleted => 'D',
        ChangeStatus::Renamed => 'R',
    }
}

fn date(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

fn short_sha(sha: &str) -> &str {
    sha.get(..8).unwrap_or(sha)
}

fn value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => "-".into(),
    }
}

fn commit_text(out: &mut String, commit: &CommitRecord) {
    let _ = writeln!(
        out,
        "{}  {}  {}  {}",
        short_sha(&commit.sha),
        date(commit.timestamp),
        commit.author,
        commit.message
    );
    for change in &commit.file_changes {
        let path = match &change.renamed_to {
            Some(new) => format!("{} -> {new}", change.path),
            None => change.path.clone(),
        };
        let _ = writeln!(
            out,
            "    {} {path} (+{} -{})",
            status_code(change.status),
            change.additions,
            change.deletions
        );
    }
}

pub fn parsed_log_text(log: &ParsedLog) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Parsed {} commits ({} skipped)\n",
        log.commits.len(),
        log.skipped_blocks
    );
    for commit in &log.commits {
        commit_text(&mut out, commit);
    }
    out
}

pub fn parsed_log_markdown(log: &ParsedLog) -> String {
    let mut out = String::from("# Commit Log\n\n");
    let _ = writeln!(
        out,
        "**Commits:** {} | **Skipped blocks:** {}\n",
        log.commits.len(),
        log.skipped_blocks
    );
    commits_table(&mut out, &log.commits);
    out
}

fn commits_table(out: &mut String, commits: &[CommitRecord]) {
    if commits.is_empty() {
        out.push_str("No commits.\n");
        return;
    }
    out.push_str("| Commit | Date | Author | Files | + | - | Message |\n");
    out.push_str("|--------|------|--------|-------|---|---|---------|\n");
    for commit in commits {
        let _ = writeln!(
            out,
            "| `{}` | {} | {} | {} | {} | {} | {} |",
            short_sha(&commit.sha),
            date(commit.timestamp),
            commit.author,
            commit.file_changes.len(),
            commit.additions(),
            commit.deletions(),
            commit.message.replace('|', "\\|")
        );
    }
}

pub fn comparison_text(cmp: &BranchComparison, limit: usize) -> String {
    let mut out = String::new();
    if cmp.is_full_log() {
        let _ = writeln!(out, "Branch {} (full history)", cmp.target_branch);
    } else {
        let _ = writeln!(out, "Branch {} against {}", cmp.target_branch, cmp.default_branch);
    }
    let _ = writeln!(
        out,
        "Commits analyzed: {} of {} on {} ({} skipped)\n",
        cmp.commits_on_target_branch,
        cmp.commits_on_default_branch,
        cmp.default_branch,
        cmp.skipped_blocks
    );

    out.push_str("Contributors:\n");
    if cmp.contributions.is_empty() {
        out.push_str("  none\n");
    }
    for stat in &cmp.contributions {
        let _ = writeln!(
            out,
            "  {:<20} {:>5} commits  +{:<6} -{:<6} ({})",
            stat.author_handle,
            stat.total_commits,
            stat.total_additions,
            stat.total_deletions,
            stat.display_names.iter().cloned().collect::<Vec<_>>().join(", ")
        );
    }

    if limit > 0 && !cmp.history.is_empty() {
        out.push_str("\nRecent commits:\n");
        for commit in cmp.history.iter().take(limit) {
            commit_text(&mut out, commit);
        }
    }
    out
}

pub fn comparison_markdown(cmp: &BranchComparison, limit: usize) -> String {
    let mut out = String::from("# Branch Comparison\n\n");
    let _ = writeln!(
        out,
        "**Target:** `{}` | **Default:** `{}` | **Commits analyzed:** {} | \
         **Default branch commits:** {} | **Skipped blocks:** {}\n",
        cmp.target_branch,
        cmp.default_branch,
        cmp.commits_on_target_branch,
        cmp.commits_on_default_branch,
        cmp.skipped_blocks
    );

    out.push_str("## Contributors\n\n");
    if cmp.contributions.is_empty() {
        out.push_str("No contributors.\n");
    } else {
        out.push_str("| Handle | Commits | Additions | Deletions | Names |\n");
        out.push_str("|--------|---------|-----------|-----------|-------|\n");
        for stat in &cmp.contributions {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} |",
                stat.author_handle,
                stat.total_commits,
                stat.total_additions,
                stat.total_deletions,
                stat.display_names.iter().cloned().collect::<Vec<_>>().join(", ")
            );
        }
    }

    if limit > 0 {
        out.push_str("\n## Commits\n\n");
        let shown: Vec<CommitRecord> = cmp.history.iter().take(limit).cloned().collect();
        commits_table(&mut out, &shown);
    }
    out
}

pub fn ranking_text(report: &CohortReport) -> String {
    let mut out = String::from("Distributions:\n");
    for dist in &report.distributions {
        let _ = write!(
            out,
            "  {:<18} n={:<4} min={:<10.2} max={:<10.2} breakpoints=[{:.2}, {:.2}, {:.2}]",
            dist.name,
            dist.entry_count,
            dist.min,
            dist.max,
            dist.breakpoints[0],
            dist.breakpoints[1],
            dist.breakpoints[2]
        );
        if let Some(sum) = dist.sum {
            let _ = write!(out, " sum={sum:.2}");
        }
        if dist.is_degenerate() {
            out.push_str(" (degenerate)");
        }
        out.push('\n');
    }
    for metric in &report.unranked_metrics {
        let _ = writeln!(out, "  {metric:<18} no measured samples");
    }

    for (subject, records) in &report.subjects {
        let _ = writeln!(out, "\n{subject}");
        for record in records {
            let _ = writeln!(
                out,
                "  {:<18} {:>12}  {}",
                record.name,
                value(record.value),
                record.rank
            );
        }
    }
    out
}

pub fn ranking_markdown(report: &CohortReport) -> String {
    let mut out = String::from("# Cohort Ranking\n\n## Distributions\n\n");
    out.push_str("| Metric | Entries | Min | Max | Breakpoints | Sum |\n");
    out.push_str("|--------|---------|-----|-----|-------------|-----|\n");
    for dist in &report.distributions {
        let _ = writeln!(
            out,
            "| {} | {} | {:.2} | {:.2} | {:.2} / {:.2} / {:.2} | {} |",
            dist.name,
            dist.entry_count,
            dist.min,
            dist.max,
            dist.breakpoints[0],
            dist.breakpoints[1],
            dist.breakpoints[2],
            value(dist.sum)
        );
    }
    if !report.unranked_metrics.is_empty() {
        let _ = writeln!(
            out,
            "\n**Unranked (no samples):** {}",
            report.unranked_metrics.join(", ")
        );
    }

    out.push_str("\n## Subjects\n\n");
    out.push_str("| Subject | Metric | Value | Rank |\n");
    out.push_str("|---------|--------|-------|------|\n");
    for (subject, records) in &report.subjects {
        for record in records {
            let _ = writeln!(
                out,
                "| {subject} | {} | {} | {} |",
                record.name,
                value(record.value),
                record.rank
            );
        }
    }
    out
}

pub fn batch_text(report: &BatchReport) -> String {
    let mut out = ranking_text(&report.ranking);
    let failed: Vec<_> = report.failed_subjects().collect();
    if !failed.is_empty() {
        out.push_str("\nFailures:\n");
        for outcome in failed {
            for failure in &outcome.failures {
                let _ = writeln!(out, "  {}: {failure}", outcome.subject);
            }
        }
    }
    out
}

pub fn batch_markdown(report: &BatchReport) -> String {
    let mut out = ranking_markdown(&report.ranking);
    let failed: Vec<_> = report.failed_subjects().collect();
    if !failed.is_empty() {
        out.push_str("\n## Failures\n\n");
        for outcome in failed {
            for failure in &outcome.failures {
                let _ = writeln!(out, "- **{}**: {failure}", outcome.subject);
            }
        }
    }
    out
}
