use std::collections::{HashMap, HashSet};

use cohort_core::LogFormat;
use cohort_gitlog::parser::{ChangeStatus, CommitLogParser};

/// Tiny deterministic generator so the sweeps below are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

struct Generated {
    text: String,
    raw_paths: Vec<(String, ChangeStatus, Option<String>)>,
    stats: HashMap<String, (u64, u64)>,
}

fn generate(seed: u64) -> Generated {
    let mut rng = Lcg(seed);
    let sha = format!("{:040x}", seed.wrapping_mul(0x9e3779b97f4a7c15));
    let mut lines: Vec<String> = Vec::new();
    let mut raw_paths = Vec::new();
    let mut stats = HashMap::new();

    let files = 1 + rng.below(6);
    for i in 0..files {
        let path = format!("src/file_{seed}_{i}.rs");
        let (status, renamed_to) = match rng.below(4) {
            0 => (ChangeStatus::Created, None),
            1 => (ChangeStatus::Modified, None),
            2 => (ChangeStatus::Deleted, None),
            _ => (ChangeStatus::Renamed, Some(format!("src/moved_{seed}_{i}.rs"))),
        };
        let code = match status {
            ChangeStatus::Created => "A".to_string(),
            ChangeStatus::Modified => "M".to_string(),
            ChangeStatus::Deleted => "D".to_string(),
            ChangeStatus::Renamed => format!("R{:03}", 50 + rng.below(51)),
        };
        let mut raw = format!(":100644 100644 aaaaaaa bbbbbbb {code}\t{path}");
        if let Some(to) = &renamed_to {
            raw.push('\t');
            raw.push_str(to);
        }
        lines.push(raw);
        raw_paths.push((path.clone(), status, renamed_to));

        if rng.below(3) > 0 {
            let plus = rng.below(20);
            let minus = rng.below(20);
            lines.push(format!(
                " {path} | {} {}{}",
                plus + minus,
                "+".repeat(plus as usize),
                "-".repeat(minus as usize)
            ));
            stats.insert(path, (plus, minus));
        }
    }

    for i in 0..rng.below(3) {
        lines.push(format!(" orphan_{seed}_{i}.rs | 4 ++--"));
    }

    // Shuffle so raw and stat lines interleave arbitrarily.
    for i in (1..lines.len()).rev() {
        let j = rng.below(i as u64 + 1) as usize;
        lines.swap(i, j);
    }

    let text = format!(
        "**{sha}##{}##author {seed}##generated ## commit\n{}\n",
        1_600_000_000 + seed,
        lines.join("\n")
    );
    Generated {
        text,
        raw_paths,
        stats,
    }
}

#[test]
fn generated_blocks_respect_join_drop_and_rename_rules() {
    let parser = CommitLogParser::new(LogFormat::default());

    for seed in 1..300 {
        let generated = generate(seed);
        let parsed = parser.parse(&generated.text);
        assert_eq!(parsed.skipped_blocks, 0, "seed {seed}");
        assert_eq!(parsed.commits.len(), 1, "seed {seed}");

        let commit = &parsed.commits[0];
        assert_eq!(commit.message, "generated ## commit");
        assert!(
            commit.file_changes.len() <= generated.raw_paths.len(),
            "seed {seed}: more file changes than raw lines"
        );
        assert_eq!(commit.file_changes.len(), generated.raw_paths.len());

        // Raw lines are shuffled, so changes are matched by path, not position.
        let expected: HashMap<&str, (ChangeStatus, Option<&str>)> = generated
            .raw_paths
            .iter()
            .map(|(path, status, renamed_to)| (path.as_str(), (*status, renamed_to.as_deref())))
            .collect();
        let mut seen = HashSet::new();

        for change in &commit.file_changes {
            let path = change.path.as_str();
            assert!(seen.insert(path), "seed {seed}: {path} joined twice");
            assert!(!path.starts_with("orphan"), "seed {seed}");
            let Some(&(status, renamed_to)) = expected.get(path) else {
                panic!("seed {seed}: unexpected path {path}");
            };
            assert_eq!(change.status, status, "seed {seed} {path}");

            let (additions, deletions) = generated.stats.get(path).copied().unwrap_or((0, 0));
            assert_eq!(change.additions, additions, "seed {seed} {path}");
            assert_eq!(change.deletions, deletions, "seed {seed} {path}");

            if change.status == ChangeStatus::Renamed {
                let to = change.renamed_to.as_deref().unwrap_or("");
                assert!(!to.is_empty(), "seed {seed}: rename without destination");
                assert_eq!(Some(to), renamed_to);
                assert!(change.similarity.is_some());
            } else {
                assert!(change.renamed_to.is_none());
            }
        }
    }
}

#[test]
fn concatenated_blocks_parse_independently() {
    let parser = CommitLogParser::new(LogFormat::default());
    let text: String = (1..40).map(|seed| generate(seed).text).collect();
    let parsed = parser.parse(&text);
    assert_eq!(parsed.commits.len(), 39);
    assert_eq!(parsed.commits[0].author, "author 1");
    assert_eq!(parsed.commits[38].author, "author 39");
}

#[test]
fn records_serialize_with_data_model_keys() {
    let parser = CommitLogParser::new(LogFormat::default());
    let raw = "**ae0a7365f5b3c2d1e0f9a8b7c6d5e4f3a2b1c0d9##1647421786##M. D. Ahwireng##Adds template\n\
               R100\told.js\tnew.js\n";
    let parsed = parser.parse(raw);
    let json = serde_json::to_value(&parsed).unwrap();

    assert_eq!(json["skippedBlocks"], 0);
    let commit = &json["commits"][0];
    assert_eq!(commit["timestampEpoch"], 1647421786);
    assert_eq!(commit["authorDisplayName"], "M. D. Ahwireng");
    assert!(commit.get("author").is_none());
    let change = &commit["fileChanges"][0];
    assert_eq!(change["changeStatus"], "renamed");
    assert!(change.get("status").is_none());
    assert_eq!(change["renamedTo"], "new.js");
    assert_eq!(change["similarity"], 100);
}
