use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use miette::{Context, IntoDiagnostic, Result};
use tracing::Level;

use cohort_batch::analyzer::CommandAnalyzer;
use cohort_batch::pipeline::{BatchRunner, GitHistoryProvider, HistoryProvider};
use cohort_core::{CohortConfig, OutputFormat, SubjectConfig};
use cohort_gitlog::parser::CommitLogParser;
use cohort_ranking::cohort::{rank_cohort, MetricFeed};

mod render;
mod telemetry;

#[derive(Parser)]
#[command(
    name = "cohort",
    version,
    about = "Cohort-relative code quality ranking",
    long_about = "Cohort ranks every member of a cohort of repositories against the rest.\n\n\
                   It parses commit history into per-author contributions, collects static\n\
                   metrics from an external analysis tool, and places each subject in a\n\
                   quality band relative to the whole cohort.\n\n\
                   Examples:\n  \
                     git log --raw --stat --format='**%H##%at##%an##%s' | cohort parse\n  \
                     cohort history --path repos/alice --default main --target week-2\n  \
                     cohort rank --feed metrics.json\n  \
                     cohort run --format markdown\n  \
                     cohort init"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .cohort.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable tables and summaries (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as newline-delimited JSON on stderr
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Parse raw commit log text
    #[command(long_about = "Parse raw commit log text into commit records.\n\n\
        Input must use the configured boundary and delimiter markers together with\n\
        git's --raw and --stat sections. Reads from stdin or a file.\n\n\
        Examples:\n  git log -M --raw --stat --format='**%H##%at##%an##%s' | cohort parse\n  \
        cohort parse --file history.log --format json")]
    Parse {
        /// Read log text from file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Compare a branch against the default branch
    #[command(long_about = "Compare a target branch against the default branch.\n\n\
        When both branches are the same the full history is analyzed; otherwise only\n\
        commits on the target that are not on the default branch. Reports per-author\n\
        contributions using the [identities] table from the configuration.\n\n\
        Examples:\n  cohort history --path repos/alice\n  \
        cohort history --path repos/alice --default main --target week-2")]
    History {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Default branch (default: main)
        #[arg(long = "default", default_value = "main")]
        default_branch: String,

        /// Target branch (default: same as --default)
        #[arg(long = "target")]
        target_branch: Option<String>,

        /// Commits to list in text and markdown output (default: 20)
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Rank a metric feed against the metric table
    #[command(long_about = "Rank a JSON metric feed against the metric table.\n\n\
        The feed maps subject id to metric name to a number or null:\n  \
        {\"alice\": {\"cc\": 2.5, \"mi\": null}}\n\n\
        Null, -999 and non-finite values count as missing and rank N/A.")]
    Rank {
        /// JSON metric feed
        #[arg(long)]
        feed: PathBuf,
    },
    /// Collect and rank every configured subject
    #[command(long_about = "Collect and rank every [[subjects]] entry from the configuration.\n\n\
        Subjects run on a bounded worker pool under a shared rate limit. A subject\n\
        whose history or analysis fails gets null samples and ranks N/A; the rest of\n\
        the cohort is still ranked.")]
    Run,
    /// Create a default .cohort.toml configuration file
    #[command(long_about = "Create a default .cohort.toml configuration file.\n\n\
        Generates a commented template with all available options.\n\
        Fails if .cohort.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn read_log_input(file: &Option<PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err(format!("reading {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .into_diagnostic()
                .wrap_err("reading stdin")?;
            Ok(input)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<CohortConfig> {
    match path {
        Some(path) => {
            if !path.exists() {
                return Err(cohort_core::CohortError::FileNotFound(path.to_path_buf()).into());
            }
            Ok(CohortConfig::from_file(path)?)
        }
        None => {
            let default_path = Path::new(".cohort.toml");
            if default_path.exists() {
                Ok(CohortConfig::from_file(default_path)?)
            } else {
                Ok(CohortConfig::default())
            }
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

const DEFAULT_CONFIG: &str = r###"# Cohort Configuration

[log]
# Commit log markers, matching git log --format='**%H##%at##%an##%s'
# boundary = "**"
# delimiter = "##"

[batch]
# max_workers = 4
# rate_limit = 5
# rate_window_secs = 60
# analysis_timeout_secs = 120

[analysis]
# External metric tool; must print {"metric": number | null, ...} on stdout.
# {path} is replaced with the subject's checkout path.
# command = ["metrics-tool", "--json", "{path}"]

# Metric table. Leave empty to use the builtin cc, mi, loc, halstead_volume.
# [metrics.cc]
# description = "Average cyclomatic complexity"
# reversed = true
# additive = false

[identities]
# "Display Name" = "handle"

# [[subjects]]
# id = "alice"
# path = "repos/alice"
# default_branch = "main"
# target_branch = "main"
"###;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    telemetry::init_tracing(cli.log_json, level);

    let config = load_config(cli.config.as_deref())?;
    tracing::debug!(format = %cli.format, subjects = config.subjects.len(), "loaded configuration");

    match cli.command {
        Command::Parse { ref file } => {
            let input = read_log_input(file)?;
            let parsed = CommitLogParser::new(config.log.clone()).parse(&input);
            if parsed.total_blocks() == 0 && !input.trim().is_empty() {
                return Err(cohort_core::CohortError::Parse(format!(
                    "no line starts with the boundary marker '{}'; expected git log --format='{}'",
                    config.log.boundary,
                    config.log.pretty()
                ))
                .into());
            }

            match cli.format {
                OutputFormat::Json => print_json(&parsed)?,
                OutputFormat::Markdown => print!("{}", render::parsed_log_markdown(&parsed)),
                OutputFormat::Text => print!("{}", render::parsed_log_text(&parsed)),
            }
        }
        Command::History {
            ref path,
            ref default_branch,
            ref target_branch,
            limit,
        } => {
            if git2::Repository::open(path).is_err() {
                miette::bail!(miette::miette!(
                    help = "Pass --path pointing at a local clone",
                    "Not a git repository: {}",
                    path.display()
                ));
            }

            let subject = SubjectConfig {
                id: path.display().to_string(),
                path: path.clone(),
                default_branch: default_branch.clone(),
                target_branch: target_branch
                    .clone()
                    .unwrap_or_else(|| default_branch.clone()),
            };
            let provider = GitHistoryProvider::from_config(&config);
            let comparison = tokio::task::spawn_blocking(move || provider.compare(&subject))
                .await
                .into_diagnostic()??;

            match cli.format {
                OutputFormat::Json => print_json(&comparison)?,
                OutputFormat::Markdown => {
                    print!("{}", render::comparison_markdown(&comparison, limit))
                }
                OutputFormat::Text => print!("{}", render::comparison_text(&comparison, limit)),
            }
        }
        Command::Rank { ref feed } => {
            let content = std::fs::read_to_string(feed)
                .into_diagnostic()
                .wrap_err(format!("reading {}", feed.display()))?;
            let feed: MetricFeed = serde_json::from_str(&content)
                .map_err(cohort_core::CohortError::from)
                .wrap_err("metric feed must map subject ids to {metric: number | null}")?;
            let report = rank_cohort(&feed, &config.metric_table());

            match cli.format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Markdown => print!("{}", render::ranking_markdown(&report)),
                OutputFormat::Text => print!("{}", render::ranking_text(&report)),
            }
        }
        Command::Run => {
            if config.subjects.is_empty() {
                miette::bail!(miette::miette!(
                    help = "Add [[subjects]] entries to .cohort.toml",
                    "No subjects configured"
                ));
            }
            let analyzer = CommandAnalyzer::from_config(&config.analysis).map_err(|e| {
                miette::miette!(
                    help = "Set [analysis] command in .cohort.toml, \
                            e.g. [\"metrics-tool\", \"{{path}}\"]",
                    "{}",
                    e
                )
            })?;

            let mut runner = BatchRunner::new(
                &config,
                Arc::new(GitHistoryProvider::from_config(&config)),
                Arc::new(analyzer),
            );
            if std::io::stderr().is_terminal() && !cli.log_json {
                let pb = indicatif::ProgressBar::new(config.subjects.len() as u64);
                pb.set_style(
                    indicatif::ProgressStyle::with_template(
                        "{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} subjects ({elapsed})",
                    )
                    .into_diagnostic()?
                    .progress_chars("=> "),
                );
                runner = runner.with_progress(pb);
            }

            let report = runner.run(&config.subjects).await?;

            match cli.format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Markdown => print!("{}", render::batch_markdown(&report)),
                OutputFormat::Text => print!("{}", render::batch_text(&report)),
            }
        }
        Command::Init => {
            let path = Path::new(".cohort.toml");
            if path.exists() {
                miette::bail!(".cohort.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .cohort.toml with default configuration");
        }
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "cohort", &mut std::io::stdout());
        }
    }

    Ok(())
}
