use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use std::process;
use tinderbox::state::Outcome;
use tinderbox::styling::format_error;

mod commands;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable line format
    Text,
    /// JSON format
    Json,
}

/// Continuous-build scheduling state, kept inside the repository itself.
///
/// One invocation performs one action for a (repo, branch, platform)
/// triple: record a scheduled or finished build, or query pointers,
/// history, and build proposals.
#[derive(Parser)]
#[command(name = "tbx")]
#[command(about = "Continuous-build scheduler backed by git refs and notes", long_about = None)]
#[command(version)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args([
            "sync",
            "set_commit_running",
            "set_commit_finished",
            "show_state",
            "show_history",
            "show_proposals",
        ]),
))]
struct Cli {
    /// Path to the git repository
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    /// Branch to track
    #[arg(long)]
    branch: String,

    /// Platform whose state to operate on
    #[arg(long)]
    platform: String,

    /// Identifier of the reporting worker
    #[arg(long, default_value = "unknown")]
    builder: String,

    /// Fetch all remotes
    #[arg(long)]
    sync: bool,

    /// Mark a commit as being built
    #[arg(long, value_name = "COMMIT")]
    set_commit_running: Option<String>,

    /// Estimated build duration in minutes (with --set-commit-running)
    #[arg(long, value_name = "MINUTES", requires = "set_commit_running")]
    estimated_duration: Option<i64>,

    /// Record the result of a finished build
    #[arg(long, value_name = "COMMIT", requires = "result")]
    set_commit_finished: Option<String>,

    /// Build result (with --set-commit-finished)
    #[arg(long, value_enum, requires = "set_commit_finished")]
    result: Option<Outcome>,

    /// Opaque reference to the build output (with --set-commit-finished)
    #[arg(long, value_name = "REF", requires = "set_commit_finished")]
    result_reference: Option<String>,

    /// Print the tracked pointers for the platform and branch
    #[arg(long)]
    show_state: bool,

    /// Print the newest commits and their build states
    #[arg(long)]
    show_history: bool,

    /// Number of commits to show (with --show-history)
    #[arg(long, value_name = "N", default_value_t = 25, requires = "show_history")]
    history_count: usize,

    /// Print scored build proposals
    #[arg(long)]
    show_proposals: bool,

    /// Output format for --show-proposals
    #[arg(long, value_enum, default_value = "text", requires = "show_proposals")]
    format: OutputFormat,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = commands::run(&cli) {
        eprintln!("{}", format_error(&format!("{e:#}")));
        process::exit(1);
    }
}
