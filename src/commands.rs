//! CLI action handlers: thin glue from parsed arguments to the core.

use anyhow::Context;
use chrono::{TimeDelta, Utc};

use tinderbox::config::TinderboxConfig;
use tinderbox::git::{Commit, GitError, Repository};
use tinderbox::scheduler::{
    BisectScheduler, HeadScheduler, MergeScheduler, Proposal, Scheduler, SchedulerContext,
};
use tinderbox::state::{BuildHistory, Outcome, RepoTracker, StateUpdater};
use tinderbox::styling::{bold_style, paint, state_style};

use crate::{Cli, OutputFormat};

pub fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = TinderboxConfig::load().context("Failed to load config")?;
    let repo = Repository::at(&cli.repo);

    if cli.sync {
        return Ok(repo.fetch_all()?);
    }
    if let Some(spec) = &cli.set_commit_running {
        let commit = resolve_commit(&repo, spec)?;
        return handle_set_running(cli, &config, &commit);
    }
    if let Some(spec) = &cli.set_commit_finished {
        let commit = resolve_commit(&repo, spec)?;
        return handle_set_finished(cli, &config, &commit);
    }
    if cli.show_state {
        return handle_show_state(cli, &config, &repo);
    }
    if cli.show_history {
        return handle_show_history(cli, &config, &repo);
    }
    if cli.show_proposals {
        return handle_show_proposals(cli, &config);
    }
    unreachable!("clap enforces exactly one action");
}

fn resolve_commit(repo: &Repository, spec: &str) -> anyhow::Result<Commit> {
    repo.rev_parse(spec)?
        .ok_or_else(|| {
            GitError::UnknownCommit {
                spec: spec.to_string(),
            }
            .into()
        })
}

fn updater(cli: &Cli, config: &TinderboxConfig) -> StateUpdater {
    StateUpdater::new(&cli.platform, &cli.branch, &cli.repo)
        .with_namespace(&config.ref_namespace)
        .with_min_duration(config.min_build_duration())
}

fn handle_set_running(
    cli: &Cli,
    config: &TinderboxConfig,
    commit: &Commit,
) -> anyhow::Result<()> {
    let estimate = TimeDelta::minutes(cli.estimated_duration.unwrap_or(0));
    updater(cli, config).set_scheduled(commit, &cli.builder, estimate)?;
    Ok(())
}

fn handle_set_finished(
    cli: &Cli,
    config: &TinderboxConfig,
    commit: &Commit,
) -> anyhow::Result<()> {
    let outcome: Outcome = cli
        .result
        .context("--set-commit-finished requires --result")?;
    updater(cli, config).set_finished(
        commit,
        &cli.builder,
        outcome,
        cli.result_reference.as_deref(),
    )?;
    Ok(())
}

fn handle_show_state(
    cli: &Cli,
    config: &TinderboxConfig,
    repo: &Repository,
) -> anyhow::Result<()> {
    let tracker = RepoTracker::new(&cli.platform, &cli.branch, repo.clone())
        .with_namespace(&config.ref_namespace);

    println!(
        "State of repository {} on branch {} for platform {}",
        cli.repo.display(),
        cli.branch,
        cli.platform
    );
    let head = tracker.head()?;
    println!(
        "head            : {}",
        head.map_or_else(|| "unset".to_string(), |c| c.to_string())
    );
    print_pointer(&tracker, "last good commit", tracker.last_good()?)?;
    print_pointer(&tracker, "first bad commit", tracker.first_bad()?)?;
    print_pointer(&tracker, "last  bad commit", tracker.last_bad()?)?;
    Ok(())
}

fn print_pointer(
    tracker: &RepoTracker,
    label: &str,
    pointer: Option<Commit>,
) -> anyhow::Result<()> {
    if let Some(commit) = pointer {
        let distance = tracker.branch_distance(&commit)?;
        println!(
            "{label}: {} ({}-{distance})",
            paint(bold_style(), commit.as_str()),
            tracker.branch()
        );
    }
    Ok(())
}

fn handle_show_history(
    cli: &Cli,
    config: &TinderboxConfig,
    repo: &Repository,
) -> anyhow::Result<()> {
    let history = BuildHistory::new(&cli.platform, repo.clone())
        .with_namespace(&config.ref_namespace);
    for (commit, record) in history.recent_commit_states(&cli.branch, cli.history_count)? {
        println!(
            "{} {}",
            commit,
            paint(state_style(record.state), &record.to_string())
        );
    }
    Ok(())
}

fn handle_show_proposals(cli: &Cli, config: &TinderboxConfig) -> anyhow::Result<()> {
    let context = || {
        SchedulerContext::new(&cli.platform, &cli.branch, &cli.repo)
            .with_namespace(&config.ref_namespace)
    };
    let mut scheduler = MergeScheduler::new();
    scheduler.add_scheduler(BisectScheduler::new(context()), 1.0);
    scheduler.add_scheduler(HeadScheduler::new(context()), 1.0);

    let proposals = scheduler.get_proposals(Utc::now())?;
    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&proposals)?),
        OutputFormat::Text => {
            for proposal in &proposals {
                print_proposal(proposal);
            }
        }
    }
    Ok(())
}

fn print_proposal(proposal: &Proposal) {
    println!(
        "{:9.6} {:<15} {}",
        proposal.score,
        proposal.scheduler,
        paint(bold_style(), proposal.commit.as_str())
    );
}
