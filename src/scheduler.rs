//! Proposal scoring: which commit should a worker build next?
//!
//! Strategies are pure reads over the tracked state; the caller supplies
//! `now` so scoring stays deterministic under test. Each strategy scores
//! its candidates, dampens those close to in-flight builds, and rescales
//! so the best candidate maps to the candidate count (minus a penalty for
//! work already running). `MergeScheduler` composes strategies into one
//! ranked stream, keeping each proposal's provenance.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::git::{Commit, GitError, Repository};
use crate::state::{BuildHistory, BuildState, CommitState, RepoTracker};

/// A scored candidate commit, tagged with the strategy that produced it
/// and the context a worker needs to dispatch the build.
#[derive(Debug, Clone, Serialize)]
pub struct Proposal {
    pub score: f64,
    pub commit: Commit,
    pub scheduler: &'static str,
    pub platform: String,
    pub branch: String,
    pub repo: PathBuf,
}

/// Shared state the strategies read from.
pub struct SchedulerContext {
    platform: String,
    branch: String,
    repo: Repository,
    tracker: RepoTracker,
    history: BuildHistory,
}

impl SchedulerContext {
    pub fn new(platform: &str, branch: &str, repo_path: &Path) -> Self {
        let repo = Repository::at(repo_path);
        Self {
            platform: platform.to_string(),
            branch: branch.to_string(),
            tracker: RepoTracker::new(platform, branch, repo.clone()),
            history: BuildHistory::new(platform, repo.clone()),
            repo,
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.tracker = self.tracker.with_namespace(namespace);
        self.history = self.history.with_namespace(namespace);
        self
    }

    fn proposal(&self, score: f64, commit: Commit, scheduler: &'static str) -> Proposal {
        Proposal {
            score,
            commit,
            scheduler,
            platform: self.platform.clone(),
            branch: self.branch.clone(),
            repo: self.repo.path().to_path_buf(),
        }
    }

    /// Commits in `begin..end` (newest first) with their current records.
    fn annotated_commits(
        &self,
        begin: &str,
        end: &str,
    ) -> Result<Vec<(Commit, CommitState)>, GitError> {
        self.repo
            .list_commits(begin, end)?
            .into_iter()
            .map(|commit| {
                let state = self.history.commit_state(&commit)?;
                Ok((commit, state))
            })
            .collect()
    }
}

/// A source of ranked build proposals.
pub trait Scheduler {
    fn name(&self) -> &'static str;

    /// Score the current candidates. Pure read; never mutates pointers or
    /// annotations.
    fn get_proposals(&self, now: DateTime<Utc>) -> Result<Vec<Proposal>, GitError>;
}

/// Keeps the branch tip verified, with weight falling off behind it.
pub struct HeadScheduler {
    ctx: SchedulerContext,
}

impl HeadScheduler {
    pub fn new(ctx: SchedulerContext) -> Self {
        Self { ctx }
    }
}

impl Scheduler for HeadScheduler {
    fn name(&self) -> &'static str {
        "HeadScheduler"
    }

    fn get_proposals(&self, now: DateTime<Utc>) -> Result<Vec<Proposal>, GitError> {
        let head = self.ctx.tracker.head()?.ok_or_else(|| GitError::BranchNotFound {
            branch: self.ctx.branch.clone(),
        })?;

        let mut offset = 0.0;
        let mut proposals = match self.ctx.tracker.last_build()? {
            None => vec![self.ctx.proposal(1.0, head, self.name())],
            Some(last_build) => {
                let commits = self.ctx.annotated_commits(last_build.as_str(), head.as_str())?;
                let count = commits.len() as f64;
                let mut proposals: Vec<Proposal> = commits
                    .iter()
                    .enumerate()
                    .map(|(idx, (commit, _))| {
                        // commits run newest first, so the tip ranks highest
                        let rank = count - idx as f64;
                        let score = 1.0 - 1.0 / (rank * rank + 1.0);
                        self.ctx.proposal(score, commit.clone(), self.name())
                    })
                    .collect();
                offset = dampen_running_commits(&commits, &mut proposals, now);
                proposals
            }
        };

        normalize_scores(&mut proposals, offset);
        Ok(proposals)
    }
}

/// Focuses work inside an open bisect range, peaked at the midpoint.
pub struct BisectScheduler {
    ctx: SchedulerContext,
}

impl BisectScheduler {
    pub fn new(ctx: SchedulerContext) -> Self {
        Self { ctx }
    }
}

impl Scheduler for BisectScheduler {
    fn name(&self) -> &'static str {
        "BisectScheduler"
    }

    fn get_proposals(&self, now: DateTime<Utc>) -> Result<Vec<Proposal>, GitError> {
        let (Some(last_good), Some(first_bad)) = (
            self.ctx.tracker.last_good()?,
            self.ctx.tracker.first_bad()?,
        ) else {
            return Ok(Vec::new());
        };

        // candidates are the strict predecessors of the known-bad commit
        let below_bad = format!("{first_bad}^");
        let commits = self.ctx.annotated_commits(last_good.as_str(), &below_bad)?;
        let mut proposals: Vec<Proposal> = commits
            .iter()
            .enumerate()
            .map(|(idx, (commit, _))| {
                let score = midpoint_weight(idx, commits.len());
                self.ctx.proposal(score, commit.clone(), self.name())
            })
            .collect();

        let offset = dampen_running_commits(&commits, &mut proposals, now);
        normalize_scores(&mut proposals, offset);
        Ok(proposals)
    }
}

/// Weighted composition of child strategies.
///
/// Child proposals are scaled by their strategy's weight and merged into
/// one descending-score stream. Duplicate commits across children are kept
/// as-is; provenance matters to the worker and the top of the list wins.
#[derive(Default)]
pub struct MergeScheduler {
    schedulers: Vec<(f64, Box<dyn Scheduler>)>,
}

impl MergeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_scheduler(&mut self, scheduler: impl Scheduler + 'static, weight: f64) {
        self.schedulers.push((weight, Box::new(scheduler)));
    }
}

impl Scheduler for MergeScheduler {
    fn name(&self) -> &'static str {
        "MergeScheduler"
    }

    fn get_proposals(&self, now: DateTime<Utc>) -> Result<Vec<Proposal>, GitError> {
        let mut proposals = Vec::new();
        for (weight, scheduler) in &self.schedulers {
            for mut proposal in scheduler.get_proposals(now)? {
                proposal.score *= weight;
                proposals.push(proposal);
            }
        }
        proposals.sort_by(|a, b| {
            b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal)
        });
        Ok(proposals)
    }
}

/// Bell weight over a candidate list: zero at both ends of the
/// enumeration, peaked around the middle.
fn midpoint_weight(idx: usize, len: usize) -> f64 {
    let i = idx as f64;
    let n = len as f64;
    (1.0 - 1.0 / (i * i + 1.0)) * (1.0 - 1.0 / ((i - n) * (i - n) + 1.0))
}

/// Suppress proposals close to commits that are currently building.
///
/// `t` is how far along the running build is relative to its estimate: a
/// fresh build (`t` near zero) strongly suppresses its neighborhood, while
/// a build that has blown past its estimate suppresses less and less, so
/// candidates re-open if the worker is lost. Returns the (nonpositive)
/// score-ceiling penalty the running builds contribute to normalization.
pub fn dampen_running_commits(
    commits: &[(Commit, CommitState)],
    proposals: &mut [Proposal],
    now: DateTime<Utc>,
) -> f64 {
    let mut offset = 0.0;
    for (running_idx, (_, record)) in commits.iter().enumerate() {
        if record.state != BuildState::Running {
            continue;
        }
        let (Some(started), Some(estimate)) = (record.started, record.estimated_duration)
        else {
            continue;
        };
        if estimate <= TimeDelta::zero() {
            continue;
        }
        let running_time = (now - started).max(TimeDelta::zero());
        let t = delta_ratio(running_time, estimate);
        for (idx, proposal) in proposals.iter_mut().enumerate() {
            let distance = (running_idx as f64 - idx as f64).abs() + t;
            proposal.score *= 1.0 - 1.0 / (distance * distance + 1.0);
        }
        offset -= (-(t * t)).exp();
    }
    offset
}

/// Rescale so the best proposal's score equals the proposal count plus
/// the dampening offset. Empty lists stay empty.
pub fn normalize_scores(proposals: &mut [Proposal], offset: f64) {
    let max_score = proposals.iter().fold(0.0_f64, |max, p| max.max(p.score));
    if max_score <= 0.0 {
        return;
    }
    let multiplier = (proposals.len() as f64 + offset) / max_score;
    for proposal in proposals.iter_mut() {
        proposal.score *= multiplier;
    }
}

fn delta_ratio(numerator: TimeDelta, denominator: TimeDelta) -> f64 {
    numerator.num_milliseconds() as f64 / denominator.num_milliseconds() as f64
}
