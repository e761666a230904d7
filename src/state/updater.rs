//! The state-transition engine: turns raw build outcomes into pointer
//! updates, range painting, and bisect convergence.

use std::path::Path;

use chrono::{TimeDelta, Utc};

use crate::config::DEFAULT_MIN_BUILD_MINUTES;
use crate::git::{Commit, GitError, Repository};
use crate::state::{BuildHistory, BuildState, CommitState, Outcome, RepoTracker};

/// Applies build outcomes for one (platform, branch) pair.
///
/// `set_scheduled` and `set_finished` are the only writers of pointers and
/// annotations. Each individual write is an atomic git operation, so
/// concurrent updaters on other machines interleave without corrupting
/// state: a commit that ever went BAD stays BAD, and redone painting is
/// idempotent.
pub struct StateUpdater {
    repo: Repository,
    tracker: RepoTracker,
    history: BuildHistory,
    min_duration: TimeDelta,
}

impl StateUpdater {
    pub fn new(platform: &str, branch: &str, repo_path: &Path) -> Self {
        let repo = Repository::at(repo_path);
        Self {
            tracker: RepoTracker::new(platform, branch, repo.clone()),
            history: BuildHistory::new(platform, repo.clone()),
            repo,
            min_duration: TimeDelta::minutes(DEFAULT_MIN_BUILD_MINUTES),
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.tracker = self.tracker.with_namespace(namespace);
        self.history = self.history.with_namespace(namespace);
        self
    }

    pub fn with_min_duration(mut self, min_duration: TimeDelta) -> Self {
        self.min_duration = min_duration;
        self
    }

    /// Annotate `commit` as RUNNING on behalf of `builder`.
    ///
    /// The estimate is floored to the configured minimum; `started` is the
    /// authoritative scheduling moment and reads the wall clock.
    pub fn set_scheduled(
        &self,
        commit: &Commit,
        builder: &str,
        estimated_duration: TimeDelta,
    ) -> Result<(), GitError> {
        let record = CommitState {
            state: BuildState::Running,
            builder: Some(builder.to_string()),
            started: Some(Utc::now()),
            finished: None,
            estimated_duration: Some(estimated_duration.max(self.min_duration)),
            artifactreference: None,
        };
        self.history.set_commit_state(commit, &record)
    }

    /// Record a finished build and fold it into the tracked state.
    ///
    /// A GOOD result for a commit already known BAD is dropped: the
    /// regression wins over a flaky pass.
    pub fn set_finished(
        &self,
        commit: &Commit,
        builder: &str,
        outcome: Outcome,
        artifactreference: Option<&str>,
    ) -> Result<(), GitError> {
        let mut record = self.history.commit_state(commit)?;
        if record.state == BuildState::Bad && outcome == Outcome::Good {
            log::debug!(
                "keeping BAD on {}: ignoring GOOD from {builder}",
                commit.short()
            );
            return Ok(());
        }

        record.state = outcome.to_state();
        record.builder = Some(builder.to_string());
        record.finished = Some(Utc::now());
        record.estimated_duration = None;
        record.artifactreference = artifactreference.map(str::to_string);
        self.history.set_commit_state(commit, &record)?;

        match outcome {
            Outcome::Good => {
                self.paint_ranges(commit, outcome)?;
                let advance = match self.tracker.last_good()? {
                    None => true,
                    Some(last_good) => {
                        self.repo.is_ancestor(last_good.as_str(), commit.as_str())?
                    }
                };
                if advance {
                    self.tracker.set_last_good(commit)?;
                }
            }
            Outcome::Bad => {
                self.paint_ranges(commit, outcome)?;
                let narrow = match self.tracker.first_bad()? {
                    None => true,
                    Some(first_bad) => {
                        self.repo.is_ancestor(commit.as_str(), first_bad.as_str())?
                    }
                };
                if narrow {
                    self.tracker.set_first_bad(commit)?;
                }
                if self.tracker.last_bad()?.is_none() {
                    self.tracker.set_last_bad(commit)?;
                }
            }
        }

        self.finalize_bisect()
    }

    /// Label the commits a single outcome implies something about.
    ///
    /// With no completed build yet there is nothing to relate the outcome
    /// to and nothing is painted. Otherwise the new commit either extends
    /// the history past the newest completed build, or it refines the
    /// bisect range between `last_good` and `first_bad`. Real GOOD/BAD
    /// annotations are never overwritten.
    fn paint_ranges(&self, commit: &Commit, outcome: Outcome) -> Result<(), GitError> {
        let (Some(last_build), Some(last_good)) =
            (self.tracker.last_build()?, self.tracker.last_good()?)
        else {
            return Ok(());
        };
        let keep = [BuildState::Good, BuildState::Bad];

        if self.repo.is_ancestor(last_build.as_str(), commit.as_str())? {
            let label = match (outcome, last_build == last_good) {
                (Outcome::Good, true) => BuildState::AssumedGood,
                (Outcome::Good, false) => BuildState::PossiblyFixing,
                (Outcome::Bad, true) => BuildState::PossiblyBreaking,
                (Outcome::Bad, false) => BuildState::AssumedBad,
            };
            return self.history.update_inner_range(
                &last_build,
                commit,
                &CommitState::with_state(label),
                &keep,
            );
        }

        let Some(first_bad) = self.tracker.first_bad()? else {
            return Err(GitError::Invariant(format!(
                "{} is not past the last build and no bisect is open",
                commit.short()
            )));
        };
        if !self.repo.is_ancestor(last_good.as_str(), commit.as_str())?
            || !self.repo.is_ancestor(commit.as_str(), first_bad.as_str())?
        {
            return Err(GitError::Invariant(format!(
                "{} is outside the bisect range {}..{}",
                commit.short(),
                last_good.short(),
                first_bad.short()
            )));
        }

        // A good build clears everything below it; a bad build condemns
        // everything between it and the known-bad tip.
        let (begin, end, label) = match outcome {
            Outcome::Good => (&last_good, commit, BuildState::AssumedGood),
            Outcome::Bad => (commit, &first_bad, BuildState::AssumedBad),
        };
        self.history
            .update_inner_range(begin, end, &CommitState::with_state(label), &keep)
    }

    /// Promote a cornered `first_bad` to BREAKING, and drop the bisect
    /// pointers once the failure is behind the newest good build.
    fn finalize_bisect(&self) -> Result<(), GitError> {
        let Some(first_bad) = self.tracker.first_bad()? else {
            return Ok(());
        };
        let Some(last_good) = self.tracker.last_good()? else {
            return Ok(());
        };

        let leading = self.repo.leading_commits(first_bad.as_str(), 2)?;
        if leading.get(1) == Some(&last_good) {
            let mut record = self.history.commit_state(&first_bad)?;
            if record.state != BuildState::Breaking {
                log::info!("bisect converged: {} breaks the build", first_bad.short());
            }
            record.state = BuildState::Breaking;
            self.history.set_commit_state(&first_bad, &record)?;
        }

        if let Some(last_bad) = self.tracker.last_bad()? {
            if self
                .repo
                .is_ancestor(last_bad.as_str(), last_good.as_str())?
            {
                log::debug!(
                    "failure at {} is behind {}: closing bisect",
                    last_bad.short(),
                    last_good.short()
                );
                self.tracker.clear_first_bad()?;
                self.tracker.clear_last_bad()?;
            }
        }
        Ok(())
    }
}
