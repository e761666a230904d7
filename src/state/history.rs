//! The per-platform annotation store, backed by git notes.

use crate::config::DEFAULT_REF_NAMESPACE;
use crate::git::{Commit, GitError, Repository};
use crate::state::{BuildState, CommitState};

/// Per-commit build-state records for one platform.
///
/// Records are JSON payloads in git notes under
/// `refs/notes/<namespace>/history/<platform>`. Platforms share commits but
/// never annotations.
#[derive(Debug, Clone)]
pub struct BuildHistory {
    platform: String,
    repo: Repository,
    namespace: String,
}

impl BuildHistory {
    pub fn new(platform: &str, repo: Repository) -> Self {
        Self {
            platform: platform.to_string(),
            repo,
            namespace: DEFAULT_REF_NAMESPACE.to_string(),
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    fn notes_ref(&self) -> String {
        format!("refs/notes/{}/history/{}", self.namespace, self.platform)
    }

    /// The stored record for `commit`, or the UNKNOWN record when the
    /// commit carries no annotation.
    pub fn commit_state(&self, commit: &Commit) -> Result<CommitState, GitError> {
        match self.repo.notes_show(&self.notes_ref(), commit.as_str())? {
            Some(payload) if !payload.trim().is_empty() => serde_json::from_str(&payload)
                .map_err(|e| {
                    GitError::ParseError(format!(
                        "invalid build-state record on {}: {e}",
                        commit.short()
                    ))
                }),
            _ => Ok(CommitState::default()),
        }
    }

    /// Store `state` as the record for `commit`, replacing any previous
    /// record.
    pub fn set_commit_state(
        &self,
        commit: &Commit,
        state: &CommitState,
    ) -> Result<(), GitError> {
        let payload = serde_json::to_string(state)
            .map_err(|e| GitError::ParseError(format!("failed to encode record: {e}")))?;
        self.repo
            .notes_add(&self.notes_ref(), commit.as_str(), &payload)
    }

    /// The `count` newest commits on `branch` with their records, newest
    /// first.
    pub fn recent_commit_states(
        &self,
        branch: &str,
        count: usize,
    ) -> Result<Vec<(Commit, CommitState)>, GitError> {
        let commits = self.repo.leading_commits(branch, count)?;
        commits
            .into_iter()
            .map(|commit| {
                let state = self.commit_state(&commit)?;
                Ok((commit, state))
            })
            .collect()
    }

    /// Paint every commit strictly between `begin` and `end` with `state`,
    /// skipping commits whose current state is in `skip`.
    ///
    /// This is how one real outcome labels a whole stretch of neighbors
    /// without clobbering other real outcomes.
    pub fn update_inner_range(
        &self,
        begin: &Commit,
        end: &Commit,
        state: &CommitState,
        skip: &[BuildState],
    ) -> Result<(), GitError> {
        let commits = self.repo.list_commits(begin.as_str(), end.as_str())?;
        // list_commits includes `end`; the painted range is strict on both sides
        for commit in commits.iter().skip(1) {
            let current = self.commit_state(commit)?;
            if !skip.contains(&current.state) {
                self.set_commit_state(commit, state)?;
            }
        }
        Ok(())
    }
}
