//! Pointer refs that persist per-(platform, branch) scheduler state.

use crate::config::DEFAULT_REF_NAMESPACE;
use crate::git::{Commit, GitError, Repository};

/// Accessor over the three pointer refs of one (platform, branch) pair.
///
/// The pointers live under
/// `refs/<namespace>/state/<platform>/<branch>/{last_good,first_bad,last_bad}`
/// so trackers for different platforms and branches coexist in one
/// repository, and every update is an atomic `update-ref`.
#[derive(Debug, Clone)]
pub struct RepoTracker {
    platform: String,
    branch: String,
    repo: Repository,
    namespace: String,
}

impl RepoTracker {
    pub fn new(platform: &str, branch: &str, repo: Repository) -> Self {
        Self {
            platform: platform.to_string(),
            branch: branch.to_string(),
            repo,
            namespace: DEFAULT_REF_NAMESPACE.to_string(),
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    fn pointer_ref(&self, name: &str) -> String {
        format!(
            "refs/{}/state/{}/{}/{}",
            self.namespace, self.platform, self.branch, name
        )
    }

    /// Head commit of the tracked branch.
    pub fn head(&self) -> Result<Option<Commit>, GitError> {
        self.repo.head(&self.branch)
    }

    pub fn last_good(&self) -> Result<Option<Commit>, GitError> {
        self.repo.resolve_ref(&self.pointer_ref("last_good"))
    }

    pub fn set_last_good(&self, commit: &Commit) -> Result<(), GitError> {
        self.repo.set_ref(&self.pointer_ref("last_good"), commit)
    }

    pub fn clear_last_good(&self) -> Result<(), GitError> {
        self.repo.clear_ref(&self.pointer_ref("last_good"))
    }

    pub fn first_bad(&self) -> Result<Option<Commit>, GitError> {
        self.repo.resolve_ref(&self.pointer_ref("first_bad"))
    }

    pub fn set_first_bad(&self, commit: &Commit) -> Result<(), GitError> {
        self.repo.set_ref(&self.pointer_ref("first_bad"), commit)
    }

    pub fn clear_first_bad(&self) -> Result<(), GitError> {
        self.repo.clear_ref(&self.pointer_ref("first_bad"))
    }

    pub fn last_bad(&self) -> Result<Option<Commit>, GitError> {
        self.repo.resolve_ref(&self.pointer_ref("last_bad"))
    }

    pub fn set_last_bad(&self, commit: &Commit) -> Result<(), GitError> {
        self.repo.set_ref(&self.pointer_ref("last_bad"), commit)
    }

    pub fn clear_last_bad(&self) -> Result<(), GitError> {
        self.repo.clear_ref(&self.pointer_ref("last_bad"))
    }

    /// The most recent completed evaluation on the branch.
    ///
    /// When both pointers exist this is `last_bad` if the bisect has
    /// advanced past the older good commit, otherwise `last_good`.
    pub fn last_build(&self) -> Result<Option<Commit>, GitError> {
        let last_bad = self.last_bad()?;
        let last_good = self.last_good()?;
        match (last_good, last_bad) {
            (None, last_bad) => Ok(last_bad),
            (last_good, None) => Ok(last_good),
            (Some(last_good), Some(last_bad)) => {
                if self
                    .repo
                    .is_ancestor(last_good.as_str(), last_bad.as_str())?
                {
                    Ok(Some(last_bad))
                } else {
                    Ok(Some(last_good))
                }
            }
        }
    }

    /// Commits on the first-parent chain from `commit` up to the branch
    /// head, for human-readable pointer positions.
    pub fn branch_distance(&self, commit: &Commit) -> Result<usize, GitError> {
        self.repo.distance(commit.as_str(), &self.branch)
    }
}
