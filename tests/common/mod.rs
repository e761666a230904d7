//! Shared test helper: throwaway git repositories with known histories.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;
use tinderbox::git::{Commit, Repository};
use tinderbox::scheduler::SchedulerContext;
use tinderbox::state::{BuildHistory, RepoTracker, StateUpdater};

pub const PLATFORM: &str = "linux";
pub const BRANCH: &str = "master";
pub const BUILDER: &str = "testbuilder";

/// A real git repository in a temp directory, dropped on test exit.
pub struct TestRepo {
    _dir: TempDir,
    root: PathBuf,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let root = dir.path().to_path_buf();
        let repo = Self { _dir: dir, root };
        repo.git(&["init", "--initial-branch", BRANCH]);
        repo.git(&["config", "user.name", "Test Builder"]);
        repo.git(&["config", "user.email", "builder@example.invalid"]);
        repo.git(&["config", "commit.gpgsign", "false"]);
        repo
    }

    /// A repository with `count` empty commits on the tracked branch.
    /// Returns the commits oldest first, so `commits[0]` is the root.
    pub fn with_linear_history(count: usize) -> (Self, Vec<Commit>) {
        let repo = Self::new();
        let commits = (0..count)
            .map(|n| repo.commit(&format!("commit {n}")))
            .collect();
        (repo, commits)
    }

    pub fn commit(&self, message: &str) -> Commit {
        self.git(&["commit", "--allow-empty", "-m", message]);
        Commit::new(self.git(&["rev-parse", "HEAD"]).trim())
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    pub fn repository(&self) -> Repository {
        Repository::at(&self.root)
    }

    pub fn tracker(&self) -> RepoTracker {
        RepoTracker::new(PLATFORM, BRANCH, self.repository())
    }

    pub fn history(&self) -> BuildHistory {
        BuildHistory::new(PLATFORM, self.repository())
    }

    pub fn updater(&self) -> StateUpdater {
        StateUpdater::new(PLATFORM, BRANCH, &self.root)
    }

    pub fn scheduler_context(&self) -> SchedulerContext {
        SchedulerContext::new(PLATFORM, BRANCH, &self.root)
    }

    /// Run git in the repository, panicking on failure.
    pub fn git(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .env("GIT_CONFIG_GLOBAL", "/dev/null")
            .env("GIT_CONFIG_SYSTEM", "/dev/null")
            .output()
            .expect("spawn git");
        assert!(
            output.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).expect("git output is UTF-8")
    }
}
