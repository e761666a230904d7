//! Git operations for scheduler state kept inside the repository.
//!
//! The scheduler persists everything in the repository itself: pointer refs
//! under `refs/<namespace>/state/...` and per-commit annotations in git
//! notes. This module is the only place that talks to git; it does so by
//! spawning the `git` CLI, which keeps every write atomic on the git side
//! (`update-ref` and `notes add` are compare-and-swap on the store).

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

mod error;

pub use error::GitError;

/// A full 40-hex git object id.
///
/// Holding a `Commit` does not guarantee the object still exists in the
/// repository; callers get a fresh answer from the adapter every time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Commit(String);

impl Commit {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated id for log lines and human output.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Commit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Commit {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Repository context for git operations.
///
/// Encapsulates the repository path; every operation spawns `git` with that
/// path as the working directory.
#[derive(Debug, Clone)]
pub struct Repository {
    path: PathBuf,
}

impl Repository {
    /// Create a repository context at the specified path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the path this repository context operates on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve an arbitrary revision spec to a commit id.
    ///
    /// Returns `None` when the spec does not name a commit; transport
    /// failures surface as errors.
    pub fn rev_parse(&self, spec: &str) -> Result<Option<Commit>, GitError> {
        let peeled = format!("{spec}^{{commit}}");
        let output = self.run_query(&["rev-parse", "--verify", "--quiet", &peeled])?;
        match output {
            Some(stdout) => {
                let id = stdout.trim();
                if id.len() == 40 {
                    Ok(Some(Commit::new(id)))
                } else {
                    Err(GitError::ParseError(format!(
                        "rev-parse returned '{id}' for '{spec}'"
                    )))
                }
            }
            None => Ok(None),
        }
    }

    /// Resolve a fully qualified ref name, `None` when it does not exist.
    pub fn resolve_ref(&self, refname: &str) -> Result<Option<Commit>, GitError> {
        self.rev_parse(refname)
    }

    /// Resolve the head commit of a local branch.
    pub fn head(&self, branch: &str) -> Result<Option<Commit>, GitError> {
        self.resolve_ref(&format!("refs/heads/{branch}"))
    }

    /// Point a ref at a commit, creating it if necessary.
    pub fn set_ref(&self, refname: &str, commit: &Commit) -> Result<(), GitError> {
        self.run_command(&["update-ref", refname, commit.as_str()])?;
        Ok(())
    }

    /// Delete a ref.
    pub fn clear_ref(&self, refname: &str) -> Result<(), GitError> {
        self.run_command(&["update-ref", "-d", refname])?;
        Ok(())
    }

    /// List the commits in `from..to` on the first-parent chain,
    /// newest first. `from` is excluded, `to` is included.
    pub fn list_commits(&self, from: &str, to: &str) -> Result<Vec<Commit>, GitError> {
        let range = format!("{from}..{to}");
        let stdout = self.run_command(&["rev-list", "--first-parent", &range])?;
        Ok(parse_commit_list(&stdout))
    }

    /// The `count` newest commits reachable from `from`, newest first.
    pub fn leading_commits(&self, from: &str, count: usize) -> Result<Vec<Commit>, GitError> {
        let max = format!("--max-count={count}");
        let stdout = self.run_command(&["rev-list", "--first-parent", &max, from])?;
        Ok(parse_commit_list(&stdout))
    }

    /// Check whether `ancestor` is an ancestor of (or equal to) `descendant`.
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool, GitError> {
        let output = self.run_query(&["merge-base", "--is-ancestor", ancestor, descendant])?;
        Ok(output.is_some())
    }

    /// Count commits on the first-parent chain from `from` (exclusive)
    /// to `to` (inclusive).
    pub fn distance(&self, from: &str, to: &str) -> Result<usize, GitError> {
        let range = format!("{from}..{to}");
        let stdout = self.run_command(&["rev-list", "--first-parent", "--count", &range])?;
        stdout
            .trim()
            .parse()
            .map_err(|e| GitError::ParseError(format!("Failed to parse commit count: {e}")))
    }

    /// Fetch every configured remote.
    pub fn fetch_all(&self) -> Result<(), GitError> {
        self.run_command(&["fetch", "--all"])?;
        Ok(())
    }

    /// Read the note attached to `commit` under `notes_ref`, `None` when
    /// the commit carries no note there.
    pub fn notes_show(&self, notes_ref: &str, commit: &str) -> Result<Option<String>, GitError> {
        self.run_query(&["notes", "--ref", notes_ref, "show", commit])
    }

    /// Attach (or overwrite) the note on `commit` under `notes_ref`.
    pub fn notes_add(
        &self,
        notes_ref: &str,
        commit: &str,
        message: &str,
    ) -> Result<(), GitError> {
        self.run_command(&["notes", "--ref", notes_ref, "add", "-f", "-m", message, commit])?;
        Ok(())
    }

    /// Run a git command in this repository's context and return stdout.
    ///
    /// Any nonzero exit status is a failure.
    pub fn run_command(&self, args: &[&str]) -> Result<String, GitError> {
        let output = self.spawn(args)?;
        if !output.status.success() {
            return Err(self.command_failed(args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run a query command whose exit status 1 means "no" / "not found".
    ///
    /// Returns stdout on status 0, `None` on status 1, and an error for
    /// anything else.
    fn run_query(&self, args: &[&str]) -> Result<Option<String>, GitError> {
        let output = self.spawn(args)?;
        match output.status.code() {
            Some(0) => Ok(Some(String::from_utf8_lossy(&output.stdout).to_string())),
            Some(1) => Ok(None),
            _ => Err(self.command_failed(args, &output)),
        }
    }

    fn spawn(&self, args: &[&str]) -> Result<Output, GitError> {
        log::debug!("git {} (in {})", args.join(" "), self.path.display());
        Command::new("git")
            .args(args)
            .current_dir(&self.path)
            .output()
            .map_err(|e| GitError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                stderr: e.to_string(),
            })
    }

    fn command_failed(&self, args: &[&str], output: &Output) -> GitError {
        GitError::CommandFailed {
            command: format!("git {}", args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }
}

/// Extract commit ids from `rev-list` output, dropping anything that is
/// not a full object id (trailing blank lines in particular).
fn parse_commit_list(output: &str) -> Vec<Commit> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.len() == 40)
        .map(Commit::new)
        .collect()
}
