//! Error types for git operations.
//!
//! `GitError` is a typed enum that can be pattern-matched and tested.
//! Use `.into()` to convert to `anyhow::Error` while preserving the type
//! for pattern matching; Display produces the user-facing message.

/// Domain errors for git and scheduler-state operations.
///
/// Exit status 1 from the query commands (`rev-parse --verify`,
/// `merge-base --is-ancestor`, `notes show`) is a negative answer, not an
/// error, and never surfaces here. Everything else does.
#[derive(Debug, Clone)]
pub enum GitError {
    /// A git subprocess failed with an unexpected status.
    CommandFailed { command: String, stderr: String },

    /// Output from git could not be parsed.
    ParseError(String),

    /// The tracked branch has no head commit.
    BranchNotFound { branch: String },

    /// A commit argument did not resolve to a commit object.
    UnknownCommit { spec: String },

    /// A state-transition precondition did not hold. The operation is
    /// aborted before any further writes.
    Invariant(String),
}

impl std::error::Error for GitError {}

impl std::fmt::Display for GitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitError::CommandFailed { command, stderr } => {
                if stderr.is_empty() {
                    write!(f, "{command} failed")
                } else {
                    write!(f, "{command} failed: {stderr}")
                }
            }
            GitError::ParseError(message) => write!(f, "{message}"),
            GitError::BranchNotFound { branch } => {
                write!(f, "branch '{branch}' has no head commit")
            }
            GitError::UnknownCommit { spec } => {
                write!(f, "'{spec}' does not name a commit")
            }
            GitError::Invariant(message) => {
                write!(f, "state invariant violated: {message}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_includes_stderr() {
        let err = GitError::CommandFailed {
            command: "git fetch --all".to_string(),
            stderr: "could not resolve host".to_string(),
        };
        let output = err.to_string();
        assert!(output.contains("git fetch --all"));
        assert!(output.contains("could not resolve host"));
    }

    #[test]
    fn test_command_failed_without_stderr() {
        let err = GitError::CommandFailed {
            command: "git rev-list".to_string(),
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "git rev-list failed");
    }

    #[test]
    fn test_into_preserves_type_for_pattern_matching() {
        let err: anyhow::Error = GitError::UnknownCommit {
            spec: "deadbeef".to_string(),
        }
        .into();

        if let Some(GitError::UnknownCommit { spec }) = err.downcast_ref::<GitError>() {
            assert_eq!(spec, "deadbeef");
        } else {
            panic!("Failed to downcast and pattern match");
        }
    }
}
