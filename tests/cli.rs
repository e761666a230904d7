//! End-to-end tests driving the `tbx` binary.

mod common;

use std::process::{Command, Output};

use common::{BRANCH, BUILDER, PLATFORM, TestRepo};
use tinderbox::state::BuildState;

fn tbx(repo: &TestRepo, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tbx"))
        .arg("--repo")
        .arg(repo.root_path())
        .args(["--branch", BRANCH, "--platform", PLATFORM, "--builder", BUILDER])
        .args(args)
        .env("NO_COLOR", "1")
        .env("GIT_CONFIG_GLOBAL", "/dev/null")
        .env("GIT_CONFIG_SYSTEM", "/dev/null")
        .output()
        .expect("spawn tbx")
}

fn tbx_ok(repo: &TestRepo, args: &[&str]) -> String {
    let output = tbx(repo, args);
    assert!(
        output.status.success(),
        "tbx {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("tbx output is UTF-8")
}

#[test]
fn test_sync_succeeds_without_remotes() {
    let (repo, _) = TestRepo::with_linear_history(1);
    tbx_ok(&repo, &["--sync"]);
}

#[test]
fn test_set_commit_running_annotates_the_commit() {
    let (repo, commits) = TestRepo::with_linear_history(3);
    let head = commits[2].as_str();

    tbx_ok(&repo, &[format!("--set-commit-running={head}").as_str()]);
    let record = repo.history().commit_state(&commits[2]).unwrap();
    assert_eq!(record.state, BuildState::Running);
    assert_eq!(record.builder.as_deref(), Some(BUILDER));

    tbx_ok(
        &repo,
        &[
            format!("--set-commit-running={head}").as_str(),
            "--estimated-duration=480",
        ],
    );
    let record = repo.history().commit_state(&commits[2]).unwrap();
    assert_eq!(
        record.estimated_duration,
        Some(chrono::TimeDelta::minutes(480))
    );
}

#[test]
fn test_set_commit_finished_good_updates_pointers() {
    let (repo, commits) = TestRepo::with_linear_history(3);
    let head = commits[2].as_str();

    tbx_ok(
        &repo,
        &[
            format!("--set-commit-finished={head}").as_str(),
            "--result=good",
            "--result-reference=build-42",
        ],
    );

    assert_eq!(repo.tracker().last_good().unwrap(), Some(commits[2].clone()));
    let record = repo.history().commit_state(&commits[2]).unwrap();
    assert_eq!(record.state, BuildState::Good);
    assert_eq!(record.artifactreference.as_deref(), Some("build-42"));
}

#[test]
fn test_set_commit_finished_bad_updates_pointers() {
    let (repo, commits) = TestRepo::with_linear_history(3);
    let head = commits[2].as_str();

    tbx_ok(&repo, &[format!("--set-commit-finished={head}").as_str(), "--result=bad"]);

    assert_eq!(repo.tracker().first_bad().unwrap(), Some(commits[2].clone()));
    assert_eq!(repo.tracker().last_bad().unwrap(), Some(commits[2].clone()));
}

#[test]
fn test_set_commit_finished_rejects_a_bogus_result() {
    let (repo, commits) = TestRepo::with_linear_history(1);
    let head = commits[0].as_str();

    let output = tbx(
        &repo,
        &[format!("--set-commit-finished={head}").as_str(), "--result=sideways"],
    );
    assert!(!output.status.success());
}

#[test]
fn test_unknown_commit_fails_without_touching_state() {
    let (repo, _) = TestRepo::with_linear_history(1);

    let output = tbx(
        &repo,
        &[
            "--set-commit-finished=0000000000000000000000000000000000000000",
            "--result=good",
        ],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not name a commit"), "stderr: {stderr}");
    assert_eq!(repo.tracker().last_good().unwrap(), None);
}

#[test]
fn test_actions_are_mutually_exclusive() {
    let (repo, _) = TestRepo::with_linear_history(1);
    let output = tbx(&repo, &["--sync", "--show-state"]);
    assert!(!output.status.success());
}

#[test]
fn test_show_state_prints_pointers_with_branch_distance() {
    let (repo, commits) = TestRepo::with_linear_history(5);
    tbx_ok(
        &repo,
        &[format!("--set-commit-finished={}", commits[1]).as_str(), "--result=good"],
    );

    let stdout = tbx_ok(&repo, &["--show-state"]);
    assert!(stdout.contains(&format!("on branch {BRANCH} for platform {PLATFORM}")));
    assert!(stdout.contains(&format!("head            : {}", commits[4])));
    assert!(stdout.contains(&format!("last good commit: {} ({BRANCH}-3)", commits[1])));
}

#[test]
fn test_show_history_lists_recent_states() {
    let (repo, commits) = TestRepo::with_linear_history(5);
    tbx_ok(
        &repo,
        &[format!("--set-commit-finished={}", commits[4]).as_str(), "--result=good"],
    );

    let stdout = tbx_ok(&repo, &["--show-history", "--history-count=3"]);
    assert_eq!(stdout.lines().count(), 3);
    let first = stdout.lines().next().unwrap();
    assert!(first.starts_with(commits[4].as_str()));
    assert!(first.contains("GOOD"));
    assert!(stdout.lines().nth(1).unwrap().contains("UNKNOWN"));
}

#[test]
fn test_show_proposals_text_lists_scheduler_names() {
    let (repo, commits) = TestRepo::with_linear_history(5);
    tbx_ok(
        &repo,
        &[format!("--set-commit-finished={}", commits[0]).as_str(), "--result=good"],
    );

    let stdout = tbx_ok(&repo, &["--show-proposals"]);
    assert_eq!(stdout.lines().count(), 4);
    assert!(stdout.contains("HeadScheduler"));
    assert!(stdout.contains(commits[4].as_str()));
}

#[test]
fn test_show_proposals_json_round_trips() {
    let (repo, commits) = TestRepo::with_linear_history(5);
    tbx_ok(
        &repo,
        &[format!("--set-commit-finished={}", commits[0]).as_str(), "--result=good"],
    );
    tbx_ok(
        &repo,
        &[format!("--set-commit-finished={}", commits[3]).as_str(), "--result=bad"],
    );

    let stdout = tbx_ok(&repo, &["--show-proposals", "--format=json"]);
    let proposals: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let list = proposals.as_array().unwrap();
    assert!(!list.is_empty());
    for proposal in list {
        assert!(proposal["score"].is_number());
        assert_eq!(proposal["platform"], PLATFORM);
        assert_eq!(proposal["branch"], BRANCH);
        assert_eq!(proposal["commit"].as_str().unwrap().len(), 40);
    }
    assert!(
        list.iter()
            .any(|p| p["scheduler"] == "BisectScheduler")
    );
    assert!(list.iter().any(|p| p["scheduler"] == "HeadScheduler"));
}
