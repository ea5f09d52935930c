//! Integration tests for observer-log
//!
//! Fixture-driven tests always run. Tests against a scratch repository need a
//! `git` executable on `PATH` and are skipped without one.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU32, Ordering};

use observer_log::{
    FixtureSource, GitCli, LogSource, ShowDetail, SortOrder, SourceError, parse_line,
};
use similar_asserts::assert_eq;

static REPO_COUNTER: AtomicU32 = AtomicU32::new(0);

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn read_records(source: &dyn LogSource, path: &str) -> Vec<observer_log::CommitRecord> {
    let mut stream = source.log(path, SortOrder::Ascending).expect("open log");
    let mut records = Vec::new();
    while let Some(line) = stream.next_line().expect("read line") {
        if let Some(record) = parse_line(&line, None).expect("parse line") {
            records.push(record);
        }
    }
    stream.finish().expect("finish stream");
    records
}

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(["-c", "commit.gpgsign=false"])
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "Test Author")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test Author")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .status()
        .expect("run git");
    assert!(status.success(), "git {args:?} failed");
}

/// Scratch repository with two commits in `src/` and one in `docs/`
fn scratch_repo() -> PathBuf {
    let counter = REPO_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "observer-log-test-{}-{}",
        std::process::id(),
        counter
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(dir.join("src")).expect("create src");
    std::fs::create_dir_all(dir.join("docs")).expect("create docs");

    git(&dir, &["init", "-q"]);
    for (file, message) in [
        ("src/lib.rs", "Add library"),
        ("docs/README.md", "Add docs"),
        ("src/main.rs", "Add binary"),
    ] {
        std::fs::write(dir.join(file), message).expect("write file");
        git(&dir, &["add", file]);
        git(&dir, &["commit", "-q", "-m", message]);
    }
    dir
}

#[test]
fn test_fixture_file_parses_every_line() {
    let source = FixtureSource::from_file(fixture("gitlog-dummy.txt")).expect("load fixture");
    let line_count = String::from_utf8_lossy(source.content()).lines().count();

    let records = read_records(&source, "any");
    assert_eq!(records.len(), line_count);
    assert!(records.iter().all(|r| !r.identifier.is_empty()));
    assert_eq!(records[0].refs, "HEAD -> main, origin/main");
}

#[test]
fn test_redundant_fixture_repeats_identifiers() {
    let source =
        FixtureSource::from_file(fixture("gitlog-dummy-redundant.txt")).expect("load fixture");
    let records = read_records(&source, "any");

    let mut identifiers: Vec<&str> = records.iter().map(|r| r.identifier.as_str()).collect();
    let total = identifiers.len();
    identifiers.sort_unstable();
    identifiers.dedup();
    assert!(identifiers.len() < total);
    assert_eq!(identifiers.len(), 5);
}

#[test]
fn test_malformed_fixture_fails_to_parse() {
    let source = FixtureSource::from_file(fixture("gitlog-malformed.txt")).expect("load fixture");
    let stream = source.log("any", SortOrder::Descending).expect("open log");
    let results: Vec<_> = stream
        .map(|line| parse_line(&line.expect("read line"), None))
        .collect();
    assert!(results[0].is_ok());
    assert!(results[1].as_ref().is_err_and(|e| e.is_format_error()));
}

#[test]
fn test_git_cli_reads_scratch_repository() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let repo = scratch_repo();
    let git = GitCli::new(&repo);

    git.fetch().expect("fetch without remotes succeeds");

    let src = read_records(&git, "src");
    let summaries: Vec<&str> = src.iter().map(|r| r.summary.as_str()).collect();
    assert_eq!(summaries, vec!["Add library", "Add binary"]);
    assert!(src.iter().all(|r| r.author == "Test Author"));

    let docs = read_records(&git, "docs");
    assert_eq!(docs.len(), 1);

    let shown = git
        .show(&docs[0].identifier, ShowDetail::Fuller)
        .expect("show commit");
    assert!(shown.contains("Add docs"));
    assert!(shown.contains("CommitDate"));

    let _ = std::fs::remove_dir_all(&repo);
}

#[test]
fn test_git_cli_descending_lists_newest_first() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let repo = scratch_repo();
    let git = GitCli::new(&repo);

    let mut stream = git.log("src", SortOrder::Descending).expect("open log");
    let mut summaries = Vec::new();
    while let Some(line) = stream.next_line().expect("read line") {
        if let Some(record) = parse_line(&line, None).expect("parse") {
            summaries.push(record.summary);
        }
    }
    stream.finish().expect("finish");
    assert_eq!(summaries, vec!["Add binary", "Add library"]);

    let _ = std::fs::remove_dir_all(&repo);
}

#[test]
fn test_git_cli_outside_repository_is_exit_error() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let missing = std::env::temp_dir().join("observer-log-no-such-repository");
    let git = GitCli::new(&missing);
    let stream = git.log("src", SortOrder::Ascending).expect("spawn git");
    match stream.finish() {
        Err(SourceError::Exit { command, .. }) => assert!(command.contains("log")),
        other => panic!("Expected Exit error, got {other:?}"),
    }
}
