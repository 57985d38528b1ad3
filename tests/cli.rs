//! CLI test cases.
//!
//! These use the `echo` driver, which replies with the prompt it was sent,
//! so none of them need network access. The ignored tests need `tesseract`
//! or `pdftotext` installed; the rest use files that fail to decode.

use std::{fs, process::Command};

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Create a new `Command` with our binary.
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("math-feedback").unwrap();
    cmd.env_remove("FEEDBACK_PROMPT").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help() {
    cmd().arg("--help").assert().success();
}

#[test]
fn test_version() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_analyze_rejects_unsupported_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("answer.txt");
    fs::write(&path, "2+2=4").unwrap();

    cmd()
        .arg("analyze")
        .arg(&path)
        .args(["--driver", "echo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("지원하지 않는 파일 형식입니다"));
}

#[test]
fn test_analyze_missing_file() {
    let dir = TempDir::new().unwrap();
    cmd()
        .arg("analyze")
        .arg(dir.path().join("nope.png"))
        .args(["--driver", "echo"])
        .assert()
        .failure();
}

#[test]
fn test_analyze_corrupt_image_still_responds() {
    let dir = TempDir::new().unwrap();
    let scratch = dir.path().join("scratch");
    fs::create_dir(&scratch).unwrap();
    let path = dir.path().join("answer.PNG");
    fs::write(&path, "not really a png").unwrap();

    cmd()
        .arg("analyze")
        .arg(&path)
        .args(["--driver", "echo", "--routine", "check each step"])
        .arg("--scratch-dir")
        .arg(&scratch)
        .assert()
        .success()
        .stdout(predicate::str::contains("답안:"))
        .stdout(predicate::str::contains("routine: check each step"));

    assert_eq!(fs::read_dir(&scratch).unwrap().count(), 0);
}

#[test]
fn test_analyze_writes_output_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("answer.jpg");
    fs::write(&path, "not really a jpeg").unwrap();
    let output = dir.path().join("feedback.txt");

    cmd()
        .arg("analyze")
        .arg(&path)
        .args(["--driver", "echo", "--output"])
        .arg(&output)
        .assert()
        .success();

    let feedback = fs::read_to_string(&output).unwrap();
    assert!(feedback.contains("답안:"));
    assert!(!feedback.contains("피드백 고려사항"));
}

#[test]
fn test_analyze_custom_prompt() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("answer.png");
    fs::write(&path, "not really a png").unwrap();
    let prompt = dir.path().join("prompt.toml");
    fs::write(
        &prompt,
        r#"
system = "Be brief."
problem = "ANSWER<{{problem_text}}>"
criteria = "CRITERIA<{{criteria_text}}>"
"#,
    )
    .unwrap();

    cmd()
        .arg("analyze")
        .arg(&path)
        .args(["--driver", "echo", "--other", "units"])
        .arg("--prompt")
        .arg(&prompt)
        .assert()
        .success()
        .stdout(predicate::str::contains("ANSWER<>"))
        .stdout(predicate::str::contains("CRITERIA<other: units>"));
}

#[test]
fn test_analyze_bad_prompt_fails_at_startup() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("answer.png");
    fs::write(&path, "not really a png").unwrap();
    let prompt = dir.path().join("prompt.toml");
    fs::write(&prompt, "system = \"only a system prompt\"\n").unwrap();

    cmd()
        .arg("analyze")
        .arg(&path)
        .args(["--driver", "echo"])
        .arg("--prompt")
        .arg(&prompt)
        .assert()
        .failure();
}

#[test]
#[ignore = "Needs pdftotext"]
fn test_analyze_pdf() {
    let dir = TempDir::new().unwrap();
    let scratch = dir.path().join("scratch");
    fs::create_dir(&scratch).unwrap();

    cmd()
        .arg("analyze")
        .arg("tests/fixtures/two_plus_two.pdf")
        .args(["--driver", "echo"])
        .arg("--criteria-document")
        .arg("tests/fixtures/two_plus_two.pdf")
        .arg("--scratch-dir")
        .arg(&scratch)
        .assert()
        .success()
        .stdout(predicate::str::contains("2+2=4"))
        .stdout(predicate::str::contains("피드백 고려사항"));

    assert_eq!(fs::read_dir(&scratch).unwrap().count(), 0);
}

#[test]
#[ignore = "Needs tesseract with kor and eng language data"]
fn test_analyze_png() {
    let dir = TempDir::new().unwrap();
    let scratch = dir.path().join("scratch");
    fs::create_dir(&scratch).unwrap();

    cmd()
        .arg("analyze")
        .arg("tests/fixtures/two_plus_two.png")
        .args(["--driver", "echo"])
        .arg("--scratch-dir")
        .arg(&scratch)
        .assert()
        .success()
        .stdout(predicate::str::contains("2+2=4"));

    assert_eq!(fs::read_dir(&scratch).unwrap().count(), 0);
}
