//! Asynchronous utilities for use with Tokio.
//!
//! Mostly helpers for running blocking work and external commands without
//! stalling the executor.

use std::{panic, process::Output};

use regex::Regex;
use tokio::process::Command;

use crate::prelude::*;

/// Run a blocking function on Tokio's blocking thread pool.
///
/// Panics in `f` are resumed on the calling task, so they behave the same as
/// if `f` had been called directly. We only return an error if the runtime
/// cancelled the task (usually at shutdown).
pub async fn spawn_blocking_propagating_panics<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(value) => Ok(value),
        Err(err) => match err.try_into_panic() {
            Ok(payload) => panic::resume_unwind(payload),
            Err(err) => Err(anyhow!("blocking task was cancelled: {err}")),
        },
    }
}

/// Run an external command to completion and capture its output.
///
/// If the returned future is dropped first (say, because an HTTP client went
/// away), the child process is killed instead of being left to run.
pub async fn run_command(command_name: &str, command: &mut Command) -> Result<Output> {
    command
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("cannot run {command_name}"))
}

/// Report any command failures, and include any error output.
///
/// Standard output and standard error are logged at debug level. Standard
/// error may optionally be checked against a regex, for tools that report
/// some failures without setting an exit code.
pub fn check_for_command_failure(
    command_name: &str,
    output: &Output,
    error_regex: Option<&Regex>,
) -> Result<()> {
    let stderr = String::from_utf8_lossy(&output.stderr);
    debug!(
        command_name = command_name,
        stdout_len = output.stdout.len(),
        "Standard output from command"
    );
    if !stderr.trim().is_empty() {
        debug!(
            command_name = command_name,
            output = %stderr,
            "Standard error from command",
        );
    }

    if output.status.success() {
        if let Some(regex) = error_regex
            && regex.is_match(&stderr)
        {
            return Err(anyhow!(
                "{} printed error output:\n{}",
                command_name,
                stderr,
            ));
        }
        Ok(())
    } else if let Some(exit_code) = output.status.code() {
        Err(anyhow!(
            "{} failed with exit code {} and error output:\n{}",
            command_name,
            exit_code,
            stderr,
        ))
    } else {
        Err(anyhow!(
            "{} failed with error output:\n{}",
            command_name,
            stderr,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, process::Command as StdCommand, time::Duration};

    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_spawn_blocking_returns_value() {
        let value = spawn_blocking_propagating_panics(|| 6 * 7).await.unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_command_failure_reports_exit_code() {
        let output = StdCommand::new("sh")
            .arg("-c")
            .arg("echo broken >&2; exit 3")
            .output()
            .unwrap();
        let err = check_for_command_failure("sh", &output, None).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("exit code 3"), "{msg}");
        assert!(msg.contains("broken"), "{msg}");
    }

    #[test]
    fn test_command_error_regex() {
        let output = StdCommand::new("sh")
            .arg("-c")
            .arg("echo 'could not load anything' >&2")
            .output()
            .unwrap();
        assert!(check_for_command_failure("sh", &output, None).is_ok());
        let regex = Regex::new("could not load").unwrap();
        assert!(check_for_command_failure("sh", &output, Some(&regex)).is_err());
    }

    #[tokio::test]
    async fn test_run_command_captures_output() {
        let output = run_command("sh", Command::new("sh").arg("-c").arg("echo hello"))
            .await
            .unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), "hello\n");
    }

    #[tokio::test]
    async fn test_run_command_missing_program() {
        let err = run_command("no-such-tool", &mut Command::new("no-such-tool-x7q"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cannot run no-such-tool"));
    }

    #[tokio::test]
    async fn test_dropped_command_is_killed() {
        let dir = TempDir::new().unwrap();
        let pid_path = dir.path().join("pid");
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(format!("echo $$ > '{}'; exec sleep 30", pid_path.display()));

        let timed_out = tokio::time::timeout(
            Duration::from_millis(500),
            run_command("sh", &mut command),
        )
        .await
        .is_err();
        assert!(timed_out);

        // A killed child may linger as a zombie until reaped, but it must not
        // still be sleeping.
        let pid = fs::read_to_string(&pid_path).unwrap().trim().to_owned();
        let stat_path = format!("/proc/{pid}/stat");
        for _ in 0..100 {
            match fs::read_to_string(&stat_path) {
                Err(_) => return,
                Ok(stat) if stat.contains(") Z ") => return,
                Ok(_) => tokio::time::sleep(Duration::from_millis(20)).await,
            }
        }
        panic!("process {pid} is still running");
    }
}
