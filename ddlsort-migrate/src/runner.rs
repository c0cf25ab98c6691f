//! Applying generated migration files.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{MigrateResult, MigrationError};
use crate::file::MigrationArtifact;

/// Applies a batch of migration files to the target database.
#[async_trait::async_trait]
pub trait MigrationRunner: Send + Sync {
    /// Apply `artifacts` in order.
    async fn run(&self, artifacts: &[MigrationArtifact]) -> MigrateResult<RunOutcome>;
}

/// What a successful run reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    /// Number of files handed to the runner.
    pub applied: usize,
    /// Captured output.
    pub output: String,
    /// Wall time in milliseconds.
    pub duration_ms: u64,
}

/// Runs an external command that picks up the migration directory, such as
/// `mvn clean compile flyway:migrate -Pdev -U`.
///
/// Environment variables are set on the child process only.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl CommandRunner {
    /// Create a runner for `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: None,
            timeout: None,
        }
    }

    /// Set the arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Run the command in `dir`.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Kill the command if it runs longer than `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The command line as it would be typed.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }
}

#[async_trait::async_trait]
impl MigrationRunner for CommandRunner {
    async fn run(&self, artifacts: &[MigrationArtifact]) -> MigrateResult<RunOutcome> {
        info!(command = %self.command_line(), files = artifacts.len(), "Running migrations");
        let start = Instant::now();

        let pending = self.command().output();
        let result = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, pending).await.map_err(|_| {
                MigrationError::runner(format!(
                    "'{}' timed out after {}s",
                    self.program,
                    timeout.as_secs()
                ))
            })?,
            None => pending.await,
        };

        let output = result.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                MigrationError::runner(format!("'{}' executable not found in PATH", self.program))
            }
            _ => MigrationError::runner(format!("failed to run '{}': {}", self.program, e)),
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(status = %output.status, duration_ms, "Runner finished");

        if !output.status.success() {
            return Err(MigrationError::runner(format!(
                "'{}' exited with {}\n{}",
                self.command_line(),
                output.status,
                combined.trim()
            )));
        }

        Ok(RunOutcome {
            applied: artifacts.len(),
            output: combined,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line() {
        let runner = CommandRunner::new("mvn")
            .args(["clean", "compile", "flyway:migrate", "-Pdev", "-U"])
            .env("MAVEN_OPTS", "--add-opens java.base/java.lang=ALL-UNNAMED");
        assert_eq!(runner.command_line(), "mvn clean compile flyway:migrate -Pdev -U");

        let command = runner.command();
        let envs: Vec<_> = command.as_std().get_envs().collect();
        assert_eq!(envs.len(), 1);
        assert_eq!(envs[0].0, "MAVEN_OPTS");
    }

    #[tokio::test]
    async fn test_missing_program() {
        let runner = CommandRunner::new("ddlsort-definitely-missing-runner");
        match runner.run(&[]).await {
            Err(MigrationError::Runner(msg)) => assert!(msg.contains("not found")),
            other => panic!("expected runner error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_run_passes_env() {
        let runner = CommandRunner::new("sh")
            .args(["-c", "printf '%s' \"$DDLSORT_RUNNER_TEST\""])
            .env("DDLSORT_RUNNER_TEST", "applied");
        let outcome = runner.run(&[]).await.unwrap();
        assert_eq!(outcome.output, "applied");
        assert_eq!(outcome.applied, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_run_carries_output() {
        let runner = CommandRunner::new("sh").args(["-c", "echo flyway broke >&2; exit 3"]);
        match runner.run(&[]).await {
            Err(MigrationError::Runner(msg)) => assert!(msg.contains("flyway broke")),
            other => panic!("expected runner error, got {:?}", other),
        }
    }
}
