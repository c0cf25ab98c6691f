//! Sources of raw schema-diff text.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{MigrateResult, MigrationError};
use crate::naming::DEFAULT_HISTORY_TABLE;

/// Produces the raw DDL text to plan.
#[async_trait::async_trait]
pub trait DiffProvider: Send + Sync {
    /// Return the diff, or an empty string when there is nothing to do.
    async fn diff(&self) -> MigrateResult<String>;
}

/// A diff that was captured ahead of time.
#[derive(Debug, Clone)]
pub struct TextDiffProvider {
    text: String,
}

impl TextDiffProvider {
    /// Wrap existing diff text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait::async_trait]
impl DiffProvider for TextDiffProvider {
    async fn diff(&self) -> MigrateResult<String> {
        Ok(self.text.trim().to_string())
    }
}

/// Settings for running the `migra` schema comparison tool.
#[derive(Debug, Clone)]
pub struct MigraConfig {
    /// Executable to run.
    pub program: String,
    /// Database the diff migrates towards (passed second).
    pub source_url: String,
    /// Database the diff is applied to (passed first).
    pub target_url: String,
    /// Flags passed before the URLs.
    pub flags: Vec<String>,
    /// Exit codes that still carry a usable diff.
    pub accepted_exit_codes: Vec<i32>,
    /// Lines containing any of these are dropped from the output.
    pub skip_patterns: Vec<String>,
    /// Maximum time the tool may run.
    pub timeout: Duration,
}

impl MigraConfig {
    /// Create a configuration diffing `target_url` towards `source_url`.
    pub fn new(target_url: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            program: "migra".to_string(),
            source_url: source_url.into(),
            target_url: target_url.into(),
            flags: vec!["--unsafe".to_string()],
            // migra exits 2 when it found differences
            accepted_exit_codes: vec![0, 2],
            skip_patterns: default_skip_patterns(),
            timeout: Duration::from_secs(300),
        }
    }

    /// Set the executable.
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Set the flags passed before the URLs.
    pub fn flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags = flags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the noise line markers.
    pub fn skip_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Set the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Noise emitted by migra and its Python dependencies.
pub fn default_skip_patterns() -> Vec<String> {
    vec![
        "UserWarning:".to_string(),
        "pkg_resources".to_string(),
        "schemainspect".to_string(),
        DEFAULT_HISTORY_TABLE.to_string(),
    ]
}

/// Drop lines containing any skip pattern, then trim.
pub fn filter_noise(output: &str, skip_patterns: &[String]) -> String {
    output
        .lines()
        .filter(|line| !skip_patterns.iter().any(|pattern| line.contains(pattern.as_str())))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Runs `migra --unsafe <target> <source>` and captures its output.
#[derive(Debug, Clone)]
pub struct MigraProvider {
    config: MigraConfig,
}

impl MigraProvider {
    /// Create a provider.
    pub fn new(config: MigraConfig) -> Self {
        Self { config }
    }

    /// The provider configuration.
    pub fn config(&self) -> &MigraConfig {
        &self.config
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.flags)
            .arg(&self.config.target_url)
            .arg(&self.config.source_url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait::async_trait]
impl DiffProvider for MigraProvider {
    async fn diff(&self) -> MigrateResult<String> {
        let program = &self.config.program;
        info!(program = %program, "Running schema diff");

        let output = tokio::time::timeout(self.config.timeout, self.command().output())
            .await
            .map_err(|_| MigrationError::ProviderTimeout {
                seconds: self.config.timeout.as_secs(),
            })?
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    MigrationError::provider(format!("'{}' executable not found in PATH", program))
                }
                _ => MigrationError::provider(format!("failed to run '{}': {}", program, e)),
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            combined.push('\n');
            combined.push_str(&stderr);
        }

        let code = output.status.code();
        debug!(?code, bytes = combined.len(), "Schema diff finished");

        match code {
            Some(code) if self.config.accepted_exit_codes.contains(&code) => {
                Ok(filter_noise(&combined, &self.config.skip_patterns))
            }
            _ => Err(MigrationError::provider(format!(
                "'{}' failed ({}): {}",
                program,
                output.status,
                combined.trim()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_noise() {
        let raw = "\
/usr/lib/python3/site-packages/schemainspect/pg/obj.py:1: UserWarning: pkg_resources is deprecated
  import pkg_resources
alter table \"public\".\"users\" add column \"name\" text;

alter table \"public\".\"flyway_schema_history\" add column x int;
";
        let filtered = filter_noise(raw, &default_skip_patterns());
        assert_eq!(filtered, "alter table \"public\".\"users\" add column \"name\" text;");
    }

    #[test]
    fn test_filter_noise_keeps_everything_without_patterns() {
        assert_eq!(filter_noise("  a\nb  \n", &[]), "a\nb");
    }

    #[test]
    fn test_migra_config_defaults() {
        let config = MigraConfig::new("postgresql://db2", "postgresql://db1");
        assert_eq!(config.program, "migra");
        assert_eq!(config.flags, vec!["--unsafe"]);
        assert_eq!(config.target_url, "postgresql://db2");
        assert_eq!(config.source_url, "postgresql://db1");
        assert!(config.accepted_exit_codes.contains(&2));
    }

    #[test]
    fn test_migra_command_arguments() {
        let provider = MigraProvider::new(
            MigraConfig::new("postgresql://db2", "postgresql://db1").program("/opt/migra"),
        );
        let command = provider.command();
        let std = command.as_std();
        assert_eq!(std.get_program(), "/opt/migra");
        let args: Vec<_> = std.get_args().collect();
        assert_eq!(args, vec!["--unsafe", "postgresql://db2", "postgresql://db1"]);
    }

    #[tokio::test]
    async fn test_text_provider_trims() {
        let provider = TextDiffProvider::new("\n  create table a (id int);\n\n");
        assert_eq!(provider.diff().await.unwrap(), "create table a (id int);");
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let provider = MigraProvider::new(
            MigraConfig::new("postgresql://db2", "postgresql://db1")
                .program("ddlsort-definitely-missing-migra"),
        );
        match provider.diff().await {
            Err(MigrationError::Provider(msg)) => assert!(msg.contains("not found")),
            other => panic!("expected provider error, got {:?}", other),
        }
    }
}
