//! Checks run against generated migration files before they are applied.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use regex_lite::Regex;
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::MigrateResult;

/// Lines of linter output kept in a failure.
const LINT_OUTPUT_LINES: usize = 5;

/// Placeholder replaced by the file path in lint arguments.
pub const FILE_PLACEHOLDER: &str = "{file}";

// Matches a DELETE terminated right after its target or ending the line.
static UNSAFE_DELETE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)DELETE\s+FROM\s+\S+;|\bDELETE\s+FROM\s+\S+\s*$")
        .expect("unsafe delete pattern is valid")
});

/// Result of one check on one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum ValidationOutcome {
    /// The file is acceptable.
    Passed,
    /// The file must not be applied.
    Failed(String),
    /// The check could not run.
    Skipped(String),
}

impl ValidationOutcome {
    /// Whether this outcome blocks the migration.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
            Self::Skipped(reason) => write!(f, "skipped: {}", reason),
        }
    }
}

/// A check applied to a single migration file.
#[async_trait::async_trait]
pub trait ArtifactValidator: Send + Sync {
    /// Short name shown in reports.
    fn name(&self) -> &str;

    /// Check the file at `path`.
    async fn validate(&self, path: &Path) -> MigrateResult<ValidationOutcome>;
}

/// Rejects `DELETE FROM <table>` without a `WHERE` clause.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsafeDeleteCheck;

impl UnsafeDeleteCheck {
    /// Check SQL text directly.
    pub fn check(&self, content: &str) -> ValidationOutcome {
        match find_unsafe_delete(content) {
            Some(found) => ValidationOutcome::Failed(format!(
                "DELETE without WHERE clause: {}",
                found.trim()
            )),
            None => ValidationOutcome::Passed,
        }
    }
}

#[async_trait::async_trait]
impl ArtifactValidator for UnsafeDeleteCheck {
    fn name(&self) -> &str {
        "unsafe-delete"
    }

    async fn validate(&self, path: &Path) -> MigrateResult<ValidationOutcome> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(self.check(&content))
    }
}

/// The first unguarded `DELETE` in `content`, if any.
///
/// A `DELETE` whose `WHERE` starts on the next line is also reported.
pub fn find_unsafe_delete(content: &str) -> Option<&str> {
    UNSAFE_DELETE.find(content).map(|m| m.as_str())
}

/// Runs an external SQL linter on each file.
#[derive(Debug, Clone)]
pub struct LintCommand {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl LintCommand {
    /// Create a lint command. The file path is appended unless an argument
    /// contains `{file}`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Split a whitespace-separated command line such as
    /// `sqlfluff lint {file} --config .sqlfluff`.
    ///
    /// Returns `None` for a blank line.
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program).args(parts))
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

    /// Set the timeout per file.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The executable.
    pub fn program(&self) -> &str {
        &self.program
    }

    fn arguments_for(&self, path: &Path) -> Vec<String> {
        let file = path.display().to_string();
        let mut substituted = false;
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.contains(FILE_PLACEHOLDER) {
                    substituted = true;
                    arg.replace(FILE_PLACEHOLDER, &file)
                } else {
                    arg.clone()
                }
            })
            .collect();
        if !substituted {
            args.push(file);
        }
        args
    }
}

#[async_trait::async_trait]
impl ArtifactValidator for LintCommand {
    fn name(&self) -> &str {
        "lint"
    }

    async fn validate(&self, path: &Path) -> MigrateResult<ValidationOutcome> {
        let output = Command::new(&self.program)
            .args(self.arguments_for(path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, output).await {
            Err(_) => {
                return Ok(ValidationOutcome::Failed(format!(
                    "'{}' timed out after {}s",
                    self.program,
                    self.timeout.as_secs()
                )));
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ValidationOutcome::Skipped(format!("'{}' not found", self.program)));
            }
            Ok(result) => result?,
        };

        if output.status.success() {
            return Ok(ValidationOutcome::Passed);
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let excerpt = combined
            .trim()
            .lines()
            .take(LINT_OUTPUT_LINES)
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ValidationOutcome::Failed(if excerpt.is_empty() {
            format!("'{}' exited with {}", self.program, output.status)
        } else {
            excerpt
        }))
    }
}

/// One check's result for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationEntry {
    /// File that was checked.
    pub path: PathBuf,
    /// Validator name.
    pub check: String,
    /// What it concluded.
    pub outcome: ValidationOutcome,
}

impl ValidationEntry {
    /// File name for display.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Results of a [`ValidationSuite`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Entries in run order.
    pub entries: Vec<ValidationEntry>,
}

impl ValidationReport {
    /// Whether no check failed.
    pub fn all_passed(&self) -> bool {
        !self.entries.iter().any(|entry| entry.outcome.is_failed())
    }

    /// Failed entries.
    pub fn failures(&self) -> impl Iterator<Item = &ValidationEntry> {
        self.entries.iter().filter(|entry| entry.outcome.is_failed())
    }

    /// Skipped entries.
    pub fn skipped(&self) -> impl Iterator<Item = &ValidationEntry> {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.outcome, ValidationOutcome::Skipped(_)))
    }
}

/// Ordered validators applied to every file.
///
/// For each file the validators run in order and stop at the first failure.
pub struct ValidationSuite {
    validators: Vec<Box<dyn ArtifactValidator>>,
}

impl Default for ValidationSuite {
    fn default() -> Self {
        Self::new().with(UnsafeDeleteCheck)
    }
}

impl fmt::Debug for ValidationSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationSuite")
            .field(
                "validators",
                &self.validators.iter().map(|v| v.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ValidationSuite {
    /// An empty suite.
    pub fn new() -> Self {
        Self {
            validators: Vec::new(),
        }
    }

    /// Append a validator.
    pub fn with(mut self, validator: impl ArtifactValidator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Number of validators.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Whether the suite has no validators.
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Validate every file.
    pub async fn run<P: AsRef<Path>>(&self, paths: &[P]) -> MigrateResult<ValidationReport> {
        let mut report = ValidationReport::default();

        for path in paths {
            let path = path.as_ref();
            for validator in &self.validators {
                let outcome = validator.validate(path).await?;
                debug!(file = %path.display(), check = validator.name(), %outcome, "Validation");
                let failed = outcome.is_failed();
                report.entries.push(ValidationEntry {
                    path: path.to_path_buf(),
                    check: validator.name().to_string(),
                    outcome,
                });
                if failed {
                    break;
                }
            }
        }

        info!(
            files = paths.len(),
            failures = report.failures().count(),
            "Validation finished"
        );
        Ok(report)
    }
}
