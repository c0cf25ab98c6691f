//! Versioned migration artifacts on disk.
//!
//! Every table group of an [`ExecutionPlan`] becomes one
//! `V<version>__<timestamp>_<name>.sql` file, numbered consecutively after the
//! highest version already in the directory. The unattributed bucket is
//! written last.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{Local, NaiveDateTime};
use regex_lite::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{MigrateResult, MigrationError};
use crate::plan::{ExecutionPlan, OTHER_GROUP};
use crate::statement::Statement;

const BANNER: &str = "-- ============================================";

static VERSIONED_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^V(\d+)__(?:\d{8}_\d{4}_)?(.+)\.sql$").expect("versioned file pattern is valid")
});

static STATEMENT_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^-- Statements: (\d+)\s*$").expect("statement count pattern is valid")
});

/// How a plan is written.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// First version to use; scanned from the directory when `None`.
    pub start_version: Option<u32>,
    /// Timestamp used in file names and headers.
    pub generated_at: NaiveDateTime,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            start_version: None,
            generated_at: Local::now().naive_local(),
        }
    }
}

impl WriteOptions {
    /// Options stamped with the current local time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start numbering at `version`.
    pub fn start_version(mut self, version: u32) -> Self {
        self.start_version = Some(version);
        self
    }

    /// Use a fixed timestamp.
    pub fn generated_at(mut self, at: NaiveDateTime) -> Self {
        self.generated_at = at;
        self
    }
}

/// A generated migration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationArtifact {
    /// Location on disk.
    pub path: PathBuf,
    /// Version number from the `V<n>__` prefix.
    pub version: u32,
    /// Table name, or `other_changes`.
    pub name: String,
    /// Number of statements in the body.
    pub statement_count: usize,
    /// SHA-256 of the file content, hex encoded.
    pub checksum: String,
}

impl MigrationArtifact {
    /// Read an existing artifact back from disk.
    pub async fn load(path: impl AsRef<Path>) -> MigrateResult<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                MigrationError::invalid_config(format!("invalid path: {}", path.display()))
            })?;

        let (version, name) = parse_file_name(file_name).ok_or_else(|| {
            MigrationError::invalid_config(format!(
                "'{}' is not a V<version>__<name>.sql migration",
                file_name
            ))
        })?;

        let content = tokio::fs::read_to_string(path).await?;
        let statement_count = STATEMENT_COUNT
            .captures(&content)
            .and_then(|caps| caps[1].parse().ok())
            .unwrap_or_else(|| crate::statement::split_statements(&content).count());

        Ok(Self {
            path: path.to_path_buf(),
            version,
            name,
            statement_count,
            checksum: checksum(&content),
        })
    }

    /// The file name.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Reads and writes versioned migration files in one directory.
#[derive(Debug, Clone)]
pub struct MigrationFileManager {
    migrations_dir: PathBuf,
}

impl MigrationFileManager {
    /// Create a manager for `migrations_dir`.
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
        }
    }

    /// The migrations directory.
    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Ensure the migrations directory exists.
    pub async fn ensure_dir(&self) -> MigrateResult<()> {
        tokio::fs::create_dir_all(&self.migrations_dir).await?;
        Ok(())
    }

    /// Highest existing version plus one; 1 for a missing or empty directory.
    pub async fn next_version(&self) -> MigrateResult<u32> {
        if !tokio::fs::try_exists(&self.migrations_dir).await? {
            return Ok(1);
        }

        let mut highest = 0;
        let mut entries = tokio::fs::read_dir(&self.migrations_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if let Some((version, _)) = name.to_str().and_then(parse_file_name) {
                highest = highest.max(version);
            }
        }

        Ok(highest + 1)
    }

    /// Existing versioned artifacts, ordered by version.
    pub async fn list_artifacts(&self) -> MigrateResult<Vec<MigrationArtifact>> {
        let mut artifacts = Vec::new();
        if !tokio::fs::try_exists(&self.migrations_dir).await? {
            return Ok(artifacts);
        }

        let mut entries = tokio::fs::read_dir(&self.migrations_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let versioned = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| parse_file_name(n).is_some());
            if versioned {
                artifacts.push(MigrationArtifact::load(&path).await?);
            }
        }

        artifacts.sort_by_key(|artifact| artifact.version);
        Ok(artifacts)
    }

    /// Write one file per table group, then the other bucket.
    ///
    /// If any file fails to write, the files already written for this plan
    /// are removed before the error is returned.
    pub async fn write_plan(
        &self,
        plan: &ExecutionPlan,
        options: &WriteOptions,
    ) -> MigrateResult<Vec<MigrationArtifact>> {
        self.ensure_dir().await?;

        let version = match options.start_version {
            Some(version) => version,
            None => self.next_version().await?,
        };
        let mut artifacts = Vec::with_capacity(plan.groups().len() + 1);

        if let Err(e) = self.write_groups(plan, version, options, &mut artifacts).await {
            let removed = self.delete_artifacts(&artifacts).await;
            warn!(removed, error = %e, "Writing the plan failed, partial files removed");
            return Err(e);
        }

        info!(
            count = artifacts.len(),
            dir = %self.migrations_dir.display(),
            "Migration files written"
        );
        Ok(artifacts)
    }

    async fn write_groups(
        &self,
        plan: &ExecutionPlan,
        mut version: u32,
        options: &WriteOptions,
        artifacts: &mut Vec<MigrationArtifact>,
    ) -> MigrateResult<()> {
        let timestamp = options.generated_at.format("%Y%m%d_%H%M").to_string();

        for group in plan.groups() {
            let depends = plan.dependencies_of(group.name());
            let order_info = if depends.is_empty() {
                "No dependencies".to_string()
            } else {
                format!("Depends on: {}", depends.join(", "))
            };
            let artifact = self
                .write_artifact(
                    version,
                    &timestamp,
                    group.name(),
                    group.statements(),
                    &order_info,
                    options,
                )
                .await?;
            artifacts.push(artifact);
            version += 1;
        }

        if !plan.other().is_empty() {
            let artifact = self
                .write_artifact(
                    version,
                    &timestamp,
                    OTHER_GROUP,
                    plan.other(),
                    "Runs after all table migrations",
                    options,
                )
                .await?;
            artifacts.push(artifact);
        }

        Ok(())
    }

    async fn write_artifact(
        &self,
        version: u32,
        timestamp: &str,
        name: &str,
        statements: &[Statement],
        order_info: &str,
        options: &WriteOptions,
    ) -> MigrateResult<MigrationArtifact> {
        let file_name = format!("V{}__{}_{}.sql", version, timestamp, safe_name(name));
        let path = self.migrations_dir.join(&file_name);
        let content = render_artifact(name, statements, order_info, &options.generated_at);

        tokio::fs::write(&path, &content).await?;
        debug!(file = %file_name, statements = statements.len(), "Migration file written");

        Ok(MigrationArtifact {
            path,
            version,
            name: name.to_string(),
            statement_count: statements.len(),
            checksum: checksum(&content),
        })
    }

    /// Remove generated files. Individual failures are logged, not returned.
    ///
    /// Returns the number of files removed.
    pub async fn delete_artifacts(&self, artifacts: &[MigrationArtifact]) -> usize {
        let mut removed = 0;
        for artifact in artifacts {
            match tokio::fs::remove_file(&artifact.path).await {
                Ok(()) => {
                    debug!(file = %artifact.file_name(), "Migration file deleted");
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(
                        file = %artifact.file_name(),
                        error = %e,
                        "Could not delete migration file"
                    );
                }
            }
        }
        removed
    }
}

/// Render the content of one migration file.
pub fn render_artifact(
    name: &str,
    statements: &[Statement],
    order_info: &str,
    generated_at: &NaiveDateTime,
) -> String {
    let mut out = String::new();
    out.push_str(BANNER);
    out.push('\n');
    out.push_str(&format!("-- Table: {}\n", name));
    if !order_info.is_empty() {
        out.push_str(&format!("-- {}\n", order_info));
    }
    out.push_str(&format!("-- Generated: {}\n", generated_at.format("%Y-%m-%d %H:%M:%S")));
    out.push_str(&format!("-- Statements: {}\n", statements.len()));
    out.push_str(BANNER);
    out.push_str("\n\n");

    let body: Vec<&str> = statements.iter().map(Statement::as_str).collect();
    out.push_str(&body.join("\n\n"));
    out.push_str(&format!("\n\n-- End of {} migration\n", name));
    out
}

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
pub fn safe_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Hex-encoded SHA-256 of migration content.
pub fn checksum(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

fn parse_file_name(file_name: &str) -> Option<(u32, String)> {
    let caps = VERSIONED_FILE.captures(file_name)?;
    let version = caps[1].parse().ok()?;
    Some((version, caps[2].to_string()))
}
