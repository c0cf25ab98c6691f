//! Migration engine: diff, plan, write, validate and apply.

use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{MigrateResult, MigrationError};
use crate::file::{MigrationArtifact, MigrationFileManager, WriteOptions};
use crate::plan::{ExecutionPlan, PlanConfig, Planner};
use crate::provider::DiffProvider;
use crate::runner::{MigrationRunner, RunOutcome};
use crate::validate::{ValidationReport, ValidationSuite};

/// Configuration for the migration engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory the versioned files are written to.
    pub migrations_dir: PathBuf,
    /// Planner settings.
    pub plan: PlanConfig,
    /// Plan only; write and apply nothing.
    pub dry_run: bool,
    /// Apply without running the validation suite.
    pub skip_validation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("./migrations"),
            plan: PlanConfig::default(),
            dry_run: false,
            skip_validation: false,
        }
    }
}

impl EngineConfig {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the migrations directory.
    pub fn migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    /// Set the planner configuration.
    pub fn plan(mut self, plan: PlanConfig) -> Self {
        self.plan = plan;
        self
    }

    /// Enable dry-run mode.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Skip validation before applying.
    pub fn skip_validation(mut self, skip: bool) -> Self {
        self.skip_validation = skip;
        self
    }
}

/// Result of [`MigrationEngine::migrate`].
#[derive(Debug, Clone, Serialize)]
pub struct EngineResult {
    /// Number of table groups planned.
    pub table_count: usize,
    /// Number of statements planned.
    pub statement_count: usize,
    /// Files written (and, unless dry-run, applied).
    pub artifacts: Vec<MigrationArtifact>,
    /// Validation results, when validation ran.
    pub validation: Option<ValidationReport>,
    /// Runner results, when migrations were applied.
    pub run: Option<RunOutcome>,
    /// Warnings, such as tables left in a dependency cycle.
    pub warnings: Vec<String>,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl EngineResult {
    /// Whether migrations were applied.
    pub fn applied(&self) -> bool {
        self.run.is_some()
    }

    /// Get a summary of the result.
    pub fn summary(&self) -> String {
        let mut parts = vec![format!(
            "{} table(s), {} statement(s)",
            self.table_count, self.statement_count
        )];

        if self.dry_run {
            parts.push("dry run".to_string());
        } else if let Some(run) = &self.run {
            parts.push(format!("{} file(s) applied", run.applied));
        } else {
            parts.push(format!("{} file(s) written", self.artifacts.len()));
        }

        if !self.warnings.is_empty() {
            parts.push(format!("{} warning(s)", self.warnings.len()));
        }

        format!("{} in {}ms", parts.join(", "), self.duration_ms)
    }
}

/// Drives one schema diff through to applied migration files.
pub struct MigrationEngine<P: DiffProvider> {
    config: EngineConfig,
    provider: P,
    planner: Planner,
    files: MigrationFileManager,
    validation: ValidationSuite,
}

impl<P: DiffProvider> MigrationEngine<P> {
    /// Create an engine with the default validation suite.
    pub fn new(config: EngineConfig, provider: P) -> MigrateResult<Self> {
        let planner = Planner::new(config.plan.clone())?;
        let files = MigrationFileManager::new(&config.migrations_dir);
        Ok(Self {
            config,
            provider,
            planner,
            files,
            validation: ValidationSuite::default(),
        })
    }

    /// Replace the validation suite.
    pub fn with_validation(mut self, suite: ValidationSuite) -> Self {
        self.validation = suite;
        self
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The file manager for the migrations directory.
    pub fn files(&self) -> &MigrationFileManager {
        &self.files
    }

    /// Fetch the diff and plan it.
    ///
    /// Returns [`MigrationError::NoChanges`] when the diff is empty.
    pub async fn plan(&self) -> MigrateResult<ExecutionPlan> {
        let diff = self.provider.diff().await?;
        if diff.trim().is_empty() {
            return Err(MigrationError::NoChanges);
        }

        let plan = self.planner.plan_checked(&diff)?;
        if plan.is_empty() {
            return Err(MigrationError::NoChanges);
        }
        Ok(plan)
    }

    /// Write one file per group.
    pub async fn generate(&self, plan: &ExecutionPlan) -> MigrateResult<Vec<MigrationArtifact>> {
        self.files.write_plan(plan, &WriteOptions::new()).await
    }

    /// Run the validation suite over generated files.
    pub async fn validate(
        &self,
        artifacts: &[MigrationArtifact],
    ) -> MigrateResult<ValidationReport> {
        let paths: Vec<&PathBuf> = artifacts.iter().map(|a| &a.path).collect();
        self.validation.run(&paths).await
    }

    /// Apply files with `runner`.
    pub async fn apply<R: MigrationRunner + ?Sized>(
        &self,
        artifacts: &[MigrationArtifact],
        runner: &R,
    ) -> MigrateResult<RunOutcome> {
        runner.run(artifacts).await
    }

    /// Remove generated files after a failed step.
    pub async fn discard(&self, artifacts: &[MigrationArtifact]) -> usize {
        let removed = self.files.delete_artifacts(artifacts).await;
        warn!(removed, "Generated migration files discarded");
        removed
    }

    /// Plan, write, validate and apply.
    ///
    /// This is the non-interactive entry point for library callers. The
    /// `ddlsort migrate` command runs the same steps one at a time through
    /// [`plan`](Self::plan), [`generate`](Self::generate),
    /// [`validate`](Self::validate) and [`discard`](Self::discard) so it can
    /// report progress and ask for confirmation in between.
    ///
    /// Generated files are removed again if validation or the runner fails.
    pub async fn migrate<R: MigrationRunner + ?Sized>(
        &self,
        runner: &R,
    ) -> MigrateResult<EngineResult> {
        let start = Instant::now();
        let plan = self.plan().await?;

        let mut result = EngineResult {
            table_count: plan.groups().len(),
            statement_count: plan.statement_count(),
            artifacts: Vec::new(),
            validation: None,
            run: None,
            warnings: cycle_warnings(&plan),
            dry_run: self.config.dry_run,
            duration_ms: 0,
        };

        if self.config.dry_run {
            info!(summary = %plan.summary(), "Dry run, nothing written");
            result.duration_ms = elapsed_ms(start);
            return Ok(result);
        }

        let artifacts = self.generate(&plan).await?;

        if !self.config.skip_validation {
            let report = match self.validate(&artifacts).await {
                Ok(report) => report,
                Err(e) => {
                    self.discard(&artifacts).await;
                    return Err(e);
                }
            };
            if let Some(failure) = report.failures().next() {
                let err =
                    MigrationError::validation(failure.file_name(), failure.outcome.to_string());
                self.discard(&artifacts).await;
                return Err(err);
            }
            result.validation = Some(report);
        }

        match self.apply(&artifacts, runner).await {
            Ok(outcome) => result.run = Some(outcome),
            Err(e) => {
                self.discard(&artifacts).await;
                return Err(e);
            }
        }

        result.artifacts = artifacts;
        result.duration_ms = elapsed_ms(start);
        info!(summary = %result.summary(), "Migration complete");
        Ok(result)
    }
}

/// Warnings to surface for a plan.
pub fn cycle_warnings(plan: &ExecutionPlan) -> Vec<String> {
    if plan.has_cycles() {
        vec![format!(
            "Circular dependencies between tables: {}",
            plan.cyclic_remainder().join(", ")
        )]
    } else {
        Vec::new()
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
