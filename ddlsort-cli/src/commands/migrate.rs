//! `ddlsort migrate` command - Diff, generate, validate and apply.
//!
//! Drives the engine step by step for progress output and the confirmation
//! prompt; `MigrationEngine::migrate` runs the same sequence unattended.

use ddlsort_migrate::{
    EngineConfig, MigraProvider, MigrationArtifact, MigrationEngine, MigrationError,
};

use crate::cli::MigrateArgs;
use crate::commands::Context;
use crate::commands::plan::print_plan;
use crate::commands::validate::print_report;
use crate::error::{CliError, CliResult};
use crate::output::{self, success, warn};

/// Run the migrate command
pub async fn run(args: MigrateArgs, ctx: &Context) -> CliResult<()> {
    output::header("Migrate");

    let config = &ctx.config;
    let migra = config.migra_config()?;
    let migrations_dir = config.migrations_dir(&ctx.root);

    output::kv("Source", &database_name(&migra.source_url));
    output::kv("Target", &database_name(&migra.target_url));
    output::kv("Migrations", &migrations_dir.display().to_string());
    output::newline();

    let engine_config = EngineConfig::new()
        .migrations_dir(&migrations_dir)
        .plan(config.plan_config()?)
        .dry_run(args.dry_run)
        .skip_validation(args.skip_validation);
    let engine = MigrationEngine::new(engine_config, MigraProvider::new(migra))?
        .with_validation(config.validation_suite());

    let total_steps = 4;

    // 1. Diff and plan
    output::step(1, total_steps, "Comparing schemas...");
    let plan = match engine.plan().await {
        Ok(plan) => plan,
        Err(MigrationError::NoChanges) => {
            output::newline();
            success("No changes to apply");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    output::newline();
    print_plan(&plan);
    output::newline();

    if args.dry_run {
        success("Dry run complete, nothing written");
        return Ok(());
    }

    // 2. Generate
    output::step(2, total_steps, "Generating migration files...");
    let artifacts = engine.generate(&plan).await?;
    show_artifacts(&artifacts).await;

    // 3. Validate
    if args.skip_validation {
        output::step(3, total_steps, "Skipping validation (--skip-validation)...");
    } else {
        output::step(3, total_steps, "Validating...");
        let report = match engine.validate(&artifacts).await {
            Ok(report) => report,
            Err(e) => return Err(discard(&engine, &artifacts, e.into()).await),
        };
        print_report(&report);
        if !report.all_passed() {
            let err = CliError::Validation(format!(
                "{} check(s) failed",
                report.failures().count()
            ));
            return Err(discard(&engine, &artifacts, err).await);
        }
    }
    output::newline();

    if !args.yes && !output::confirm(&format!("Apply {} migration file(s)?", artifacts.len())) {
        engine.discard(&artifacts).await;
        warn("Migration cancelled, generated files removed");
        return Ok(());
    }

    // 4. Apply
    let runner = config.command_runner(&ctx.root);
    output::step(4, total_steps, &format!("Running {}...", runner.command_line()));
    match engine.apply(&artifacts, &runner).await {
        Ok(outcome) => {
            output::newline();
            success(&format!(
                "{} migration(s) applied in {}ms",
                outcome.applied, outcome.duration_ms
            ));
            Ok(())
        }
        Err(e) => Err(discard(&engine, &artifacts, e.into()).await),
    }
}

/// Remove generated files and hand back the error that caused it.
async fn discard(
    engine: &MigrationEngine<MigraProvider>,
    artifacts: &[MigrationArtifact],
    err: CliError,
) -> CliError {
    let removed = engine.discard(artifacts).await;
    warn(&format!("{} generated file(s) removed", removed));
    err
}

async fn show_artifacts(artifacts: &[MigrationArtifact]) {
    for artifact in artifacts {
        output::newline();
        output::section(&artifact.file_name());
        match tokio::fs::read_to_string(&artifact.path).await {
            Ok(content) => output::sql_preview(&content),
            Err(e) => warn(&format!("cannot read {}: {}", artifact.file_name(), e)),
        }
    }
    output::newline();
}

/// Last path segment of a connection URL, without credentials.
fn database_name(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}
