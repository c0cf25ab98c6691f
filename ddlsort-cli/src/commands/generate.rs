//! `ddlsort generate` command - Write versioned migration files.

use ddlsort_migrate::{MigrationFileManager, Planner, WriteOptions};

use crate::cli::GenerateArgs;
use crate::commands::Context;
use crate::error::CliResult;
use crate::output::{self, success};

/// Run the generate command
pub async fn run(args: GenerateArgs, ctx: &Context) -> CliResult<()> {
    output::header("Generate Migrations");

    let dir = args
        .dir
        .clone()
        .unwrap_or_else(|| ctx.config.migrations_dir(&ctx.root));
    output::kv("Directory", &dir.display().to_string());
    output::newline();

    let planner = Planner::new(ctx.config.plan_config()?)?;
    let diff = ctx.read_diff(&args.input).await?;
    let plan = planner.plan_checked(&diff)?;

    if plan.is_empty() {
        success("No changes to apply");
        return Ok(());
    }

    let mut options = WriteOptions::new();
    if let Some(version) = args.start_version {
        options = options.start_version(version);
    }

    let files = MigrationFileManager::new(&dir);
    let artifacts = files.write_plan(&plan, &options).await?;

    for artifact in &artifacts {
        output::list_item(&format!(
            "V{}: {} ({} stmt)",
            artifact.version, artifact.name, artifact.statement_count
        ));
    }

    if plan.has_cycles() {
        output::newline();
        output::warn(&format!(
            "Circular dependencies, placed in name order: {}",
            plan.cyclic_remainder().join(", ")
        ));
    }

    output::newline();
    success(&format!("{} migration file(s) written", artifacts.len()));
    Ok(())
}
