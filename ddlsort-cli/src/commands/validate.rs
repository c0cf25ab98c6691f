//! `ddlsort validate` command - Check migration files before applying them.

use std::path::PathBuf;

use ddlsort_migrate::{MigrationFileManager, ValidationOutcome, ValidationReport};

use crate::cli::ValidateArgs;
use crate::commands::Context;
use crate::error::{CliError, CliResult};
use crate::output::{self, style_error, style_pending, style_success, success};

/// Run the validate command
pub async fn run(args: ValidateArgs, ctx: &Context) -> CliResult<()> {
    output::header("Validate Migrations");

    let mut paths: Vec<PathBuf> = args.files.clone();
    if let Some(dir) = &args.dir {
        let artifacts = MigrationFileManager::new(dir).list_artifacts().await?;
        paths.extend(artifacts.into_iter().map(|artifact| artifact.path));
    }

    if paths.is_empty() {
        return Err(CliError::Input(
            "no files to validate (pass FILES or --dir)".to_string(),
        ));
    }

    let suite = ctx.config.validation_suite();
    let report = suite.run(&paths).await?;
    print_report(&report);

    let failures = report.failures().count();
    if failures > 0 {
        return Err(CliError::Validation(format!(
            "{} check(s) failed",
            failures
        )));
    }

    output::newline();
    let skipped = report.skipped().count();
    if skipped > 0 {
        output::info(&format!("{} check(s) skipped", skipped));
    }
    success(&format!("{} file(s) passed", paths.len()));
    Ok(())
}

/// Print one line per check.
pub fn print_report(report: &ValidationReport) {
    for entry in &report.entries {
        let status = match &entry.outcome {
            ValidationOutcome::Passed => style_success("passed"),
            ValidationOutcome::Failed(_) => style_error("failed"),
            ValidationOutcome::Skipped(reason) => style_pending(&format!("skipped ({})", reason)),
        };
        output::list_item(&format!("{} [{}] {}", entry.file_name(), entry.check, status));
        if let ValidationOutcome::Failed(reason) = &entry.outcome {
            for line in reason.lines() {
                output::sub_item(line);
            }
        }
    }
}
