//! `ddlsort plan` command - Show the execution plan for a schema diff.

use ddlsort_migrate::{ExecutionPlan, Planner, Statement, classify};
use serde_json::json;

use crate::cli::{OutputFormat, PlanArgs};
use crate::commands::Context;
use crate::error::CliResult;
use crate::output::{self, success, warn};

/// Characters of each statement shown in the text listing
const PREVIEW_CHARS: usize = 60;

/// Run the plan command
pub async fn run(args: PlanArgs, ctx: &Context) -> CliResult<()> {
    let planner = Planner::new(ctx.config.plan_config()?)?;
    let diff = ctx.read_diff(&args.input).await?;
    let plan = planner.plan_checked(&diff)?;

    match args.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&plan_json(&plan))?);
        }
        OutputFormat::Text => {
            output::header("Execution Plan");
            if plan.is_empty() {
                success("No changes to apply");
            } else {
                print_plan(&plan);
            }
        }
    }

    Ok(())
}

/// Print table order, grouped statements, the other bucket and cycles.
pub fn print_plan(plan: &ExecutionPlan) {
    let order: Vec<&str> = plan.table_names().collect();
    if !order.is_empty() {
        output::kv("Execution order", &order.join(" → "));
        output::newline();
    }

    for (index, group) in plan.groups().iter().enumerate() {
        let depends = plan.dependencies_of(group.name());
        let suffix = if depends.is_empty() {
            String::new()
        } else {
            format!(" → [{}]", depends.join(", "))
        };
        output::numbered_item(
            index + 1,
            &format!("{} ({} stmt){}", group.name(), group.len(), suffix),
        );
        for statement in group.statements() {
            output::sub_item(&statement_line(statement));
        }
    }

    if !plan.other().is_empty() {
        output::newline();
        output::section(&format!("Other statements ({}, run last)", plan.other().len()));
        for statement in plan.other() {
            output::sub_item(&statement.preview(PREVIEW_CHARS));
        }
    }

    if plan.has_cycles() {
        output::newline();
        warn(&format!(
            "Circular dependencies, placed in name order: {}",
            plan.cyclic_remainder().join(", ")
        ));
    }

    output::newline();
    output::dim(&plan.summary());
}

fn statement_line(statement: &Statement) -> String {
    format!(
        "[{:>3}] {}",
        classify(statement).priority(),
        statement.preview(PREVIEW_CHARS)
    )
}

/// Machine-readable plan, with each statement's band.
pub fn plan_json(plan: &ExecutionPlan) -> serde_json::Value {
    let groups: Vec<serde_json::Value> = plan
        .groups()
        .iter()
        .map(|group| {
            let statements: Vec<serde_json::Value> = group
                .statements()
                .iter()
                .map(|statement| {
                    let band = classify(statement);
                    json!({
                        "priority": band.priority(),
                        "band": band,
                        "sql": statement,
                    })
                })
                .collect();
            json!({
                "table": group.name(),
                "depends_on": group.references(),
                "statements": statements,
            })
        })
        .collect();

    json!({
        "order": plan.table_names().collect::<Vec<_>>(),
        "groups": groups,
        "other": plan.other(),
        "cyclic_remainder": plan.cyclic_remainder(),
        "statement_count": plan.statement_count(),
    })
}
