//! End-to-end scenarios for the ordering engine.
//!
//! Each test feeds a small diff through the public API and checks the full
//! resulting plan.

use ddlsort::migrate::{
    CyclePolicy, MigrationFileManager, PlanConfig, Planner, WriteOptions, cycle_warnings,
};
use ddlsort::{
    MigrationError, Statement, attribute_table, build_execution_plan, extract_references,
    rank_priority, split_statements,
};
use pretty_assertions::assert_eq;

fn statements_of<'a>(plan: &'a ddlsort::ExecutionPlan, table: &str) -> Vec<&'a str> {
    plan.group(table)
        .map(|group| group.statements().iter().map(Statement::as_str).collect())
        .unwrap_or_default()
}

/// A foreign key pulls the referenced table first and runs after the index
#[test]
fn test_foreign_key_orders_tables_and_statements() {
    let plan = build_execution_plan(
        "CREATE TABLE foo (id int);\n\
         CREATE INDEX foo_idx ON foo(id);\n\
         ALTER TABLE foo ADD CONSTRAINT fk FOREIGN KEY (b) REFERENCES bar(id);\n\
         CREATE TABLE bar (id int);",
    );

    assert_eq!(plan.table_names().collect::<Vec<_>>(), vec!["bar", "foo"]);
    assert_eq!(
        statements_of(&plan, "foo"),
        vec![
            "CREATE TABLE foo (id int);",
            "CREATE INDEX foo_idx ON foo(id);",
            "ALTER TABLE foo ADD CONSTRAINT fk FOREIGN KEY (b) REFERENCES bar(id);",
        ]
    );
    let priorities: Vec<u32> = plan
        .group("foo")
        .unwrap()
        .statements()
        .iter()
        .map(rank_priority)
        .collect();
    assert_eq!(priorities, vec![20, 35, 70]);
    assert_eq!(plan.dependencies_of("foo"), vec!["bar"]);
    assert!(plan.other().is_empty());
}

/// A semicolon inside a `$$` body does not end the statement
#[test]
fn test_function_body_is_one_statement() {
    let sql = "CREATE FUNCTION f() RETURNS void AS $$\n\
               BEGIN\n  PERFORM 1;\nEND;\n$$ LANGUAGE plpgsql;\n\
               CREATE TABLE audit (id int);";

    let statements: Vec<Statement> = split_statements(sql).collect();
    assert_eq!(statements.len(), 2);
    assert!(statements[0].as_str().contains("PERFORM 1;"));
    assert!(statements[0].as_str().ends_with("LANGUAGE plpgsql;"));

    let plan = build_execution_plan(sql);
    assert_eq!(plan.table_names().collect::<Vec<_>>(), vec!["audit"]);
    assert_eq!(plan.other().len(), 1);
}

/// Mutually referencing tables are both placed, in name order, and reported
#[test]
fn test_cycle_is_reported_not_dropped() {
    let sql = "CREATE TABLE b (id int, a_id int REFERENCES a(id));\n\
               CREATE TABLE a (id int, b_id int REFERENCES b(id));";

    let plan = build_execution_plan(sql);
    assert_eq!(plan.table_names().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(plan.cyclic_remainder(), ["a".to_string(), "b".to_string()]);
    assert_eq!(plan.statement_count(), 2);

    let warnings = cycle_warnings(&plan);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("a, b"));

    let strict = Planner::new(PlanConfig::new().cycle_policy(CyclePolicy::Reject)).unwrap();
    match strict.plan_checked(sql) {
        Err(MigrationError::CyclicDependency { tables }) => assert_eq!(tables, vec!["a", "b"]),
        other => panic!("expected a cycle error, got {:?}", other),
    }
}

/// The acyclic part of the graph is still ordered ahead of a cycle
#[test]
fn test_acyclic_tables_precede_cycle() {
    let plan = build_execution_plan(
        "CREATE TABLE z_root (id int);\n\
         CREATE TABLE a (id int, b_id int REFERENCES b(id), r int REFERENCES z_root(id));\n\
         CREATE TABLE b (id int, a_id int REFERENCES a(id));",
    );

    assert_eq!(plan.table_names().collect::<Vec<_>>(), vec!["z_root", "a", "b"]);
    assert_eq!(plan.cyclic_remainder(), ["a".to_string(), "b".to_string()]);
}

/// Statements touching the history table are never attributed
#[test]
fn test_history_table_is_ignored() {
    let statement = Statement::new("ALTER TABLE flyway_schema_history ADD COLUMN x int;");
    assert_eq!(attribute_table(&statement), None);

    let plan = build_execution_plan(
        "ALTER TABLE flyway_schema_history ADD COLUMN x int;\n\
         CREATE TABLE users (id int);",
    );
    assert_eq!(plan.table_names().collect::<Vec<_>>(), vec!["users"]);
    assert_eq!(plan.other().len(), 1);
    assert!(plan.dependencies().dependencies("flyway_schema_history").is_none());
}

/// `DROP INDEX` is attributed through the `idx_<table>_...` convention only
#[test]
fn test_drop_index_naming_convention() {
    assert_eq!(
        attribute_table(&Statement::new("DROP INDEX idx_widgets_name;")),
        Some("widgets".to_string())
    );
    assert_eq!(
        attribute_table(&Statement::new("DROP INDEX some_other_name;")),
        None
    );
}

/// References are normalised the same way as attributed table names
#[test]
fn test_reference_names_match_table_names() {
    let statement = Statement::new(
        "alter table \"public\".\"orders\" add constraint \"fk\" FOREIGN KEY (user_id) \
         REFERENCES \"public\".\"Users\"(id);",
    );
    let references: Vec<String> = extract_references(&statement).into_iter().collect();

    assert_eq!(references, vec!["users"]);
    assert_eq!(attribute_table(&statement), Some("orders".to_string()));
}

/// A plan becomes one versioned file per table plus the other bucket
#[tokio::test]
async fn test_plan_written_to_files() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let files = MigrationFileManager::new(temp_dir.path());
    let plan = build_execution_plan(
        "ALTER TABLE posts ADD CONSTRAINT fk FOREIGN KEY (author_id) REFERENCES authors(id);\n\
         CREATE TABLE posts (id int, author_id int);\n\
         CREATE TABLE authors (id int);\n\
         CREATE EXTENSION IF NOT EXISTS pgcrypto;",
    );

    let generated_at = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    let options = WriteOptions::new().start_version(3).generated_at(generated_at);
    let artifacts = files.write_plan(&plan, &options).await.unwrap();

    let names: Vec<String> = artifacts.iter().map(|artifact| artifact.file_name()).collect();
    assert_eq!(
        names,
        vec![
            "V3__20240301_0930_authors.sql",
            "V4__20240301_0930_posts.sql",
            "V5__20240301_0930_other_changes.sql",
        ]
    );

    let posts = tokio::fs::read_to_string(&artifacts[1].path).await.unwrap();
    assert!(posts.contains("-- Depends on: authors"));
    assert!(posts.contains("-- Statements: 2"));
    let create = posts.find("CREATE TABLE posts").unwrap();
    let foreign_key = posts.find("FOREIGN KEY").unwrap();
    assert!(create < foreign_key);

    let listed = files.list_artifacts().await.unwrap();
    assert_eq!(listed, artifacts);
    assert_eq!(files.next_version().await.unwrap(), 6);
}
