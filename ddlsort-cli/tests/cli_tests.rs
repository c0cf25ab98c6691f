//! Integration tests for the ddlsort CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const DIFF: &str = "\
alter table \"public\".\"orders\" add constraint \"orders_user_id_fkey\" FOREIGN KEY (user_id) REFERENCES \"public\".\"users\"(id);

create table \"public\".\"orders\" (
    \"id\" integer not null,
    \"user_id\" integer
);

create table \"public\".\"users\" (
    \"id\" integer not null
);

create extension if not exists \"pgcrypto\";
";

/// Get the ddlsort binary
#[allow(deprecated)]
fn ddlsort_cmd() -> Command {
    Command::cargo_bin("ddlsort").unwrap()
}

fn write_diff(dir: &Path) -> String {
    let path = dir.join("diff.sql");
    fs::write(&path, DIFF).unwrap();
    path.to_str().unwrap().to_string()
}

fn migration_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[test]
fn test_help_command() {
    ddlsort_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ddlsort"))
        .stdout(predicate::str::contains("Usage: ddlsort [OPTIONS] <COMMAND>"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("migrate"));
}

#[test]
fn test_version_command() {
    ddlsort_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("Version"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_migrate_help() {
    ddlsort_cmd()
        .args(["migrate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--yes"))
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--skip-validation"));
}

#[test]
fn test_plan_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_diff(temp_dir.path());

    ddlsort_cmd()
        .current_dir(temp_dir.path())
        .args(["plan", "--input", &input])
        .assert()
        .success()
        .stdout(predicate::str::contains("users → orders"))
        .stdout(predicate::str::contains("orders (2 stmt) → [users]"))
        .stdout(predicate::str::contains("Other statements (1, run last)"));
}

#[test]
fn test_plan_json_from_stdin() {
    let temp_dir = TempDir::new().unwrap();

    let output = ddlsort_cmd()
        .current_dir(temp_dir.path())
        .args(["plan", "--stdin", "--format", "json"])
        .write_stdin(DIFF)
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["order"], serde_json::json!(["users", "orders"]));
    assert_eq!(value["groups"][1]["statements"][1]["priority"], 70);
    assert_eq!(value["statement_count"], 4);
}

#[test]
fn test_plan_empty_input() {
    let temp_dir = TempDir::new().unwrap();

    ddlsort_cmd()
        .current_dir(temp_dir.path())
        .args(["plan", "--stdin"])
        .write_stdin("-- nothing to do\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("No changes to apply"));
}

#[test]
fn test_plan_without_databases_fails() {
    let temp_dir = TempDir::new().unwrap();

    ddlsort_cmd()
        .current_dir(temp_dir.path())
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("source_url"));
}

#[test]
fn test_plan_rejects_cycles_when_configured() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("ddlsort.toml"),
        "[migrations]\ncycle_policy = \"reject\"\n",
    )
    .unwrap();

    ddlsort_cmd()
        .current_dir(temp_dir.path())
        .args(["plan", "--stdin"])
        .write_stdin(
            "create table a (b_id int references b(id));\ncreate table b (a_id int references a(id));\n",
        )
        .assert()
        .failure()
        .stderr(predicate::str::contains("Circular dependencies between tables: a, b"));
}

#[test]
fn test_generate_writes_versioned_files() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_diff(temp_dir.path());
    let out = temp_dir.path().join("migrations");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("V7__baseline.sql"), "").unwrap();

    ddlsort_cmd()
        .current_dir(temp_dir.path())
        .args(["generate", "--input", &input, "--dir", out.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("V8: users (1 stmt)"))
        .stdout(predicate::str::contains("V9: orders (2 stmt)"))
        .stdout(predicate::str::contains("V10: other_changes (1 stmt)"));

    let files = migration_files(&out);
    assert_eq!(files.len(), 4);
    assert!(files.iter().any(|f| f.starts_with("V9__") && f.ends_with("_orders.sql")));

    let orders = files.iter().find(|f| f.ends_with("_orders.sql")).unwrap();
    let content = fs::read_to_string(out.join(orders)).unwrap();
    assert!(content.contains("-- Depends on: users"));
    assert!(content.contains("-- End of orders migration"));
}

#[test]
fn test_validate_rejects_unsafe_delete() {
    let temp_dir = TempDir::new().unwrap();
    let bad = temp_dir.path().join("V1__cleanup.sql");
    fs::write(&bad, "DELETE FROM users;\n").unwrap();

    ddlsort_cmd()
        .current_dir(temp_dir.path())
        .args(["validate", bad.to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::contains("DELETE without WHERE clause"))
        .stderr(predicate::str::contains("1 check(s) failed"));
}

#[test]
fn test_validate_directory() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("migrations");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("V1__users.sql"), "create table users (id int);\n").unwrap();
    fs::write(dir.join("V2__cleanup.sql"), "delete from users where id = 1;\n").unwrap();

    ddlsort_cmd()
        .current_dir(temp_dir.path())
        .args(["validate", "--dir", dir.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 file(s) passed"));
}

#[test]
fn test_validate_without_files() {
    let temp_dir = TempDir::new().unwrap();

    ddlsort_cmd()
        .current_dir(temp_dir.path())
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no files to validate"));
}

#[test]
fn test_init_creates_config() {
    let temp_dir = TempDir::new().unwrap();

    ddlsort_cmd()
        .current_dir(temp_dir.path())
        .args(["init", "--source-url", "postgresql://db1", "--target-url", "postgresql://db2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created"));

    let content = fs::read_to_string(temp_dir.path().join("ddlsort.toml")).unwrap();
    assert!(content.contains("source_url = \"postgresql://db1\""));
    assert!(content.contains("[migrations]"));

    // A second init needs --force
    ddlsort_cmd()
        .current_dir(temp_dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    ddlsort_cmd()
        .current_dir(temp_dir.path())
        .args(["init", "--force"])
        .assert()
        .success();
}

#[cfg(unix)]
fn write_pipeline_config(dir: &Path, runner_script: &str) {
    let diff = write_diff(dir);
    let config = format!(
        r#"
[database]
source_url = "postgresql://localhost/db1"
target_url = "postgresql://localhost/db2"

[diff]
command = "sh"
flags = ["-c", "cat '{diff}'"]

[migrations]
directory = "migrations"

[runner]
command = "sh"
args = ["-c", "{runner_script}"]
"#
    );
    fs::write(dir.join("ddlsort.toml"), config).unwrap();
}

#[cfg(unix)]
#[test]
fn test_migrate_dry_run() {
    let temp_dir = TempDir::new().unwrap();
    write_pipeline_config(temp_dir.path(), "exit 0");

    ddlsort_cmd()
        .current_dir(temp_dir.path())
        .args(["migrate", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("users → orders"))
        .stdout(predicate::str::contains("Dry run complete"));

    assert!(migration_files(&temp_dir.path().join("migrations")).is_empty());
}

#[cfg(unix)]
#[test]
fn test_migrate_applies() {
    let temp_dir = TempDir::new().unwrap();
    write_pipeline_config(temp_dir.path(), "ls migrations");

    ddlsort_cmd()
        .current_dir(temp_dir.path())
        .args(["migrate", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 migration(s) applied"));

    assert_eq!(migration_files(&temp_dir.path().join("migrations")).len(), 3);
}

#[cfg(unix)]
#[test]
fn test_migrate_runner_failure_removes_files() {
    let temp_dir = TempDir::new().unwrap();
    write_pipeline_config(temp_dir.path(), "echo flyway failed; exit 1");

    ddlsort_cmd()
        .current_dir(temp_dir.path())
        .args(["migrate", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("flyway failed"));

    assert!(migration_files(&temp_dir.path().join("migrations")).is_empty());
}

#[test]
fn test_invalid_command() {
    ddlsort_cmd()
        .arg("invalid_command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_global_options() {
    ddlsort_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
