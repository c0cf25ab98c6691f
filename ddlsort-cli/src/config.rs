//! CLI configuration handling.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use ddlsort_migrate::naming::{DEFAULT_HISTORY_TABLE, DEFAULT_SCHEMA};
use ddlsort_migrate::{
    CommandRunner, CyclePolicy, LintCommand, MigraConfig, NameRules, PlanConfig, UnsafeDeleteCheck,
    ValidationSuite,
};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};

/// Default config file name (lives in project root)
pub const CONFIG_FILE_NAME: &str = "ddlsort.toml";

/// Default migrations directory (relative to project root)
pub const MIGRATIONS_DIR: &str = "src/main/resources/db/migration";

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

/// ddlsort configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Databases being compared
    pub database: DatabaseConfig,

    /// Schema diff tool
    pub diff: DiffConfig,

    /// Generated migration files
    pub migrations: MigrationsConfig,

    /// Checks before applying
    pub validation: ValidationConfig,

    /// Command that applies the migrations
    pub runner: RunnerConfig,
}

impl Config {
    /// Load configuration from a file, expanding `${VAR}` references.
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&expand_env_vars(&content))?;
        Ok(config)
    }

    /// Load `ddlsort.toml` from `dir`, or defaults if there is none.
    pub fn load_or_default(dir: &Path) -> CliResult<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> CliResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Migrations directory resolved against `root`.
    pub fn migrations_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.migrations.directory)
    }

    /// Planner settings.
    pub fn plan_config(&self) -> CliResult<PlanConfig> {
        let names = NameRules::new(
            &self.migrations.default_schema,
            &self.migrations.history_table,
        )?;
        Ok(PlanConfig::new()
            .names(names)
            .cycle_policy(self.migrations.cycle_policy))
    }

    /// Schema diff settings. Both database URLs must be set.
    pub fn migra_config(&self) -> CliResult<MigraConfig> {
        let source = self
            .database
            .source_url
            .clone()
            .ok_or_else(|| {
                CliError::Config(
                    "database.source_url is not set (or pass --input / --stdin)".to_string(),
                )
            })?;
        let target = self
            .database
            .target_url
            .clone()
            .ok_or_else(|| {
                CliError::Config(
                    "database.target_url is not set (or pass --input / --stdin)".to_string(),
                )
            })?;

        let mut skip_patterns = self.diff.skip_patterns.clone();
        if !skip_patterns.contains(&self.migrations.history_table) {
            skip_patterns.push(self.migrations.history_table.clone());
        }

        Ok(MigraConfig::new(target, source)
            .program(&self.diff.command)
            .flags(&self.diff.flags)
            .skip_patterns(skip_patterns)
            .timeout(Duration::from_secs(self.diff.timeout_secs)))
    }

    /// Validators enabled by `[validation]`.
    pub fn validation_suite(&self) -> ValidationSuite {
        let mut suite = ValidationSuite::new();
        if self.validation.check_unsafe_delete {
            suite = suite.with(UnsafeDeleteCheck);
        }
        if let Some(lint) = self
            .validation
            .lint_command
            .as_deref()
            .and_then(LintCommand::parse)
        {
            suite = suite.with(lint);
        }
        suite
    }

    /// The configured runner, executed from `root`.
    pub fn command_runner(&self, root: &Path) -> CommandRunner {
        let mut runner = CommandRunner::new(&self.runner.command)
            .args(&self.runner.args)
            .working_dir(root);
        for (key, value) in &self.runner.env {
            runner = runner.env(key, value);
        }
        if let Some(secs) = self.runner.timeout_secs {
            runner = runner.timeout(Duration::from_secs(secs));
        }
        runner
    }
}

/// Database configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database holding the desired schema
    pub source_url: Option<String>,

    /// Database the migrations are applied to
    pub target_url: Option<String>,
}

/// Schema diff configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Diff executable
    pub command: String,

    /// Flags passed before the database URLs
    pub flags: Vec<String>,

    /// Seconds before the diff is abandoned
    pub timeout_secs: u64,

    /// Output lines containing any of these are dropped
    pub skip_patterns: Vec<String>,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            command: "migra".to_string(),
            flags: vec!["--unsafe".to_string()],
            timeout_secs: 300,
            skip_patterns: vec![
                "UserWarning:".to_string(),
                "pkg_resources".to_string(),
                "schemainspect".to_string(),
            ],
        }
    }
}

/// Migration file configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationsConfig {
    /// Directory for migration files
    pub directory: String,

    /// Schema treated as implicit in table names
    pub default_schema: String,

    /// Version-history table, never grouped
    pub history_table: String,

    /// What to do with foreign-key cycles
    pub cycle_policy: CyclePolicy,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            directory: MIGRATIONS_DIR.to_string(),
            default_schema: DEFAULT_SCHEMA.to_string(),
            history_table: DEFAULT_HISTORY_TABLE.to_string(),
            cycle_policy: CyclePolicy::default(),
        }
    }
}

/// Validation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Reject DELETE statements without WHERE
    pub check_unsafe_delete: bool,

    /// Linter command line; `{file}` is replaced by the file path
    pub lint_command: Option<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            check_unsafe_delete: true,
            lint_command: None,
        }
    }
}

/// Runner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Executable
    pub command: String,

    /// Arguments
    pub args: Vec<String>,

    /// Extra environment for the child process
    pub env: BTreeMap<String, String>,

    /// Seconds before the runner is killed
    pub timeout_secs: Option<u64>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            command: "mvn".to_string(),
            args: vec![
                "clean".to_string(),
                "compile".to_string(),
                "flyway:migrate".to_string(),
            ],
            env: BTreeMap::new(),
            timeout_secs: None,
        }
    }
}

/// Expand environment variables in the format `${VAR_NAME}`.
///
/// Unset variables are left as written.
pub fn expand_env_vars(content: &str) -> String {
    ENV_VAR
        .replace_all(content, |caps: &regex_lite::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.diff.command, "migra");
        assert_eq!(config.migrations.directory, MIGRATIONS_DIR);
        assert_eq!(config.migrations.cycle_policy, CyclePolicy::Warn);
        assert!(config.validation.check_unsafe_delete);
        assert_eq!(config.runner.command, "mvn");
    }

    #[test]
    fn test_parse_partial_config() {
        let config: Config = toml::from_str(
            r#"
            [database]
            source_url = "postgresql://db1"
            target_url = "postgresql://db2"

            [migrations]
            default_schema = "app"
            cycle_policy = "reject"

            [runner]
            command = "mvn"
            args = ["flyway:migrate", "-Pdb2-local"]
            env = { MAVEN_OPTS = "-Duser.timezone=UTC" }
            "#,
        )
        .unwrap();

        assert_eq!(config.migrations.default_schema, "app");
        assert_eq!(config.migrations.history_table, DEFAULT_HISTORY_TABLE);
        assert_eq!(config.migrations.cycle_policy, CyclePolicy::Reject);
        assert_eq!(config.diff.timeout_secs, 300);
        assert_eq!(config.runner.env["MAVEN_OPTS"], "-Duser.timezone=UTC");

        let migra = config.migra_config().unwrap();
        assert_eq!(migra.source_url, "postgresql://db1");
        assert_eq!(migra.target_url, "postgresql://db2");
        assert!(migra.skip_patterns.iter().any(|p| p == DEFAULT_HISTORY_TABLE));

        let runner = config.command_runner(Path::new("."));
        assert_eq!(runner.command_line(), "mvn flyway:migrate -Pdb2-local");
    }

    #[test]
    fn test_missing_urls() {
        let err = Config::default().migra_config().unwrap_err();
        assert!(err.to_string().contains("source_url"));
    }

    #[test]
    fn test_invalid_names_rejected() {
        let mut config = Config::default();
        config.migrations.default_schema = "bad schema".to_string();
        assert!(matches!(config.plan_config(), Err(CliError::Config(_))));
    }

    #[test]
    fn test_validation_suite_from_config() {
        let mut config = Config::default();
        assert_eq!(config.validation_suite().len(), 1);

        config.validation.lint_command = Some("sqlfluff lint {file} --config .sqlfluff".into());
        assert_eq!(config.validation_suite().len(), 2);

        config.validation.check_unsafe_delete = false;
        config.validation.lint_command = Some("   ".into());
        assert!(config.validation_suite().is_empty());
    }

    #[test]
    fn test_expand_env_vars() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::set_var("DDLSORT_TEST_SOURCE_URL", "postgresql://db1");
        }
        assert_eq!(
            expand_env_vars("source_url = \"${DDLSORT_TEST_SOURCE_URL}\""),
            "source_url = \"postgresql://db1\""
        );
        assert_eq!(
            expand_env_vars("${DDLSORT_TEST_UNSET_VARIABLE}"),
            "${DDLSORT_TEST_UNSET_VARIABLE}"
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut config = Config::default();
        config.database.source_url = Some("postgresql://db1".into());
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
        assert_eq!(Config::load_or_default(dir.path()).unwrap(), config);
        assert_eq!(
            Config::load_or_default(&dir.path().join("nowhere")).unwrap(),
            Config::default()
        );
    }
}
