//! CLI error types and result alias.

use ddlsort_migrate::MigrationError;
use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// IO error
    #[error("IO error: {0}")]
    #[diagnostic(code(ddlsort::io))]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    #[diagnostic(code(ddlsort::config), help("Run `ddlsort init` to create a ddlsort.toml"))]
    Config(String),

    /// Input error
    #[error("Input error: {0}")]
    #[diagnostic(code(ddlsort::input))]
    Input(String),

    /// Schema diff error
    #[error("Diff error: {0}")]
    #[diagnostic(code(ddlsort::diff))]
    Diff(String),

    /// Planning error
    #[error("Plan error: {0}")]
    #[diagnostic(code(ddlsort::plan))]
    Plan(String),

    /// Validation error
    #[error("Validation error: {0}")]
    #[diagnostic(code(ddlsort::validation))]
    Validation(String),

    /// Migration error
    #[error("Migration error: {0}")]
    #[diagnostic(code(ddlsort::migration))]
    Migration(String),

    /// Command error
    #[error("Command error: {0}")]
    #[diagnostic(code(ddlsort::command))]
    Command(String),
}

impl From<MigrationError> for CliError {
    fn from(err: MigrationError) -> Self {
        match err {
            MigrationError::Io(e) => CliError::Io(e),
            MigrationError::InvalidConfig(_) => CliError::Config(err.to_string()),
            MigrationError::CyclicDependency { .. } => CliError::Plan(err.to_string()),
            MigrationError::Provider(_) | MigrationError::ProviderTimeout { .. } => {
                CliError::Diff(err.to_string())
            }
            MigrationError::Validation { .. } => CliError::Validation(err.to_string()),
            MigrationError::Runner(_) | MigrationError::NoChanges => {
                CliError::Migration(err.to_string())
            }
        }
    }
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        CliError::Config(format!("Failed to parse TOML: {}", err))
    }
}

impl From<toml::ser::Error> for CliError {
    fn from(err: toml::ser::Error) -> Self {
        CliError::Config(format!("Failed to serialize TOML: {}", err))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Command(format!("Failed to serialize JSON: {}", err))
    }
}
