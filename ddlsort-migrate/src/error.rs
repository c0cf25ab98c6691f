//! Error types for the migration ordering engine.

use thiserror::Error;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur around the ordering engine.
///
/// The pure planning operations never fail; these errors come from
/// configuration and from the collaborators that talk to the outside world.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Tables whose foreign keys form a cycle, rejected by policy.
    #[error("Circular dependencies between tables: {}", tables.join(", "))]
    CyclicDependency {
        /// Tables left in the cyclic remainder, sorted.
        tables: Vec<String>,
    },

    /// The schema diff could not be produced.
    #[error("Diff provider error: {0}")]
    Provider(String),

    /// The schema diff did not finish in time.
    #[error("Diff provider timed out after {seconds}s")]
    ProviderTimeout {
        /// Configured timeout.
        seconds: u64,
    },

    /// A generated artifact was rejected.
    #[error("Validation failed for '{artifact}': {reason}")]
    Validation {
        /// File name of the artifact.
        artifact: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The migration runner failed.
    #[error("Migration runner failed: {0}")]
    Runner(String),

    /// No changes to migrate.
    #[error("No schema changes detected")]
    NoChanges,
}

impl MigrationError {
    /// Create an invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a diff provider error.
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a validation error.
    pub fn validation(artifact: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            artifact: artifact.into(),
            reason: reason.into(),
        }
    }

    /// Create a runner error.
    pub fn runner(msg: impl Into<String>) -> Self {
        Self::Runner(msg.into())
    }

    /// Check if this is a recoverable error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NoChanges | Self::ProviderTimeout { .. })
    }
}
