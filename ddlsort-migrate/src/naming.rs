//! Identifier normalisation shared by attribution and reference extraction.

use serde::{Deserialize, Serialize};

use crate::error::{MigrateResult, MigrationError};

/// Schema whose prefix is stripped from table names.
pub const DEFAULT_SCHEMA: &str = "public";

/// Version-history table maintained by the migration runner.
pub const DEFAULT_HISTORY_TABLE: &str = "flyway_schema_history";

/// Regex fragment capturing an optionally quoted, optionally qualified name.
pub(crate) const QUALIFIED_NAME: &str = r#"((?:"?\w+"?\.)*"?\w+"?)"#;

/// How table names are recognised and normalised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRules {
    /// Schema treated as implicit; `public.users` becomes `users`.
    pub default_schema: String,
    /// Bookkeeping table that is never grouped.
    pub history_table: String,
}

impl Default for NameRules {
    fn default() -> Self {
        Self {
            default_schema: DEFAULT_SCHEMA.to_string(),
            history_table: DEFAULT_HISTORY_TABLE.to_string(),
        }
    }
}

impl NameRules {
    /// Create validated name rules.
    pub fn new(
        default_schema: impl Into<String>,
        history_table: impl Into<String>,
    ) -> MigrateResult<Self> {
        let rules = Self {
            default_schema: default_schema.into(),
            history_table: history_table.into(),
        };
        rules.validate()?;
        Ok(rules)
    }

    /// Check that both names are plain identifiers.
    pub fn validate(&self) -> MigrateResult<()> {
        for (what, name) in [
            ("default schema", &self.default_schema),
            ("history table", &self.history_table),
        ] {
            if !is_plain_identifier(name) {
                return Err(MigrationError::invalid_config(format!(
                    "{} '{}' is not a plain identifier",
                    what, name
                )));
            }
        }
        Ok(())
    }

    /// Whether the statement text mentions the bookkeeping table.
    pub fn mentions_history_table(&self, sql: &str) -> bool {
        sql.to_lowercase()
            .contains(&self.history_table.to_lowercase())
    }

    /// Strip quotes and the default-schema prefix, then lower-case.
    pub fn normalize_identifier(&self, raw: &str) -> String {
        let unquoted = raw.replace('"', "");
        let lowered = unquoted.to_lowercase();
        let prefix = format!("{}.", self.default_schema.to_lowercase());
        match lowered.strip_prefix(&prefix) {
            Some(rest) => rest.to_string(),
            None => lowered,
        }
    }
}

/// Split a normalised name into its schema qualifier (if any) and last segment.
pub(crate) fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.rsplit_once('.') {
        Some((schema, last)) => (Some(schema), last),
        None => (None, name),
    }
}

/// Re-attach a schema qualifier to a derived name.
pub(crate) fn qualify(schema: Option<&str>, name: &str) -> String {
    match schema {
        Some(schema) => format!("{}.{}", schema, name),
        None => name.to_string(),
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
