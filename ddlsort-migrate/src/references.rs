//! Foreign-key reference extraction.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex_lite::Regex;

use crate::error::MigrateResult;
use crate::naming::{NameRules, QUALIFIED_NAME};
use crate::statement::Statement;

static REFERENCES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\bREFERENCES\s+{}", QUALIFIED_NAME))
        .expect("references pattern is valid")
});

static DEFAULT_EXTRACTOR: LazyLock<ReferenceExtractor> =
    LazyLock::new(ReferenceExtractor::default);

/// Finds the tables a statement points at through `REFERENCES <table>`.
#[derive(Debug, Clone, Default)]
pub struct ReferenceExtractor {
    names: NameRules,
}

impl ReferenceExtractor {
    /// Create an extractor with validated name rules.
    pub fn new(names: NameRules) -> MigrateResult<Self> {
        names.validate()?;
        Ok(Self { names })
    }

    /// Referenced table names, normalised and de-duplicated.
    pub fn extract(&self, statement: &Statement) -> BTreeSet<String> {
        REFERENCES
            .captures_iter(statement.as_str())
            .filter_map(|caps| caps.get(1))
            .map(|name| self.names.normalize_identifier(name.as_str()))
            .collect()
    }
}

/// Extract referenced tables using the default name rules.
pub fn extract_references(statement: &Statement) -> BTreeSet<String> {
    DEFAULT_EXTRACTOR.extract(statement)
}
