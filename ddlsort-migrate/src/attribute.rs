//! Attributing statements to the table they affect.
//!
//! Attribution is a decision table: an ordered list of rules, each pairing a
//! pattern with a way of turning the captured name into a table. The first
//! rule that yields a table wins. A rule whose pattern matches but whose name
//! cannot be resolved (for example a sequence that does not follow the
//! `<table>_<column>_seq` convention) falls through to the next rule.
//!
//! | Order | Rule | Example |
//! |---|---|---|
//! | 1 | [`RuleKind::SequenceOwnedBy`] | `ALTER SEQUENCE s OWNED BY public.users.id` |
//! | 2 | [`RuleKind::SequenceName`] | `CREATE SEQUENCE users_id_seq` |
//! | 3 | [`RuleKind::CreateTable`], [`RuleKind::AlterTable`], [`RuleKind::DropTable`] | `ALTER TABLE ONLY users ...` |
//! | 4 | [`RuleKind::CreateIndex`] | `CREATE UNIQUE INDEX ... ON users` |
//! | 5 | [`RuleKind::DropIndex`] | `DROP INDEX idx_users_email` |
//! | 6 | [`RuleKind::CommentOnTable`], [`RuleKind::CommentOnColumn`] | `COMMENT ON COLUMN users.email` |
//! | 7 | [`RuleKind::CreateTrigger`], [`RuleKind::DropTrigger`] | `DROP TRIGGER t ON users` |
//!
//! Statements mentioning the migration runner's history table are never
//! attributed.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::error::MigrateResult;
use crate::naming::{NameRules, QUALIFIED_NAME, qualify, split_qualified};
use crate::statement::Statement;

/// One attribution rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// `ALTER SEQUENCE ... OWNED BY table.column`.
    SequenceOwnedBy,
    /// `CREATE|DROP|ALTER SEQUENCE <table>_<column>_seq`.
    SequenceName,
    /// `CREATE TABLE [IF NOT EXISTS] name`.
    CreateTable,
    /// `ALTER TABLE [IF EXISTS] [ONLY] name`.
    AlterTable,
    /// `DROP TABLE [IF EXISTS] name`.
    DropTable,
    /// `CREATE [UNIQUE] INDEX ... ON [ONLY] table`.
    CreateIndex,
    /// `DROP INDEX idx_<table>_...`.
    DropIndex,
    /// `COMMENT ON TABLE name`.
    CommentOnTable,
    /// `COMMENT ON COLUMN table.column`.
    CommentOnColumn,
    /// `CREATE [OR REPLACE] TRIGGER name ... ON table`.
    CreateTrigger,
    /// `DROP TRIGGER [IF EXISTS] name ON table`.
    DropTrigger,
}

impl RuleKind {
    /// All rules in evaluation order.
    pub const ALL: [RuleKind; 11] = [
        RuleKind::SequenceOwnedBy,
        RuleKind::SequenceName,
        RuleKind::CreateTable,
        RuleKind::AlterTable,
        RuleKind::DropTable,
        RuleKind::CreateIndex,
        RuleKind::DropIndex,
        RuleKind::CommentOnTable,
        RuleKind::CommentOnColumn,
        RuleKind::CreateTrigger,
        RuleKind::DropTrigger,
    ];

    fn pattern_prefix(self) -> &'static str {
        match self {
            RuleKind::SequenceOwnedBy => r"(?i)\bALTER\s+SEQUENCE\b.*?\bOWNED\s+BY\s+",
            RuleKind::SequenceName => {
                r"(?i)\b(?:CREATE|DROP|ALTER)\s+SEQUENCE\s+(?:IF\s+(?:NOT\s+)?EXISTS\s+)?"
            }
            RuleKind::CreateTable => r"(?i)\bCREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?",
            RuleKind::AlterTable => r"(?i)\bALTER\s+TABLE\s+(?:IF\s+EXISTS\s+)?(?:ONLY\s+)?",
            RuleKind::DropTable => r"(?i)\bDROP\s+TABLE\s+(?:IF\s+EXISTS\s+)?",
            RuleKind::CreateIndex => {
                r"(?i)\bCREATE\s+(?:UNIQUE\s+)?INDEX\s+(?:CONCURRENTLY\s+)?(?:IF\s+NOT\s+EXISTS\s+)?(?:\S+\s+)?ON\s+(?:ONLY\s+)?"
            }
            RuleKind::DropIndex => r"(?i)\bDROP\s+INDEX\s+(?:CONCURRENTLY\s+)?(?:IF\s+EXISTS\s+)?",
            RuleKind::CommentOnTable => r"(?i)\bCOMMENT\s+ON\s+TABLE\s+",
            RuleKind::CommentOnColumn => r"(?i)\bCOMMENT\s+ON\s+COLUMN\s+",
            RuleKind::CreateTrigger => {
                r"(?i)\bCREATE\s+(?:OR\s+REPLACE\s+)?TRIGGER\s+\S+\s+.*?\bON\s+"
            }
            RuleKind::DropTrigger => r"(?i)\bDROP\s+TRIGGER\s+(?:IF\s+EXISTS\s+)?\S+\s+ON\s+",
        }
    }

    /// Turn the captured name into a table name, if this rule can.
    fn resolve(self, names: &NameRules, captured: &str) -> Option<String> {
        let name = names.normalize_identifier(captured);
        match self {
            RuleKind::SequenceOwnedBy => {
                let (table, _column) = name.rsplit_once('.')?;
                let is_sentinel = table == "none" || table == names.default_schema.to_lowercase();
                (!is_sentinel).then(|| table.to_string())
            }
            RuleKind::SequenceName => {
                let (schema, sequence) = split_qualified(&name);
                table_from_sequence_name(sequence).map(|table| qualify(schema, table))
            }
            RuleKind::DropIndex => {
                let (schema, index) = split_qualified(&name);
                table_from_index_name(index).map(|table| qualify(schema, table))
            }
            RuleKind::CommentOnColumn => {
                name.rsplit_once('.').map(|(table, _column)| table.to_string())
            }
            RuleKind::CreateTable
            | RuleKind::AlterTable
            | RuleKind::DropTable
            | RuleKind::CreateIndex
            | RuleKind::CommentOnTable
            | RuleKind::CreateTrigger
            | RuleKind::DropTrigger => Some(name),
        }
    }
}

struct AttributionRule {
    kind: RuleKind,
    pattern: Regex,
}

static RULES: LazyLock<Vec<AttributionRule>> = LazyLock::new(|| {
    RuleKind::ALL
        .iter()
        .map(|&kind| AttributionRule {
            kind,
            pattern: Regex::new(&format!("{}{}", kind.pattern_prefix(), QUALIFIED_NAME))
                .expect("attribution patterns are valid"),
        })
        .collect()
});

static DEFAULT_ATTRIBUTOR: LazyLock<TableAttributor> =
    LazyLock::new(|| TableAttributor::with_rules(NameRules::default()));

/// Table name derived from `<table>_<column>_seq`.
///
/// The table is everything before the final two underscore-delimited segments.
pub fn table_from_sequence_name(sequence: &str) -> Option<&str> {
    let stem = sequence.strip_suffix("_seq")?;
    let (table, column) = stem.rsplit_once('_')?;
    (!table.is_empty() && !column.is_empty()).then_some(table)
}

/// Table name derived from `idx_<table>_<...>`.
///
/// The table is the shortest non-empty run after `idx_` that is followed by
/// another underscore.
pub fn table_from_index_name(index: &str) -> Option<&str> {
    let rest = index.strip_prefix("idx_")?;
    let (end, _) = rest.char_indices().skip(1).find(|&(_, c)| c == '_')?;
    Some(&rest[..end])
}

/// Attributes statements to tables.
#[derive(Debug, Clone)]
pub struct TableAttributor {
    names: NameRules,
}

impl Default for TableAttributor {
    fn default() -> Self {
        Self::with_rules(NameRules::default())
    }
}

impl TableAttributor {
    /// Create an attributor with validated name rules.
    pub fn new(names: NameRules) -> MigrateResult<Self> {
        names.validate()?;
        Ok(Self::with_rules(names))
    }

    fn with_rules(names: NameRules) -> Self {
        Self { names }
    }

    /// The name rules in use.
    pub fn names(&self) -> &NameRules {
        &self.names
    }

    /// The table a statement belongs to, or `None`.
    pub fn attribute(&self, statement: &Statement) -> Option<String> {
        self.explain(statement).map(|(_, table)| table)
    }

    /// The table a statement belongs to, along with the rule that decided it.
    pub fn explain(&self, statement: &Statement) -> Option<(RuleKind, String)> {
        let sql = statement.normalized();
        if self.names.mentions_history_table(&sql) {
            return None;
        }

        RULES.iter().find_map(|rule| {
            let captured = rule.pattern.captures(&sql)?.get(1)?.as_str();
            rule.kind
                .resolve(&self.names, captured)
                .map(|table| (rule.kind, table))
        })
    }
}

/// Attribute a statement using the default name rules.
pub fn attribute_table(statement: &Statement) -> Option<String> {
    DEFAULT_ATTRIBUTOR.attribute(statement)
}
