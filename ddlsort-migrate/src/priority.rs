//! Ordering statements within one table's migration.
//!
//! Every statement falls into a [`PriorityBand`]; lower bands run first. The
//! bands are evaluated top to bottom as a decision table and the first
//! matching predicate wins. Statements that match nothing land in
//! [`PriorityBand::Unclassified`].
//!
//! ```text
//!   5- 7  drop constraint / index / trigger
//!     10  create sequence
//!     20  create table
//!  30-33  add column, column type, default, nullability
//!     35  create index
//!     40  non-FK constraint
//!     45  other ALTER TABLE
//!  50-51  sequence ownership / other ALTER SEQUENCE
//!     55  unclassified
//!     70  foreign keys
//!     80  triggers
//!     90  comments
//!    100  drop table
//! ```

use std::sync::LazyLock;

use regex_lite::Regex;
use serde::Serialize;

use crate::statement::Statement;

/// Keywords that make `ADD <word>` a constraint rather than a column.
const CONSTRAINT_KEYWORDS: [&str; 6] = [
    "CONSTRAINT",
    "PRIMARY",
    "UNIQUE",
    "CHECK",
    "FOREIGN",
    "EXCLUDE",
];

static ADD_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bADD\s+(\w+)").expect("add clause pattern is valid"));

static TYPE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bTYPE\b").expect("type pattern is valid"));

/// Structural-safety band of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityBand {
    /// `... DROP CONSTRAINT ...`
    DropConstraint = 5,
    /// `DROP INDEX ...`
    DropIndex = 6,
    /// `DROP TRIGGER ...`
    DropTrigger = 7,
    /// `CREATE SEQUENCE ...`
    CreateSequence = 10,
    /// `CREATE TABLE ...`
    CreateTable = 20,
    /// `ALTER TABLE ... ADD [COLUMN] ...`
    AddColumn = 30,
    /// `ALTER TABLE ... ALTER COLUMN ...` and type changes, ahead of the
    /// default and nullability bands.
    AlterColumn = 31,
    /// `ALTER TABLE ... SET|DROP DEFAULT`
    ColumnDefault = 32,
    /// `ALTER TABLE ... SET|DROP NOT NULL`
    ColumnNullability = 33,
    /// `CREATE [UNIQUE] INDEX ...`
    CreateIndex = 35,
    /// Primary key, unique, check and exclusion constraints.
    AddConstraint = 40,
    /// Any other `ALTER TABLE`, including `VALIDATE CONSTRAINT`.
    AlterTable = 45,
    /// `ALTER SEQUENCE ... OWNED BY ...`
    SequenceOwnership = 50,
    /// Any other `ALTER SEQUENCE`.
    AlterSequence = 51,
    /// Nothing matched.
    Unclassified = 55,
    /// `ADD CONSTRAINT ... FOREIGN KEY` / `REFERENCES`.
    ForeignKey = 70,
    /// `CREATE [OR REPLACE] TRIGGER ...`
    CreateTrigger = 80,
    /// `COMMENT ON ...`
    Comment = 90,
    /// `DROP TABLE ...`
    DropTable = 100,
}

impl PriorityBand {
    /// Numeric priority; lower runs earlier.
    pub const fn priority(self) -> u32 {
        self as u32
    }
}

/// Upper-cased, whitespace-collapsed statement text plus derived facts.
struct Shape {
    sql: String,
}

impl Shape {
    fn new(statement: &Statement) -> Self {
        Self {
            sql: statement.normalized().to_uppercase(),
        }
    }

    fn has(&self, needle: &str) -> bool {
        self.sql.contains(needle)
    }

    fn starts(&self, prefix: &str) -> bool {
        self.sql.starts_with(prefix)
    }

    fn alter_table(&self) -> bool {
        self.has("ALTER TABLE")
    }

    fn adds_constraint(&self) -> bool {
        self.add_targets().any(|word| CONSTRAINT_KEYWORDS.contains(&word))
    }

    fn adds_column(&self) -> bool {
        self.has("ADD COLUMN")
            || self
                .add_targets()
                .any(|word| !CONSTRAINT_KEYWORDS.contains(&word))
    }

    fn add_targets(&self) -> impl Iterator<Item = &str> {
        ADD_CLAUSE
            .captures_iter(&self.sql)
            .filter_map(|caps| caps.get(1).map(|word| word.as_str()))
    }

    fn foreign_key(&self) -> bool {
        self.has("FOREIGN KEY") || self.has("REFERENCES")
    }

    fn adds_foreign_key(&self) -> bool {
        self.adds_constraint() && self.foreign_key()
    }

    fn changes_type(&self) -> bool {
        !self.adds_constraint() && TYPE_WORD.is_match(&self.sql)
    }
}

type Predicate = fn(&Shape) -> bool;

/// The decision table, evaluated top to bottom.
static BANDS: &[(PriorityBand, Predicate)] = &[
    (PriorityBand::DropConstraint, |s| s.has("DROP CONSTRAINT")),
    (PriorityBand::DropIndex, |s| s.has("DROP INDEX")),
    (PriorityBand::DropTrigger, |s| s.has("DROP TRIGGER")),
    (PriorityBand::CreateSequence, |s| s.starts("CREATE SEQUENCE")),
    (PriorityBand::CreateTable, |s| s.starts("CREATE TABLE")),
    (PriorityBand::AddColumn, |s| s.alter_table() && s.adds_column()),
    (PriorityBand::AlterColumn, |s| {
        s.alter_table() && (s.has("ALTER COLUMN") || s.changes_type())
    }),
    (PriorityBand::ColumnDefault, |s| {
        s.alter_table() && (s.has("SET DEFAULT") || s.has("DROP DEFAULT"))
    }),
    (PriorityBand::ColumnNullability, |s| {
        s.alter_table() && (s.has("SET NOT NULL") || s.has("DROP NOT NULL"))
    }),
    (PriorityBand::CreateIndex, |s| {
        s.has("CREATE INDEX") || s.has("CREATE UNIQUE INDEX")
    }),
    (PriorityBand::AddConstraint, |s| {
        s.alter_table() && s.adds_constraint() && !s.foreign_key()
    }),
    (PriorityBand::AlterTable, |s| s.alter_table() && !s.adds_foreign_key()),
    (PriorityBand::SequenceOwnership, |s| {
        s.has("ALTER SEQUENCE") && s.has("OWNED BY")
    }),
    (PriorityBand::AlterSequence, |s| s.has("ALTER SEQUENCE")),
    (PriorityBand::ForeignKey, |s| s.adds_foreign_key()),
    (PriorityBand::CreateTrigger, |s| {
        s.has("CREATE TRIGGER") || s.has("CREATE OR REPLACE TRIGGER")
    }),
    (PriorityBand::Comment, |s| s.starts("COMMENT ON")),
    (PriorityBand::DropTable, |s| s.has("DROP TABLE")),
];

/// The band a statement falls into.
pub fn classify(statement: &Statement) -> PriorityBand {
    let shape = Shape::new(statement);
    BANDS
        .iter()
        .find(|(_, matches)| matches(&shape))
        .map(|(band, _)| *band)
        .unwrap_or(PriorityBand::Unclassified)
}

/// Numeric priority of a statement; lower runs earlier.
pub fn rank_priority(statement: &Statement) -> u32 {
    classify(statement).priority()
}

/// Stable-sort statements by priority; equal priorities keep their order.
pub fn rank_statements(statements: &mut [Statement]) {
    statements.sort_by_cached_key(rank_priority);
}
