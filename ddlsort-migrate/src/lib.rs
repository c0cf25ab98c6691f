//! # ddlsort-migrate
//!
//! Migration ordering engine for schema diffs.
//!
//! A schema-diff tool emits DDL in whatever order it likes. Running that
//! output as-is fails as soon as a foreign key is created before the table it
//! points at, or an index before its table. This crate turns the raw diff into
//! an [`ExecutionPlan`]: one group of statements per table, each group in a
//! structurally safe order, and the groups themselves in foreign-key
//! dependency order.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────┐
//! │ Diff Provider│────▶│ Statement      │────▶│ Table        │
//! │ (migra)      │     │ Splitter       │     │ Attributor   │
//! └──────────────┘     └────────────────┘     └──────────────┘
//!                                                    │
//!                                                    ▼
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────┐
//! │ Dependency   │◀────│ Reference      │◀────│ Priority     │
//! │ Orderer      │     │ Extractor      │     │ Ranker       │
//! └──────────────┘     └────────────────┘     └──────────────┘
//!        │
//!        ▼
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────┐
//! │ Execution    │────▶│ File Writer    │────▶│ Validator /  │
//! │ Plan         │     │ (V<n>__*.sql)  │     │ Runner       │
//! └──────────────┘     └────────────────┘     └──────────────┘
//! ```
//!
//! The planning half ([`split_statements`], [`attribute_table`],
//! [`extract_references`], [`rank_priority`], [`order_tables`],
//! [`build_execution_plan`]) is pure and never fails. The collaborators in
//! [`provider`], [`file`], [`validate`] and [`runner`] do the I/O.
//!
//! ## Example
//!
//! ```rust
//! use ddlsort_migrate::build_execution_plan;
//!
//! let diff = "\
//! alter table foo add constraint foo_bar_fk foreign key (bar_id) references bar(id);
//! create index idx_foo_id on foo (id);
//! create table foo (id int, bar_id int);
//! create table bar (id int);
//! ";
//!
//! let plan = build_execution_plan(diff);
//! assert_eq!(plan.table_names().collect::<Vec<_>>(), vec!["bar", "foo"]);
//!
//! let foo = plan.group("foo").unwrap();
//! assert!(foo.statements()[0].as_str().starts_with("create table"));
//! assert!(foo.statements()[2].as_str().contains("foreign key"));
//! ```
//!
//! ## Full pipeline
//!
//! ```rust,ignore
//! use ddlsort_migrate::{
//!     CommandRunner, EngineConfig, MigraProvider, MigraConfig, MigrationEngine,
//! };
//!
//! async fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = MigraProvider::new(MigraConfig::new(
//!         "postgresql://localhost/target",
//!         "postgresql://localhost/source",
//!     ));
//!     let engine = MigrationEngine::new(
//!         EngineConfig::new().migrations_dir("src/main/resources/db/migration"),
//!         provider,
//!     )?;
//!
//!     let runner = CommandRunner::new("mvn").args(["flyway:migrate"]);
//!     let result = engine.migrate(&runner).await?;
//!     println!("{}", result.summary());
//!     Ok(())
//! }
//! ```

pub mod attribute;
pub mod engine;
pub mod error;
pub mod file;
pub mod graph;
pub mod naming;
pub mod plan;
pub mod priority;
pub mod provider;
pub mod references;
pub mod runner;
pub mod statement;
pub mod validate;

// Re-exports
pub use attribute::{RuleKind, TableAttributor, attribute_table};
pub use engine::{EngineConfig, EngineResult, MigrationEngine, cycle_warnings};
pub use error::{MigrateResult, MigrationError};
pub use file::{MigrationArtifact, MigrationFileManager, WriteOptions};
pub use graph::{DependencyGraph, TableOrder, order_tables};
pub use naming::NameRules;
pub use plan::{
    CyclePolicy, ExecutionPlan, OTHER_GROUP, PlanConfig, Planner, TableGroup, build_execution_plan,
};
pub use priority::{PriorityBand, classify, rank_priority, rank_statements};
pub use provider::{DiffProvider, MigraConfig, MigraProvider, TextDiffProvider};
pub use references::{ReferenceExtractor, extract_references};
pub use runner::{CommandRunner, MigrationRunner, RunOutcome};
pub use statement::{Statement, StatementSplitter, split_statements};
pub use validate::{
    ArtifactValidator, LintCommand, UnsafeDeleteCheck, ValidationEntry, ValidationOutcome,
    ValidationReport, ValidationSuite,
};
