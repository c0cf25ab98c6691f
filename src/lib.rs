//! # ddlsort
//!
//! Orders the output of a schema-diff tool into dependency-safe migrations.
//!
//! ddlsort provides:
//! - A splitter that cuts raw DDL into statements without breaking `$$` bodies
//! - Attribution of every statement to the table it acts on
//! - A structural-safety ranking of statements within each table
//! - A foreign-key topological order across tables, with cycle reporting
//! - Versioned file generation, validation and an external runner
//!
//! ## Quick Start
//!
//! ```rust
//! use ddlsort::build_execution_plan;
//!
//! let plan = build_execution_plan(
//!     "create index idx_posts_author on posts (author_id);\n\
//!      create table posts (id int, author_id int references authors(id));\n\
//!      create table authors (id int);",
//! );
//!
//! assert_eq!(plan.table_names().collect::<Vec<_>>(), vec!["authors", "posts"]);
//! assert_eq!(plan.group("posts").unwrap().len(), 2);
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// The migration ordering engine.
pub mod migrate {
    pub use ddlsort_migrate::*;
}

pub use ddlsort_migrate::{
    ExecutionPlan, MigrateResult, MigrationError, Statement, TableGroup, attribute_table,
    build_execution_plan, extract_references, order_tables, rank_priority, split_statements,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use ddlsort_migrate::{
        CommandRunner, CyclePolicy, DiffProvider, EngineConfig, ExecutionPlan, MigraConfig,
        MigraProvider, MigrateResult, MigrationEngine, MigrationError, MigrationRunner, NameRules,
        PlanConfig, Planner, PriorityBand, Statement, TableGroup, TextDiffProvider,
        ValidationSuite, build_execution_plan,
    };
}
