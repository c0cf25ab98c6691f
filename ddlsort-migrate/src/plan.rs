//! The grouping pipeline: split, attribute, rank and order.
//!
//! ```rust
//! use ddlsort_migrate::build_execution_plan;
//!
//! let plan = build_execution_plan(
//!     "alter table orders add constraint orders_user_fk foreign key (user_id) references users(id);\n\
//!      create table orders (id int, user_id int);\n\
//!      create table users (id int);\n\
//!      create extension if not exists pgcrypto;",
//! );
//!
//! assert_eq!(plan.table_names().collect::<Vec<_>>(), vec!["users", "orders"]);
//! assert_eq!(plan.other().len(), 1);
//! ```

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::attribute::TableAttributor;
use crate::error::{MigrateResult, MigrationError};
use crate::graph::DependencyGraph;
use crate::naming::NameRules;
use crate::priority::rank_statements;
use crate::references::ReferenceExtractor;
use crate::statement::{Statement, split_statements};

/// Name used for the bucket of unattributed statements.
pub const OTHER_GROUP: &str = "other_changes";

/// What to do when foreign keys form a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePolicy {
    /// Place cyclic tables last in lexicographic order and report them.
    #[default]
    Warn,
    /// Refuse to produce a plan.
    Reject,
}

impl fmt::Display for CyclePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CyclePolicy::Warn => write!(f, "warn"),
            CyclePolicy::Reject => write!(f, "reject"),
        }
    }
}

/// Configuration for the planner.
#[derive(Debug, Clone, Default)]
pub struct PlanConfig {
    /// Name normalisation rules.
    pub names: NameRules,
    /// Cycle handling for [`Planner::plan_checked`].
    pub cycle_policy: CyclePolicy,
}

impl PlanConfig {
    /// Create a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name rules.
    pub fn names(mut self, names: NameRules) -> Self {
        self.names = names;
        self
    }

    /// Set the cycle policy.
    pub fn cycle_policy(mut self, policy: CyclePolicy) -> Self {
        self.cycle_policy = policy;
        self
    }
}

/// Statements attributed to one table, in execution-safe order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableGroup {
    name: String,
    statements: Vec<Statement>,
    references: BTreeSet<String>,
}

impl TableGroup {
    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Statements, ranked.
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Every table this group's statements reference, excluding itself.
    ///
    /// Includes tables that are not part of the plan.
    pub fn references(&self) -> &BTreeSet<String> {
        &self.references
    }

    /// Number of statements.
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Whether the group has no statements.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Ordered table groups followed by the unattributed bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    groups: Vec<TableGroup>,
    other: Vec<Statement>,
    cyclic_remainder: Vec<String>,
    dependencies: DependencyGraph,
}

impl ExecutionPlan {
    /// Table groups in dependency order.
    pub fn groups(&self) -> &[TableGroup] {
        &self.groups
    }

    /// Unattributed statements, executed after every table group.
    pub fn other(&self) -> &[Statement] {
        &self.other
    }

    /// Tables that could not be ordered because of a cycle.
    pub fn cyclic_remainder(&self) -> &[String] {
        &self.cyclic_remainder
    }

    /// Whether any tables were placed by the lexicographic fallback.
    pub fn has_cycles(&self) -> bool {
        !self.cyclic_remainder.is_empty()
    }

    /// The dependency graph the order was derived from.
    pub fn dependencies(&self) -> &DependencyGraph {
        &self.dependencies
    }

    /// Table names in execution order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(TableGroup::name)
    }

    /// Look up a group by table name.
    pub fn group(&self, table: &str) -> Option<&TableGroup> {
        self.groups.iter().find(|group| group.name == table)
    }

    /// Sorted references of a table's statements, excluding the table itself.
    pub fn dependencies_of(&self, table: &str) -> Vec<&str> {
        self.group(table)
            .map(|group| group.references.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Every statement in execution order.
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.groups
            .iter()
            .flat_map(|group| group.statements.iter())
            .chain(self.other.iter())
    }

    /// Total number of statements.
    pub fn statement_count(&self) -> usize {
        self.groups.iter().map(TableGroup::len).sum::<usize>() + self.other.len()
    }

    /// Whether the plan contains no statements.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.other.is_empty()
    }

    /// One-line description of the plan.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "No statements".to_string();
        }

        let mut parts = vec![format!(
            "{} table(s), {} statement(s)",
            self.groups.len(),
            self.statement_count()
        )];
        if !self.other.is_empty() {
            parts.push(format!("{} other", self.other.len()));
        }
        if self.has_cycles() {
            parts.push(format!("{} in cycles", self.cyclic_remainder.len()));
        }
        parts.join(", ")
    }
}

/// Turns raw diff text into an [`ExecutionPlan`].
#[derive(Debug, Clone, Default)]
pub struct Planner {
    attributor: TableAttributor,
    extractor: ReferenceExtractor,
    config: PlanConfig,
}

impl Planner {
    /// Create a planner, validating the configured names.
    pub fn new(config: PlanConfig) -> MigrateResult<Self> {
        Ok(Self {
            attributor: TableAttributor::new(config.names.clone())?,
            extractor: ReferenceExtractor::new(config.names.clone())?,
            config,
        })
    }

    /// The planner configuration.
    pub fn config(&self) -> &PlanConfig {
        &self.config
    }

    /// Build a plan. Never fails; cycles are reported in the plan.
    pub fn plan(&self, sql: &str) -> ExecutionPlan {
        let mut tables: IndexMap<String, Vec<Statement>> = IndexMap::new();
        let mut other = Vec::new();

        for statement in split_statements(sql) {
            match self.attributor.explain(&statement) {
                Some((rule, table)) => {
                    debug!(table = %table, rule = ?rule, "Statement attributed");
                    tables.entry(table).or_default().push(statement);
                }
                None => {
                    debug!(statement = %statement.preview(60), "Statement unattributed");
                    other.push(statement);
                }
            }
        }

        for statements in tables.values_mut() {
            rank_statements(statements);
        }

        let dependencies = DependencyGraph::build(
            tables
                .iter()
                .map(|(table, statements)| (table.as_str(), statements.as_slice())),
            &self.extractor,
        );
        let order = dependencies.order();

        let groups = order
            .order
            .iter()
            .filter_map(|table| {
                let (name, statements) = tables.swap_remove_entry(table)?;
                let references = statements
                    .iter()
                    .flat_map(|statement| self.extractor.extract(statement))
                    .filter(|referenced| *referenced != name)
                    .collect();
                Some(TableGroup {
                    name,
                    statements,
                    references,
                })
            })
            .collect();

        let plan = ExecutionPlan {
            groups,
            other,
            cyclic_remainder: order.cyclic_remainder,
            dependencies,
        };
        info!(summary = %plan.summary(), "Execution plan built");
        plan
    }

    /// Build a plan, applying the configured [`CyclePolicy`].
    pub fn plan_checked(&self, sql: &str) -> MigrateResult<ExecutionPlan> {
        let plan = self.plan(sql);
        if plan.has_cycles() && self.config.cycle_policy == CyclePolicy::Reject {
            return Err(MigrationError::CyclicDependency {
                tables: plan.cyclic_remainder.clone(),
            });
        }
        Ok(plan)
    }
}

/// Build a plan with the default configuration.
pub fn build_execution_plan(sql: &str) -> ExecutionPlan {
    Planner::default().plan(sql)
}
