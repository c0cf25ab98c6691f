//! Ordering tables by foreign-key dependency.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use serde::Serialize;
use tracing::{debug, warn};

use crate::references::ReferenceExtractor;
use crate::statement::Statement;

/// Table → tables it references, restricted to tables present in one run.
///
/// Never contains a self-loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DependencyGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Build the graph from every statement of every group.
    ///
    /// References to tables that are not among `groups` are ignored.
    pub fn build<'a, I>(groups: I, extractor: &ReferenceExtractor) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [Statement])>,
    {
        let groups: Vec<(&str, &[Statement])> = groups.into_iter().collect();
        let mut edges: BTreeMap<String, BTreeSet<String>> = groups
            .iter()
            .map(|(table, _)| (table.to_string(), BTreeSet::new()))
            .collect();

        for (table, statements) in &groups {
            for statement in statements.iter() {
                for referenced in extractor.extract(statement) {
                    if referenced != *table && edges.contains_key(&referenced) {
                        if let Some(deps) = edges.get_mut(*table) {
                            deps.insert(referenced);
                        }
                    }
                }
            }
        }

        Self { edges }
    }

    /// Tables that `table` depends on.
    pub fn dependencies(&self, table: &str) -> Option<&BTreeSet<String>> {
        self.edges.get(table)
    }

    /// Whether `table` depends on `dependency`.
    pub fn depends_on(&self, table: &str, dependency: &str) -> bool {
        self.edges
            .get(table)
            .is_some_and(|deps| deps.contains(dependency))
    }

    /// All known tables, sorted.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(String::as_str)
    }

    /// All `(table, dependency)` edges.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges
            .iter()
            .flat_map(|(table, deps)| deps.iter().map(move |dep| (table.as_str(), dep.as_str())))
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether the graph has no tables.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Topologically order the tables.
    ///
    /// Among tables whose dependencies are all placed, the lexicographically
    /// smallest goes next. Tables that can never be freed are appended in
    /// lexicographic order and reported as the cyclic remainder.
    pub fn order(&self) -> TableOrder {
        let mut remaining: BTreeMap<&str, usize> = self
            .edges
            .iter()
            .map(|(table, deps)| (table.as_str(), deps.len()))
            .collect();

        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (table, dependency) in self.edges() {
            dependents.entry(dependency).or_default().push(table);
        }

        let mut ready: BinaryHeap<Reverse<&str>> = remaining
            .iter()
            .filter(|&(_, &count)| count == 0)
            .map(|(&table, _)| Reverse(table))
            .collect();

        let mut order = Vec::with_capacity(self.edges.len());
        while let Some(Reverse(table)) = ready.pop() {
            debug!(table, position = order.len(), "Table placed");
            order.push(table.to_string());

            for &dependent in dependents.get(table).into_iter().flatten() {
                if let Some(count) = remaining.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(Reverse(dependent));
                    }
                }
            }
        }

        let cyclic_remainder: Vec<String> = remaining
            .into_iter()
            .filter(|&(_, count)| count > 0)
            .map(|(table, _)| table.to_string())
            .collect();

        if !cyclic_remainder.is_empty() {
            warn!(
                tables = ?cyclic_remainder,
                "Circular dependencies detected, falling back to lexicographic order"
            );
            order.extend(cyclic_remainder.iter().cloned());
        }

        TableOrder {
            order,
            cyclic_remainder,
        }
    }
}

/// Result of ordering tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableOrder {
    /// Every table exactly once, dependencies first.
    pub order: Vec<String>,
    /// Tables that could not be ordered because of a cycle, sorted.
    pub cyclic_remainder: Vec<String>,
}

impl TableOrder {
    /// Whether every table was placed by dependency.
    pub fn is_acyclic(&self) -> bool {
        self.cyclic_remainder.is_empty()
    }
}

/// Order tables given their statements, using the default name rules.
pub fn order_tables<'a, I>(groups: I) -> TableOrder
where
    I: IntoIterator<Item = (&'a str, &'a [Statement])>,
{
    DependencyGraph::build(groups, &ReferenceExtractor::default()).order()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn groups(layout: &[(&str, &[&str])]) -> Vec<(String, Vec<Statement>)> {
        layout
            .iter()
            .map(|(table, sqls)| {
                (
                    table.to_string(),
                    sqls.iter().map(|sql| Statement::new(*sql)).collect(),
                )
            })
            .collect()
    }

    fn order(groups: &[(String, Vec<Statement>)]) -> TableOrder {
        order_tables(
            groups
                .iter()
                .map(|(table, statements)| (table.as_str(), statements.as_slice())),
        )
    }

    fn graph(groups: &[(String, Vec<Statement>)]) -> DependencyGraph {
        DependencyGraph::build(
            groups
                .iter()
                .map(|(table, statements)| (table.as_str(), statements.as_slice())),
            &ReferenceExtractor::default(),
        )
    }

    #[test]
    fn test_referenced_table_first() {
        let input = groups(&[
            (
                "foo",
                &["alter table foo add constraint fk foreign key (bar_id) references bar(id);"],
            ),
            ("bar", &["create table bar (id int);"]),
        ]);
        let result = order(&input);
        assert_eq!(result.order, vec!["bar", "foo"]);
        assert!(result.is_acyclic());
    }

    #[test]
    fn test_independent_tables_are_lexicographic() {
        let input = groups(&[
            ("zeta", &["create table zeta (id int);"]),
            ("alpha", &["create table alpha (id int);"]),
            ("mid", &["create table mid (id int);"]),
        ]);
        assert_eq!(order(&input).order, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_smallest_ready_table_chosen_each_step() {
        // a -> c, b has no deps, c has no deps
        let input = groups(&[
            ("a", &["create table a (c_id int references c(id));"]),
            ("b", &["create table b (id int);"]),
            ("c", &["create table c (id int);"]),
        ]);
        assert_eq!(order(&input).order, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_chain() {
        let input = groups(&[
            ("a", &["create table a (b_id int references b(id));"]),
            ("b", &["create table b (c_id int references c(id));"]),
            ("c", &["create table c (id int);"]),
        ]);
        assert_eq!(order(&input).order, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_self_reference_ignored() {
        let input = groups(&[(
            "employees",
            &["create table employees (manager_id int references employees(id));"],
        )]);
        let g = graph(&input);
        assert!(!g.depends_on("employees", "employees"));
        assert_eq!(order(&input).order, vec!["employees"]);
    }

    #[test]
    fn test_unknown_reference_ignored() {
        let input = groups(&[(
            "orders",
            &["create table orders (user_id int references users(id));"],
        )]);
        let g = graph(&input);
        assert_eq!(g.edges().count(), 0);
        assert_eq!(order(&input).order, vec!["orders"]);
    }

    #[test]
    fn test_cycle_reported_and_included_once() {
        let input = groups(&[
            ("b", &["alter table b add constraint b_a_fk foreign key (a_id) references a(id);"]),
            ("a", &["alter table a add constraint a_b_fk foreign key (b_id) references b(id);"]),
            ("c", &["create table c (id int);"]),
        ]);
        let result = order(&input);
        assert_eq!(result.order, vec!["c", "a", "b"]);
        assert_eq!(result.cyclic_remainder, vec!["a", "b"]);
        assert!(!result.is_acyclic());
    }

    #[test]
    fn test_dependents_of_cycle_land_in_remainder() {
        let input = groups(&[
            ("a", &["create table a (b_id int references b(id));"]),
            ("b", &["create table b (a_id int references a(id));"]),
            ("z", &["create table z (a_id int references a(id));"]),
        ]);
        let result = order(&input);
        assert_eq!(result.order, vec!["a", "b", "z"]);
        assert_eq!(result.cyclic_remainder, vec!["a", "b", "z"]);
    }

    #[test]
    fn test_graph_accessors() {
        let input = groups(&[
            ("a", &["create table a (b_id int references b(id), c_id int references c(id));"]),
            ("b", &["create table b (id int);"]),
            ("c", &["create table c (id int);"]),
        ]);
        let g = graph(&input);
        assert_eq!(g.len(), 3);
        assert!(!g.is_empty());
        assert_eq!(g.tables().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(g.edges().collect::<Vec<_>>(), vec![("a", "b"), ("a", "c")]);
        assert_eq!(
            g.dependencies("a").map(|deps| deps.len()),
            Some(2)
        );
        assert!(g.dependencies("missing").is_none());
    }

    #[test]
    fn test_empty_input() {
        let result = order(&[]);
        assert!(result.order.is_empty());
        assert!(result.is_acyclic());
    }
}
