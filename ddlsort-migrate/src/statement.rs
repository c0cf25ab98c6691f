//! Splitting raw schema-diff output into whole statements.
//!
//! Splitting is boundary detection over lines, not SQL parsing. A line whose
//! trimmed text ends with `;` closes the pending statement, unless an odd
//! number of `$$` markers has been seen since the statement started, in which
//! case the line is inside a dollar-quoted function body and the statement
//! keeps growing.
//!
//! ```rust
//! use ddlsort_migrate::split_statements;
//!
//! let sql = "CREATE TABLE users (id int);\n\nCREATE INDEX idx_users_id ON users (id);";
//! let statements: Vec<_> = split_statements(sql).collect();
//! assert_eq!(statements.len(), 2);
//! ```

use std::fmt;
use std::iter::FusedIterator;
use std::str::Split;

use serde::Serialize;

/// Marker that opens and closes a dollar-quoted body.
pub const DOLLAR_MARKER: &str = "$$";

/// One complete SQL command, including its trailing terminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Statement(String);

impl Statement {
    /// Wrap already-split statement text.
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    /// Build a statement from accumulated lines, dropping empty or bare `;` results.
    fn from_lines(lines: &[&str]) -> Option<Self> {
        let joined = lines.join("\n");
        let text = joined.trim();
        if text.is_empty() || text == ";" {
            None
        } else {
            Some(Self(text.to_string()))
        }
    }

    /// The statement text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the statement, returning its text.
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Whitespace-collapsed text, used by the pattern rules.
    pub(crate) fn normalized(&self) -> String {
        self.0.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// First line of the statement, shortened for display.
    pub fn preview(&self, max_chars: usize) -> String {
        let flat = self.normalized();
        if flat.chars().count() <= max_chars {
            flat
        } else {
            let cut: String = flat.chars().take(max_chars).collect();
            format!("{}...", cut)
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Statement {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lazy, single-pass iterator over the statements of a SQL text.
#[derive(Debug)]
pub struct StatementSplitter<'a> {
    lines: Split<'a, char>,
    pending: Vec<&'a str>,
    markers: usize,
}

impl<'a> StatementSplitter<'a> {
    /// Create a splitter over `sql`.
    pub fn new(sql: &'a str) -> Self {
        Self {
            lines: sql.split('\n'),
            pending: Vec::new(),
            markers: 0,
        }
    }

    fn inside_dollar_body(&self) -> bool {
        self.markers % 2 != 0
    }

    fn take_pending(&mut self) -> Option<Statement> {
        let lines = std::mem::take(&mut self.pending);
        self.markers = 0;
        Statement::from_lines(&lines)
    }
}

impl Iterator for StatementSplitter<'_> {
    type Item = Statement;

    fn next(&mut self) -> Option<Statement> {
        loop {
            let Some(line) = self.lines.next() else {
                // Unterminated trailing text still counts as a statement.
                if self.pending.is_empty() {
                    return None;
                }
                return self.take_pending();
            };

            let trimmed = line.trim();
            if self.pending.is_empty() && (trimmed.is_empty() || trimmed.starts_with("--")) {
                continue;
            }

            self.markers += line.matches(DOLLAR_MARKER).count();
            self.pending.push(line);

            if trimmed.ends_with(';') && !self.inside_dollar_body() {
                if let Some(statement) = self.take_pending() {
                    return Some(statement);
                }
            }
        }
    }
}

impl FusedIterator for StatementSplitter<'_> {}

/// Split raw multi-statement SQL into statements.
///
/// Never fails; text without any terminator comes back as a single statement.
pub fn split_statements(sql: &str) -> StatementSplitter<'_> {
    StatementSplitter::new(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn split(sql: &str) -> Vec<String> {
        split_statements(sql).map(Statement::into_inner).collect()
    }

    #[test]
    fn test_split_simple_statements() {
        let sql = "create table a (id int);\ncreate table b (id int);\n";
        assert_eq!(split(sql), vec!["create table a (id int);", "create table b (id int);"]);
    }

    #[test]
    fn test_split_multiline_statement() {
        let sql = "create table a (\n    id int,\n    name text\n);\n";
        assert_eq!(split(sql), vec!["create table a (\n    id int,\n    name text\n);"]);
    }

    #[test]
    fn test_leading_blank_lines_and_comments_skipped() {
        let sql = "\n\n-- generated by migra\n   \ncreate table a (id int);";
        assert_eq!(split(sql), vec!["create table a (id int);"]);
    }

    #[test]
    fn test_comment_inside_statement_preserved() {
        let sql = "create table a (\n-- primary key\n    id int\n);";
        assert_eq!(split(sql), vec!["create table a (\n-- primary key\n    id int\n);"]);
    }

    #[test]
    fn test_dollar_quoted_body_is_one_statement() {
        let sql = "\
create table a (id int);

CREATE OR REPLACE FUNCTION public.add_one(i int)
 RETURNS int AS $$
BEGIN
    RETURN i + 1;
END;
$$ LANGUAGE plpgsql;

create table b (id int);
";
        let statements = split(sql);
        assert_eq!(statements.len(), 3);

        let add_one = &statements[1];
        assert!(add_one.starts_with("CREATE OR REPLACE FUNCTION public.add_one"));
        assert!(add_one.contains("RETURN i + 1;"));
        assert!(add_one.ends_with("$$ LANGUAGE plpgsql;"));
    }

    #[test]
    fn test_tagged_dollar_quotes_are_not_markers() {
        let sql = "create function f() returns int as $body$\nbegin\n  return 1;\nend;\n$body$;";
        assert_eq!(
            split(sql),
            vec![
                "create function f() returns int as $body$\nbegin\n  return 1;",
                "end;",
                "$body$;",
            ]
        );
    }

    #[test]
    fn test_markers_on_one_line_keep_parity_even() {
        let sql = "select $$a;b$$;\nselect 2;";
        assert_eq!(split(sql), vec!["select $$a;b$$;", "select 2;"]);
    }

    #[test]
    fn test_bare_terminator_is_discarded() {
        assert_eq!(split(";\n  ;  \ncreate table a (id int);"), vec!["create table a (id int);"]);
    }

    #[test]
    fn test_unterminated_tail_is_flushed() {
        let sql = "create table a (id int);\nalter table a add column b int";
        assert_eq!(split(sql), vec!["create table a (id int);", "alter table a add column b int"]);
    }

    #[test]
    fn test_unterminated_dollar_body_is_flushed_whole() {
        let sql = "create function f() returns int as $$\nbegin\n  return 1;\nend;";
        assert_eq!(split(sql).len(), 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(split("").is_empty());
        assert!(split("\n\n-- nothing here\n").is_empty());
    }

    #[test]
    fn test_splitter_is_fused() {
        let mut splitter = split_statements("select 1;");
        assert!(splitter.next().is_some());
        assert!(splitter.next().is_none());
        assert!(splitter.next().is_none());
    }

    #[test]
    fn test_preview_truncates() {
        let stmt = Statement::new("alter table   \"public\".\"orders\"\n  add column note text;");
        assert_eq!(stmt.preview(20), "alter table \"public\"...");
        assert_eq!(stmt.preview(200), "alter table \"public\".\"orders\" add column note text;");
    }
}
