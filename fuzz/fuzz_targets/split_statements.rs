//! Fuzz target for the statement splitter.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_split_statements
//! ```

#![no_main]

use ddlsort_migrate::{Statement, split_statements};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let statements: Vec<String> = split_statements(input).map(Statement::into_inner).collect();

        for statement in &statements {
            assert!(!statement.is_empty());
            assert_eq!(statement.trim(), statement.as_str());
            assert!(!statement.starts_with("--"));
        }

        // Re-joining and splitting again must not lose or invent statements
        let rejoined: Vec<String> = split_statements(&statements.join("\n\n"))
            .map(Statement::into_inner)
            .collect();
        assert!(rejoined.len() <= statements.len());
    }
});
