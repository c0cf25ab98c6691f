//! Fuzz target for plan construction.
//!
//! Any text must produce a plan that contains every statement exactly once
//! and places every table exactly once.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_build_plan
//! ```

#![no_main]

use std::collections::BTreeSet;

use ddlsort_migrate::{build_execution_plan, split_statements};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let plan = build_execution_plan(input);

        assert_eq!(plan.statement_count(), split_statements(input).count());

        let tables: Vec<&str> = plan.table_names().collect();
        let unique: BTreeSet<&str> = tables.iter().copied().collect();
        assert_eq!(tables.len(), unique.len());

        for table in plan.cyclic_remainder() {
            assert!(unique.contains(table.as_str()));
        }
    }
});
