//! ddlsort CLI - Command-line interface for the migration ordering engine.
//!
//! This crate provides the `ddlsort` binary: planning a schema diff,
//! writing versioned migration files, validating and applying them.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
