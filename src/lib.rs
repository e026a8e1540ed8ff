// src/lib.rs

//! Execution core of a monorepo workspace tool.
//!
//! - Generators declare file mutations on a staged [`core::tree::Tree`]; the changes are
//!   listed and flushed to disk only when the generator succeeds (never in dry-run mode).
//! - The run-commands runner in [`core::task_executor`] executes a target's shell commands
//!   serially, in parallel, or until one of them prints a readiness signal.

/// Command-line definition and the action handlers.
pub mod cli;
/// File names and identifiers shared across the crate.
pub mod constants;
pub mod core;
/// Serializable data shared by the engines: changes, schemas, manifests and task options.
pub mod models;
pub mod system;
