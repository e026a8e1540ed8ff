// src/cli/handlers/mod.rs

/// Helpers shared by several handlers.
pub mod commons;
/// The `generate` action.
pub mod generate;
/// The `run` action.
pub mod run;
