// src/core/mod.rs

/// Classifies raw parameters into positionals and named flags.
pub mod arg_parser;
pub mod builtin;
/// Collection manifests and generator descriptors.
pub mod collection;
/// Prints staged changes and writes them to disk.
pub mod flush;
pub mod generate;
pub mod generator;
/// `{args.*}` interpolation and argument forwarding for task commands.
pub mod interpolator;
pub mod options;
pub mod task_executor;
pub mod tree;
pub mod workspace;
