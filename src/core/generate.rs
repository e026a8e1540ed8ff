// src/core/generate.rs

//! # Generate Pipeline
//!
//! Ties the pieces together for one `generate` invocation:
//! descriptor lookup, option resolution, the generator run against a fresh [`Tree`], printing
//! of the change list, and the flush (skipped in dry-run mode). A post-task returned by the
//! generator only runs after a real flush.

use crate::{
    core::{
        arg_parser::RawArgs,
        collection::{self, CollectionError},
        flush::{flush_changes, print_changes},
        generator::{GeneratorError, GeneratorRegistry, GeneratorResult, run_generator},
        options::{Prompter, combine_options},
        tree::Tree,
        workspace::WorkspaceConfig,
    },
    models::FileChange,
};
use colored::*;
use std::path::Path;

/// Flags owned by the pipeline. They are boolean, so a bare `--dry-run` never takes the
/// following parameter as its value.
const PIPELINE_FLAGS: &[&str] = &["dryRun", "d", "defaults", "interactive", "help", "h"];

/// A parsed `generate` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub collection: String,
    /// The generator name or alias as typed.
    pub generator: String,
    /// Arguments for the generator itself, with the pipeline flags removed.
    pub args: RawArgs,
    /// List the changes without writing them.
    pub dry_run: bool,
    /// Prompt for missing required options. Off with `--defaults` or `--no-interactive`.
    pub interactive: bool,
    /// Print the generator's options instead of running it.
    pub help: bool,
}

impl GenerateRequest {
    /// Parses `[collection:]generator [args...]`, pulling out `--dry-run`/`-d`,
    /// `--interactive`, `--defaults` and `--help`.
    pub fn parse(params: &[String], default_collection: Option<&str>) -> GeneratorResult<Self> {
        let mut args = RawArgs::parse_with_flags(params, PIPELINE_FLAGS);

        let dry_run = args.take_flag(&["dryRun", "d"]).unwrap_or(false);
        let defaults = args.take_flag(&["defaults"]).unwrap_or(false);
        let interactive = args.take_flag(&["interactive"]).unwrap_or(true) && !defaults;
        let help = args.take_flag(&["help", "h"]).unwrap_or(false);

        if args.positional.is_empty() {
            return Err(CollectionError::InvalidInvocation.into());
        }
        let spec = args.positional.remove(0);
        let (collection, generator) = collection::parse_generator_name(&spec, default_collection)?;

        Ok(Self {
            collection,
            generator,
            args,
            dry_run,
            interactive,
            help,
        })
    }
}

/// What a `generate` run staged, and whether it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOutcome {
    /// The change list, as printed.
    pub changes: Vec<FileChange>,
    /// True when the changes were only listed.
    pub dry_run: bool,
}

/// Runs a generator end to end against the workspace at `root`.
///
/// Configuration errors abort before the generator runs. A failing generator aborts before
/// the flush, so nothing it staged reaches the disk.
pub fn generate(
    root: &Path,
    request: &GenerateRequest,
    workspace: &WorkspaceConfig,
    registry: &GeneratorRegistry,
    prompter: &dyn Prompter,
) -> GeneratorResult<GenerateOutcome> {
    let descriptor =
        registry.read_generator(root, workspace, &request.collection, &request.generator)?;

    let options = combine_options(
        &request.args,
        &descriptor.collection,
        &descriptor.name,
        Some(workspace),
        &descriptor.schema,
        request.interactive,
        prompter,
    )?;

    let mut tree = Tree::new(root);
    let post_task = run_generator(&mut tree, &descriptor, registry, &options)?;
    let changes = tree.list_changes();

    print_changes(&changes);
    if request.dry_run {
        println!(
            "\n{}",
            "NOTE: The \"dryRun\" flag means no changes were made.".yellow()
        );
    } else {
        flush_changes(root, &changes)?;
        if let Some(task) = post_task {
            log::debug!("Running post-generation task.");
            task(&tree).map_err(GeneratorError::PostTask)?;
        }
    }

    Ok(GenerateOutcome {
        changes,
        dry_run: request.dry_run,
    })
}

// MARK: --- UNIT TESTS ---
