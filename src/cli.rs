// src/cli.rs

use clap::Parser;
use std::path::PathBuf;

/// One handler per action, dispatched by the binary.
pub mod handlers;

/// stagecraft: staged workspace generators and a run-commands task runner.
///
/// Actions:
/// - `stagecraft generate [collection:]generator [options...]`
///   Runs a generator. Changes are staged, listed, and only written when the
///   generator succeeds. Pass `--dry-run` to only list them.
/// - `stagecraft run <project:target> [-- overrides...]`
///   Runs the commands of a target declared in `workspace.toml`.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// The workspace root. Defaults to the current directory. Must precede the action.
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// The action to execute (`generate`, `run`).
    pub action: Option<String>,

    /// All remaining arguments, passed unchanged to the action.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}
