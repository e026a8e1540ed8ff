// src/bin/stagecraft.rs

//! The `stagecraft` command-line entry point.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use colored::*;
use stagecraft::{
    cli::{Cli, handlers},
    system::executor,
};
use std::env;
use std::path::Path;

// --- Command Definition and Registry ---

/// A system command, its aliases, and its handler.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>, &Path) -> Result<()>,
}

static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "generate",
        aliases: &["g"],
        handler: handlers::generate::handle,
    },
    CommandDefinition {
        name: "run",
        aliases: &[],
        handler: handlers::run::handle,
    },
];

fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// Sets up logging, dispatches to the handler, and reports errors in one place.
fn main() {
    env_logger::init();

    if let Err(e) = run_cli(Cli::parse()) {
        if let Some(exec_err) = e.downcast_ref::<executor::ExecutionError>()
            && matches!(exec_err, executor::ExecutionError::Interrupted)
        {
            std::process::exit(130);
        }

        eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);

    let root = match cli.root {
        Some(root) => root,
        None => env::current_dir().context("Could not determine the current directory")?,
    };
    let root = dunce::canonicalize(&root)
        .with_context(|| format!("Workspace root '{}' is not accessible", root.display()))?;
    log::debug!("Workspace root: {}", root.display());

    let action = cli.action.ok_or_else(|| {
        anyhow!(
            "Missing action. Available actions: {}",
            COMMAND_REGISTRY
                .iter()
                .map(|cmd| cmd.name)
                .collect::<Vec<_>>()
                .join(", ")
        )
    })?;

    let command = find_command(&action)
        .ok_or_else(|| anyhow!("Unknown action '{}'.", action.yellow()))?;
    (command.handler)(cli.args, &root)
}
