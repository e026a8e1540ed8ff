// src/cli/handlers/run.rs

use crate::{
    cli::handlers::commons,
    core::task_executor,
    system::executor::{ExecutionError, ProcessGroup},
};
use anyhow::{Result, anyhow};
use clap::Parser;
use colored::*;
use std::path::Path;

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Runs the commands of a target declared in workspace.toml."
)]
struct RunArgs {
    /// The target to run, as `project:target`.
    target: String,

    /// Extra options merged over the target's own (e.g. `--port=4200`).
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    overrides: Vec<String>,
}

/// The main handler for the `run` command.
pub fn handle(args: Vec<String>, root: &Path) -> Result<()> {
    let run_args = RunArgs::try_parse_from(&args)?;
    let workspace = commons::load_workspace(root)?;
    let options = workspace.target(&run_args.target).ok_or_else(|| {
        anyhow!(
            "Target '{}' not found. Declare it under [targets] in workspace.toml.",
            run_args.target.cyan()
        )
    })?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let group = ProcessGroup::new();
        let outcome = tokio::select! {
            outcome = task_executor::run_commands(root, options, &run_args.overrides, &group) => outcome?,
            _ = tokio::signal::ctrl_c() => {
                group.kill_all();
                group.wait_all().await;
                return Err(ExecutionError::Interrupted.into());
            }
        };
        outcome.into_result()?;

        // A ready race returns while its processes are still serving.
        if !group.running().is_empty() {
            println!("{}", "Ready. Press Ctrl+C to stop.".green());
            tokio::select! {
                _ = group.wait_all() => {}
                _ = tokio::signal::ctrl_c() => {
                    group.kill_all();
                    group.wait_all().await;
                }
            }
        }
        Ok::<(), anyhow::Error>(())
    })
}
