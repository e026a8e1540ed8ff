// src/core/task_executor.rs

//! # Command Task Runner
//!
//! Executes the commands of a run-commands target. Commands are normalized, their
//! interpolation arguments applied, and then run in one of three modes:
//!
//! - **Serial**: one after another with inherited stdio; the first non-zero exit stops the run.
//! - **Parallel**: all at once; the run succeeds only when every command exits zero.
//! - **Ready race**: all at once with their output scanned for `readyWhen`; the first match
//!   resolves the run as a success while the processes keep running.
//!
//! Every child is spawned through the caller's [`ProcessGroup`], which decides when the
//! children are terminated.

use crate::{
    constants::DEFAULT_ENV_FILENAME,
    core::{
        arg_parser::RawArgs,
        interpolator::{parse_args_string, transform_command, unknown_options_as_args},
    },
    models::{CommandFailure, CommandSpec, RunCommandsOptions, TaskOutcome},
    system::{
        env::{EnvFileError, child_env_overlay, load_env_file, parent_env_keys},
        executor::{ExecutionError, OutputMode, ProcessGroup, RunningCommand},
    },
};
use colored::*;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Errors that stop a run-commands target.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Invalid args: {0}")]
    InvalidArgsSyntax(String),
    #[error("Bad run-commands configuration: {0}")]
    InvalidConfiguration(String),
    #[error("{} command(s) failed:\n{}", .failures.len(), list_failures(.failures))]
    CommandExecutionFailure { failures: Vec<CommandFailure> },
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    EnvFile(#[from] EnvFileError),
}
pub type TaskResult<T> = Result<T, TaskError>;

fn list_failures(failures: &[CommandFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("  - {}", failure))
        .collect::<Vec<_>>()
        .join("\n")
}

impl TaskOutcome {
    /// Turns a failed outcome into [`TaskError::CommandExecutionFailure`].
    pub fn into_result(self) -> TaskResult<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(TaskError::CommandExecutionFailure {
                failures: self.failures,
            })
        }
    }
}

// --- Main Public Function ---

/// Runs a run-commands target from the workspace at `root`.
///
/// `overrides` are extra CLI arguments (`--port=4200`) merged over the target's options.
/// Configuration errors are reported before any process starts. A command exiting non-zero
/// is not an error: it yields a failed [`TaskOutcome`] naming the failing command(s).
pub async fn run_commands(
    root: &Path,
    options: &RunCommandsOptions,
    overrides: &[String],
    group: &ProcessGroup,
) -> TaskResult<TaskOutcome> {
    let options = apply_overrides(options, overrides)?;
    let (specs, parallel) = normalize_commands(&options)?;

    let ready_when = options.ready_when.as_deref().filter(|s| !s.is_empty());
    if ready_when.is_some() && !parallel {
        return Err(TaskError::InvalidConfiguration(
            "\"readyWhen\" can only be used when parallel=true".to_string(),
        ));
    }

    let args = match options.args.as_deref() {
        Some(args) => parse_args_string(args)?,
        None => unknown_options_as_args(&options.extra),
    };
    let commands: Vec<String> = specs
        .iter()
        .map(|spec| transform_command(&spec.command, &args, spec.forward_all_args))
        .collect();

    let cwd = resolve_cwd(root, options.cwd.as_deref())?;
    let env = resolve_env(root, &options)?;
    if let Some(output_path) = &options.output_path {
        log::debug!("Target declares output path '{}'.", output_path);
    }

    match (parallel, ready_when) {
        (false, _) => run_serially(&commands, &cwd, &env, group).await,
        (true, None) => run_in_parallel(&commands, &cwd, &env, group).await,
        (true, Some(ready_when)) => race_until_ready(&commands, ready_when, &cwd, &env, group).await,
    }
}

// --- Option Normalization ---

/// Merges CLI overrides over the target options. `"true"`/`"false"` become booleans.
fn apply_overrides(
    options: &RunCommandsOptions,
    overrides: &[String],
) -> TaskResult<RunCommandsOptions> {
    if overrides.is_empty() {
        return Ok(options.clone());
    }

    let raw = RawArgs::parse_verbatim(overrides);
    if !raw.positional.is_empty() {
        log::debug!("Ignoring positional overrides: {:?}", raw.positional);
    }

    let invalid = |e: serde_json::Error| TaskError::InvalidConfiguration(e.to_string());
    let mut merged = serde_json::to_value(options).map_err(invalid)?;
    if let Value::Object(map) = &mut merged {
        for (key, value) in raw.named {
            let value = match value {
                Value::String(s) if s == "true" => Value::Bool(true),
                Value::String(s) if s == "false" => Value::Bool(false),
                other => other,
            };
            log::trace!("Override {} = {}", key, value);
            map.insert(key, value);
        }
    }
    serde_json::from_value(merged).map_err(invalid)
}

/// Returns the commands to run and whether they run in parallel. A single `command` always
/// runs serially.
fn normalize_commands(options: &RunCommandsOptions) -> TaskResult<(Vec<CommandSpec>, bool)> {
    let (specs, parallel) = match &options.command {
        Some(command) => (
            vec![CommandSpec {
                command: command.clone(),
                forward_all_args: true,
            }],
            false,
        ),
        None => (
            options.commands.iter().map(CommandSpec::from).collect(),
            options.parallel,
        ),
    };

    if specs.iter().all(|spec| spec.command.trim().is_empty()) {
        return Err(TaskError::InvalidConfiguration(
            "no \"command\" or \"commands\" to run".to_string(),
        ));
    }
    Ok((specs, parallel))
}

fn expand(path: &str) -> TaskResult<PathBuf> {
    shellexpand::full(path)
        .map(|expanded| PathBuf::from(expanded.as_ref()))
        .map_err(|e| TaskError::InvalidConfiguration(format!("cannot expand '{}': {}", path, e)))
}

fn resolve_cwd(root: &Path, cwd: Option<&str>) -> TaskResult<PathBuf> {
    match cwd {
        Some(cwd) => Ok(root.join(expand(cwd)?)),
        None => Ok(root.to_path_buf()),
    }
}

/// Builds the environment overlay for the children: variables from the env file that the
/// parent does not define, plus `FORCE_COLOR` when requested.
fn resolve_env(root: &Path, options: &RunCommandsOptions) -> TaskResult<BTreeMap<String, String>> {
    let file_vars = match options.env_file.as_deref() {
        Some(env_file) => load_env_file(&root.join(expand(env_file)?))?,
        None => {
            let default_path = root.join(DEFAULT_ENV_FILENAME);
            if default_path.is_file() {
                load_env_file(&default_path)?
            } else {
                BTreeMap::new()
            }
        }
    };
    log::debug!("Loaded {} variable(s) from the environment file.", file_vars.len());
    Ok(child_env_overlay(&file_vars, &parent_env_keys(), options.color))
}

// --- Execution Modes ---

fn failure(command: &str, status: ExitStatus) -> CommandFailure {
    CommandFailure {
        command: command.to_string(),
        exit_code: status.code(),
    }
}

async fn run_serially(
    commands: &[String],
    cwd: &Path,
    env: &BTreeMap<String, String>,
    group: &ProcessGroup,
) -> TaskResult<TaskOutcome> {
    for command in commands.iter().filter(|c| !c.trim().is_empty()) {
        println!("{} {}", "→".blue(), command.green());
        let status = group.spawn(command, cwd, env, OutputMode::Inherit)?.wait().await?;
        if !status.success() {
            let failure = failure(command, status);
            log::warn!("Command {}", failure);
            return Ok(TaskOutcome::failed(vec![failure]));
        }
    }
    Ok(TaskOutcome::succeeded())
}

fn print_batch_header(commands: &[String]) {
    let mut header_block = String::with_capacity(commands.len() * 80);
    let _ = writeln!(
        header_block,
        "{}",
        format!("┌─ Running {} commands in parallel...", commands.len()).dimmed()
    );
    let inter_arrow = ("├─>").dimmed();
    for command in commands {
        let _ = writeln!(header_block, "{} {}", inter_arrow, command.green());
    }
    print!("{}", header_block);
}

async fn run_in_parallel(
    commands: &[String],
    cwd: &Path,
    env: &BTreeMap<String, String>,
    group: &ProcessGroup,
) -> TaskResult<TaskOutcome> {
    print_batch_header(commands);

    let mut running = Vec::with_capacity(commands.len());
    for command in commands {
        running.push(group.spawn(command, cwd, env, OutputMode::Inherit)?);
    }

    let exits = running
        .into_iter()
        .map(|process| (process.command.clone(), process.wait()))
        .collect();
    let (failures, lost) = collect_exits(exits).await;
    println!("{}", "└─ End batch.".dimmed());

    if let Some(e) = lost {
        return Err(e.into());
    }
    if failures.is_empty() {
        Ok(TaskOutcome::succeeded())
    } else {
        for failure in &failures {
            log::warn!("Command {}", failure);
        }
        Ok(TaskOutcome::failed(failures))
    }
}

/// Awaits every exit in order, so each child runs on its own and only the moment we observe
/// its exit changes. A process we lost track of does not stop the rest from being awaited;
/// the first such error is returned next to the failures.
async fn collect_exits<F>(exits: Vec<(String, F)>) -> (Vec<CommandFailure>, Option<ExecutionError>)
where
    F: Future<Output = Result<ExitStatus, ExecutionError>>,
{
    let mut failures = Vec::new();
    let mut lost = None;
    for (command, exit) in exits {
        match exit.await {
            Ok(status) if !status.success() => failures.push(failure(&command, status)),
            Ok(_) => {}
            Err(e) => {
                log::warn!("{}", e);
                lost.get_or_insert(e);
            }
        }
    }
    (failures, lost)
}

#[derive(Debug)]
enum RaceEvent {
    Ready(usize),
    Exited {
        index: usize,
        status: Result<ExitStatus, ExecutionError>,
        matched: bool,
    },
}

async fn race_until_ready(
    commands: &[String],
    ready_when: &str,
    cwd: &Path,
    env: &BTreeMap<String, String>,
    group: &ProcessGroup,
) -> TaskResult<TaskOutcome> {
    print_batch_header(commands);
    log::debug!("Waiting for any command to print '{}'.", ready_when);

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    for (index, command) in commands.iter().enumerate() {
        let running = group.spawn(command, cwd, env, OutputMode::Capture)?;
        tokio::spawn(watch_command(
            index,
            running,
            ready_when.to_string(),
            events_tx.clone(),
        ));
    }
    drop(events_tx);

    while let Some(event) = events_rx.recv().await {
        match event {
            RaceEvent::Ready(index) => {
                log::debug!("Ready signal seen in output of command #{}.", index);
                return Ok(TaskOutcome::succeeded());
            }
            RaceEvent::Exited {
                index,
                status,
                matched,
            } => {
                let status = status?;
                if !status.success() && !matched {
                    let command = commands.get(index).map(String::as_str).unwrap_or_default();
                    let failure = failure(command, status);
                    log::warn!("Command {}", failure);
                    return Ok(TaskOutcome::failed(vec![failure]));
                }
            }
        }
    }

    // Every command exited zero without printing the ready signal.
    Ok(TaskOutcome::succeeded())
}

/// Forwards a captured command's output to our own stdout/stderr while scanning it, then
/// reports its exit.
async fn watch_command(
    index: usize,
    mut running: RunningCommand,
    ready_when: String,
    events: mpsc::UnboundedSender<RaceEvent>,
) {
    let on_ready = || {
        let _ = events.send(RaceEvent::Ready(index));
    };
    let stdout = running.stdout.take();
    let stderr = running.stderr.take();

    let (out_matched, err_matched) = tokio::join!(
        async {
            match stdout {
                Some(reader) => {
                    forward_and_scan(reader, tokio::io::stdout(), &ready_when, on_ready).await
                }
                None => false,
            }
        },
        async {
            match stderr {
                Some(reader) => {
                    forward_and_scan(reader, tokio::io::stderr(), &ready_when, on_ready).await
                }
                None => false,
            }
        }
    );

    let status = running.wait().await;
    let _ = events.send(RaceEvent::Exited {
        index,
        status,
        matched: out_matched || err_matched,
    });
}

/// Copies `reader` into `writer` until EOF. Calls `on_ready` once when `needle` shows up,
/// including across chunk boundaries. Returns whether it was seen.
async fn forward_and_scan<R, W, F>(mut reader: R, mut writer: W, needle: &str, on_ready: F) -> bool
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    F: Fn(),
{
    let needle = needle.as_bytes();
    let mut matched = false;
    let mut tail: Vec<u8> = Vec::new();
    let mut buffer = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let read = match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) => {
                log::debug!("Stopped reading command output: {}", e);
                break;
            }
        };
        let chunk = buffer.get(..read).unwrap_or_default();
        if writer.write_all(chunk).await.is_ok() {
            let _ = writer.flush().await;
        }

        if matched || needle.is_empty() {
            continue;
        }
        tail.extend_from_slice(chunk);
        if tail.windows(needle.len()).any(|window| window == needle) {
            matched = true;
            tail = Vec::new();
            on_ready();
        } else {
            let keep_from = tail.len().saturating_sub(needle.len() - 1);
            tail = tail.split_off(keep_from);
        }
    }
    matched
}

// MARK: --- UNIT TESTS ---
