// src/system/executor.rs

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tokio::process::{ChildStderr, ChildStdout, Command};
use tokio::sync::{oneshot, watch};

/// Errors raised while spawning or supervising a child process.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// The command line is blank.
    #[error("No command specified to run.")]
    EmptyCommand,
    /// The shell could not be started.
    #[error("Command '{command}' could not be executed: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    /// The exit status could not be collected.
    #[error("Lost track of command '{command}': {source}")]
    Wait {
        command: String,
        #[source]
        source: io::Error,
    },
    /// The run was cancelled with Ctrl-C.
    #[error("Interrupted by the user.")]
    Interrupted,
}
pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// How the standard streams of a spawned command are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// The child writes straight to the caller's terminal.
    Inherit,
    /// Stdout and stderr are piped back to the caller.
    Capture,
}

/// A command spawned through a [`ProcessGroup`].
#[derive(Debug)]
pub struct RunningCommand {
    /// The command line as it was spawned.
    pub command: String,
    /// Set only for [`OutputMode::Capture`].
    pub stdout: Option<ChildStdout>,
    /// Set only for [`OutputMode::Capture`].
    pub stderr: Option<ChildStderr>,
    exit: oneshot::Receiver<io::Result<ExitStatus>>,
}

impl RunningCommand {
    /// Waits for the command to exit. Reading piped output is the caller's job; an unread
    /// pipe that fills up will stall the child.
    pub async fn wait(self) -> ExecutionResult<ExitStatus> {
        let command = self.command;
        match self.exit.await {
            Ok(Ok(status)) => Ok(status),
            Ok(Err(source)) => Err(ExecutionError::Wait { command, source }),
            Err(_) => Err(ExecutionError::Wait {
                command,
                source: io::Error::other("the process supervisor stopped unexpectedly"),
            }),
        }
    }
}

#[derive(Debug)]
struct Member {
    command: String,
    kill: Option<oneshot::Sender<()>>,
    done: watch::Receiver<bool>,
}

/// Owns every child process a task run spawns.
///
/// Each child is watched by a supervisor task. [`ProcessGroup::kill_all`] terminates the
/// members still running, and dropping the group has the same effect.
#[derive(Debug, Default)]
pub struct ProcessGroup {
    members: Mutex<Vec<Member>>,
}

impl ProcessGroup {
    /// Creates an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `command_line` through the platform shell inside `cwd`.
    ///
    /// The child inherits the current environment with `env` layered on top. Must be called
    /// from within a Tokio runtime.
    pub fn spawn(
        &self,
        command_line: &str,
        cwd: &Path,
        env: &BTreeMap<String, String>,
        output: OutputMode,
    ) -> ExecutionResult<RunningCommand> {
        let command_line = command_line.trim();
        if command_line.is_empty() {
            return Err(ExecutionError::EmptyCommand);
        }

        let mut command = shell_command(command_line);
        command
            .current_dir(dunce::simplified(cwd))
            .envs(env)
            .stdin(Stdio::inherit())
            .kill_on_drop(true);
        match output {
            OutputMode::Inherit => command.stdout(Stdio::inherit()).stderr(Stdio::inherit()),
            OutputMode::Capture => command.stdout(Stdio::piped()).stderr(Stdio::piped()),
        };

        let mut child = command.spawn().map_err(|source| ExecutionError::Spawn {
            command: command_line.to_string(),
            source,
        })?;
        log::debug!(
            "Spawned '{}' (PID: {}).",
            command_line,
            child.id().map(|id| id.to_string()).unwrap_or_default()
        );

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (kill_tx, mut kill_rx) = oneshot::channel::<()>();
        let (exit_tx, exit_rx) = oneshot::channel();
        let (done_tx, done_rx) = watch::channel(false);

        let label = command_line.to_string();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = &mut kill_rx => {
                    log::debug!("Killing '{}'.", label);
                    if let Err(e) = child.kill().await {
                        log::warn!("Failed to kill '{}': {}", label, e);
                    }
                    child.wait().await
                }
            };
            let _ = done_tx.send(true);
            let _ = exit_tx.send(status);
        });

        self.lock().push(Member {
            command: command_line.to_string(),
            kill: Some(kill_tx),
            done: done_rx,
        });

        Ok(RunningCommand {
            command: command_line.to_string(),
            stdout,
            stderr,
            exit: exit_rx,
        })
    }

    /// The number of processes ever spawned through this group.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing was spawned through this group yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// The commands of the members that have not exited yet.
    pub fn running(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|m| !*m.done.borrow())
            .map(|m| m.command.clone())
            .collect()
    }

    /// Asks every member that is still running to terminate.
    pub fn kill_all(&self) {
        for member in self.lock().iter_mut() {
            if *member.done.borrow() {
                continue;
            }
            if let Some(kill) = member.kill.take() {
                let _ = kill.send(());
            }
        }
    }

    /// Resolves once every member spawned so far has exited.
    pub async fn wait_all(&self) {
        let receivers: Vec<watch::Receiver<bool>> =
            self.lock().iter().map(|m| m.done.clone()).collect();
        for mut done in receivers {
            // An error means the supervisor is gone, which only happens after the exit.
            let _ = done.wait_for(|finished| *finished).await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Member>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(windows)]
fn shell_command(command_line: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(command_line);
    command
}

#[cfg(not(windows))]
fn shell_command(command_line: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(command_line);
    command
}

// MARK: --- UNIT TESTS ---

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_spawn_captures_output_and_status() {
        // --- Setup ---
        let dir = TempDir::new().unwrap();
        let group = ProcessGroup::new();
        let mut env = BTreeMap::new();
        env.insert("GREETING".to_string(), "hello".to_string());

        // --- Execute ---
        let mut running = group
            .spawn("echo $GREETING; pwd; exit 3", dir.path(), &env, OutputMode::Capture)
            .unwrap();
        let mut output = String::new();
        running
            .stdout
            .take()
            .unwrap()
            .read_to_string(&mut output)
            .await
            .unwrap();
        let status = running.wait().await.unwrap();

        // --- Assert ---
        assert!(output.starts_with("hello\n"));
        assert_eq!(status.code(), Some(3));
        assert_eq!(group.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_command_is_rejected() {
        let group = ProcessGroup::new();
        let result = group.spawn("   ", Path::new("."), &BTreeMap::new(), OutputMode::Inherit);
        assert!(matches!(result, Err(ExecutionError::EmptyCommand)));
        assert!(group.is_empty());
    }

    #[tokio::test]
    async fn test_kill_all_terminates_running_members() {
        // --- Setup ---
        let group = ProcessGroup::new();
        let running = group
            .spawn("sleep 30", Path::new("."), &BTreeMap::new(), OutputMode::Capture)
            .unwrap();
        assert_eq!(group.running(), vec!["sleep 30".to_string()]);

        // --- Execute ---
        group.kill_all();
        let status = running.wait().await.unwrap();
        group.wait_all().await;

        // --- Assert ---
        assert!(!status.success());
        assert!(group.running().is_empty());
    }
}
