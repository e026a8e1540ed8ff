// src/core/flush.rs

use crate::models::{ChangeKind, FileChange};
use colored::*;
use std::fmt::Write;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;
use thiserror::Error;

/// Errors raised while writing staged changes to disk.
#[derive(Error, Debug)]
pub enum FlushError {
    #[error("Could not create directory '{path}': {source}")]
    CreateDir {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Could not write '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Could not delete '{path}': {source}")]
    Delete {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Change for '{0}' has no content to write.")]
    MissingContent(String),
}
pub type FlushResult<T> = Result<T, FlushError>;

/// Applies a change list to the filesystem under `root`, in order.
///
/// Not atomic: if a change fails, the ones before it stay applied. Deleting a target that is
/// already gone counts as done.
pub fn flush_changes(root: &Path, changes: &[FileChange]) -> FlushResult<()> {
    log::debug!("Flushing {} change(s) to '{}'.", changes.len(), root.display());
    for change in changes {
        let full_path = root.join(&change.path);
        match change.kind {
            ChangeKind::Create | ChangeKind::Update => {
                let content = change
                    .content
                    .as_deref()
                    .ok_or_else(|| FlushError::MissingContent(change.path.clone()))?;
                if let Some(parent) = full_path.parent() {
                    fs::create_dir_all(parent).map_err(|source| FlushError::CreateDir {
                        path: parent.display().to_string(),
                        source,
                    })?;
                }
                fs::write(&full_path, content).map_err(|source| FlushError::Write {
                    path: change.path.clone(),
                    source,
                })?;
            }
            ChangeKind::Delete => delete_path(&full_path, &change.path)?,
        }
        log::trace!("Applied {} {}", change.kind, change.path);
    }
    Ok(())
}

fn delete_path(full_path: &Path, display_path: &str) -> FlushResult<()> {
    let metadata = match fs::symlink_metadata(full_path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::debug!("'{}' is already gone, nothing to delete.", display_path);
            return Ok(());
        }
        Err(source) => {
            return Err(FlushError::Delete {
                path: display_path.to_string(),
                source,
            });
        }
    };

    let result = if metadata.is_dir() {
        fs::remove_dir_all(full_path)
    } else {
        fs::remove_file(full_path)
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(FlushError::Delete {
            path: display_path.to_string(),
            source,
        }),
    }
}

// --- Reporting ---

/// Renders a change list the way it is shown to the user, one `KIND path` line per change.
pub fn format_changes(changes: &[FileChange]) -> String {
    let mut out = String::with_capacity(changes.len() * 40);
    for change in changes {
        let label = change.kind.to_string();
        let label = match change.kind {
            ChangeKind::Create => label.green(),
            ChangeKind::Update => label.white(),
            ChangeKind::Delete => label.yellow(),
        };
        // Writing into a String cannot fail.
        let _ = writeln!(out, "{} {}", label, change.path);
    }
    out
}

/// Prints one colored line per change.
pub fn print_changes(changes: &[FileChange]) {
    print!("{}", format_changes(changes));
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn change(path: &str, kind: ChangeKind, content: Option<&str>) -> FileChange {
        FileChange {
            path: path.to_string(),
            kind,
            content: content.map(|c| c.as_bytes().to_vec()),
        }
    }

    #[test]
    fn test_flush_creates_parent_directories() {
        // --- Setup ---
        let dir = TempDir::new().unwrap();
        let changes = [change("a/b/c.txt", ChangeKind::Create, Some("deep"))];

        // --- Execute ---
        flush_changes(dir.path(), &changes).unwrap();

        // --- Assert ---
        let written = fs::read_to_string(dir.path().join("a/b/c.txt")).unwrap();
        assert_eq!(written, "deep");
    }

    #[test]
    fn test_flush_update_overwrites() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("f.txt"), "old").unwrap();

        flush_changes(dir.path(), &[change("f.txt", ChangeKind::Update, Some("new"))]).unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("f.txt")).unwrap(), "new");
    }

    #[test]
    fn test_flush_delete_file_and_directory() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("libs/old/src")).unwrap();
        fs::write(dir.path().join("libs/old/src/index.ts"), "x").unwrap();
        fs::write(dir.path().join("README.md"), "x").unwrap();

        let changes = [
            change("libs/old", ChangeKind::Delete, None),
            change("README.md", ChangeKind::Delete, None),
        ];
        flush_changes(dir.path(), &changes).unwrap();

        assert!(!dir.path().join("libs/old").exists());
        assert!(!dir.path().join("README.md").exists());
        assert!(dir.path().join("libs").exists());
    }

    #[test]
    fn test_flush_delete_missing_target_is_success() {
        let dir = TempDir::new().unwrap();
        let result = flush_changes(dir.path(), &[change("ghost", ChangeKind::Delete, None)]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_flush_is_not_atomic() {
        // --- Setup ---
        // The second change targets a path whose parent is a regular file, so it must fail.
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("blocker"), "file").unwrap();
        let changes = [
            change("first.txt", ChangeKind::Create, Some("1")),
            change("blocker/second.txt", ChangeKind::Create, Some("2")),
        ];

        // --- Execute ---
        let result = flush_changes(dir.path(), &changes);

        // --- Assert ---
        assert!(result.is_err());
        assert!(dir.path().join("first.txt").exists());
    }

    #[test]
    fn test_format_changes_lists_every_change() {
        colored::control::set_override(false);
        let changes = [
            change("a.txt", ChangeKind::Create, Some("")),
            change("b.txt", ChangeKind::Update, Some("")),
            change("c.txt", ChangeKind::Delete, None),
        ];
        assert_eq!(
            format_changes(&changes),
            "CREATE a.txt\nUPDATE b.txt\nDELETE c.txt\n"
        );
    }
}
