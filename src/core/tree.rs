// src/core/tree.rs

//! # Staged Tree
//!
//! An in-memory log of pending file operations over a base directory. Generators mutate a
//! `Tree` instead of the disk; nothing touches the filesystem until the change list is
//! flushed. Reads see the latest staged write for a path and fall through to the disk
//! when nothing is staged.
//!
//! Every path keeps at most one pending entry. Collisions on the same path are collapsed
//! by [`merge`], which is the only place the collapsing rules live.

use crate::models::{ChangeKind, FileChange};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Errors raised by staged tree operations.
#[derive(Error, Debug)]
pub enum TreeError {
    /// The normalized path escapes the root through `..`.
    #[error("Path '{0}' points outside of the workspace root.")]
    OutsideRoot(String),
    /// The path normalizes to the root itself.
    #[error("Path '{0}' does not name a file inside the workspace.")]
    InvalidPath(String),
    /// Reading the on-disk file failed.
    #[error("Could not read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    /// A text read hit content that is not UTF-8.
    #[error("File '{path}' is not valid UTF-8")]
    InvalidUtf8 {
        path: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
    /// The source of a rename exists neither staged nor on disk.
    #[error("Cannot rename '{0}': the file does not exist.")]
    RenameMissing(String),
}
pub type TreeResult<T> = Result<T, TreeError>;

/// A pending operation on a single path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pending {
    /// The path does not exist on disk and will be written.
    Create(Vec<u8>),
    /// The path exists on disk and will be overwritten.
    Update(Vec<u8>),
    /// The path exists on disk and will be removed, recursively for a directory.
    Delete,
}

impl Pending {
    fn kind(&self) -> ChangeKind {
        match self {
            Self::Create(_) => ChangeKind::Create,
            Self::Update(_) => ChangeKind::Update,
            Self::Delete => ChangeKind::Delete,
        }
    }

    fn content(&self) -> Option<&[u8]> {
        match self {
            Self::Create(c) | Self::Update(c) => Some(c),
            Self::Delete => None,
        }
    }
}

/// Collapses an incoming operation into the one already staged for the same path.
///
/// A `Delete` is only ever staged for paths that exist on disk, and a `Create` only for paths
/// that do not, so a write landing on a staged `Delete` is a net `Update`.
/// Returns `None` when the two operations cancel out.
pub fn merge(existing: Pending, incoming: Pending) -> Option<Pending> {
    match (existing, incoming) {
        (Pending::Create(_), Pending::Delete) => None,
        (Pending::Create(_), Pending::Create(content) | Pending::Update(content)) => {
            Some(Pending::Create(content))
        }
        (Pending::Update(_) | Pending::Delete, Pending::Delete) => Some(Pending::Delete),
        (Pending::Update(_) | Pending::Delete, Pending::Create(content) | Pending::Update(content)) => {
            Some(Pending::Update(content))
        }
    }
}

/// Normalizes a user-supplied path into a root-relative, `/`-separated key.
/// The workspace root itself normalizes to the empty string.
pub fn normalize_path(path: &str) -> TreeResult<String> {
    let unified = path.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(TreeError::OutsideRoot(path.to_string()));
                }
            }
            other => segments.push(other),
        }
    }
    Ok(segments.join("/"))
}

/// The staged view of a workspace directory.
#[derive(Debug)]
pub struct Tree {
    root: PathBuf,
    /// Paths in the order they were first staged.
    order: Vec<String>,
    records: HashMap<String, Pending>,
}

impl Tree {
    /// Creates an empty staged view of `root`. Nothing is read until a path is queried.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            order: Vec::new(),
            records: HashMap::new(),
        }
    }

    /// The directory the staged paths are relative to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // --- Reads ---

    /// Returns the staged content of `path`, or the on-disk content when nothing is staged.
    /// `None` means the file does not exist (or is staged for deletion).
    pub fn read(&self, path: &str) -> TreeResult<Option<Vec<u8>>> {
        let key = normalize_path(path)?;
        match self.records.get(&key) {
            Some(pending) => Ok(pending.content().map(<[u8]>::to_vec)),
            None if self.deleted_by_ancestor(&key) => Ok(None),
            None => {
                let full_path = self.root.join(&key);
                if !full_path.is_file() {
                    return Ok(None);
                }
                log::trace!("Reading '{}' through to disk.", key);
                fs::read(&full_path)
                    .map(Some)
                    .map_err(|source| TreeError::Read { path: key, source })
            }
        }
    }

    /// Like [`Tree::read`], decoded as UTF-8.
    pub fn read_to_string(&self, path: &str) -> TreeResult<Option<String>> {
        match self.read(path)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|source| TreeError::InvalidUtf8 {
                    path: path.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// True if `path` is a file or a directory in the staged view.
    pub fn exists(&self, path: &str) -> TreeResult<bool> {
        let key = normalize_path(path)?;
        Ok(self.exists_key(&key))
    }

    /// True if `path` is a file in the staged view. Directories are not files.
    pub fn is_file(&self, path: &str) -> TreeResult<bool> {
        let key = normalize_path(path)?;
        Ok(match self.records.get(&key) {
            Some(pending) => pending.content().is_some(),
            None if self.deleted_by_ancestor(&key) => false,
            None => self.root.join(&key).is_file(),
        })
    }

    /// Lists the immediate children of `dir`, merging the disk with staged changes.
    pub fn children(&self, dir: &str) -> TreeResult<Vec<String>> {
        let key = normalize_path(dir)?;
        let mut names = BTreeSet::new();

        if !self.is_gone(&key) {
            let full_path = self.root.join(&key);
            if full_path.is_dir() {
                let entries = fs::read_dir(&full_path).map_err(|source| TreeError::Read {
                    path: key.clone(),
                    source,
                })?;
                for entry in entries.flatten() {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    if !matches!(self.records.get(&join_key(&key, &name)), Some(Pending::Delete)) {
                        names.insert(name);
                    }
                }
            }
        }

        for (staged, pending) in &self.records {
            if pending.content().is_none() {
                continue;
            }
            if let Some(rest) = strip_dir_prefix(staged, &key)
                && let Some(first) = rest.split('/').next()
            {
                names.insert(first.to_string());
            }
        }

        Ok(names.into_iter().collect())
    }

    /// Recursively lists every file under `dir` in the staged view, sorted.
    pub fn files_under(&self, dir: &str) -> TreeResult<Vec<String>> {
        let key = normalize_path(dir)?;
        let mut files = BTreeSet::new();

        if !self.is_gone(&key) {
            let full_path = self.root.join(&key);
            if full_path.is_dir() {
                for entry in WalkDir::new(&full_path).into_iter().flatten() {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                        continue;
                    };
                    let relative = normalize_path(&relative.to_string_lossy())?;
                    if self.records.contains_key(&relative) || self.deleted_by_ancestor(&relative) {
                        continue;
                    }
                    files.insert(relative);
                }
            }
        }

        for (staged, pending) in &self.records {
            if pending.content().is_some() && strip_dir_prefix(staged, &key).is_some() {
                files.insert(staged.clone());
            }
        }

        Ok(files.into_iter().collect())
    }

    // --- Mutations ---

    /// Stages `content` for `path`: a `CREATE` if the path exists nowhere yet, else an `UPDATE`.
    pub fn write(&mut self, path: &str, content: impl Into<Vec<u8>>) -> TreeResult<()> {
        let key = normalize_path(path)?;
        if key.is_empty() {
            return Err(TreeError::InvalidPath(path.to_string()));
        }
        let content = content.into();
        let incoming = if self.exists_key(&key) {
            Pending::Update(content)
        } else {
            Pending::Create(content)
        };
        log::trace!("Staging {} for '{}'.", incoming.kind(), key);
        self.stage(key, incoming);
        Ok(())
    }

    /// Stages the removal of a file or a whole directory.
    /// Staged entries beneath a deleted directory are dropped; deleting a path that exists
    /// nowhere is a no-op.
    pub fn delete(&mut self, path: &str) -> TreeResult<()> {
        let key = normalize_path(path)?;
        if key.is_empty() {
            return Err(TreeError::InvalidPath(path.to_string()));
        }

        let descendants: Vec<String> = self
            .records
            .keys()
            .filter(|staged| strip_dir_prefix(staged, &key).is_some())
            .cloned()
            .collect();
        for descendant in &descendants {
            self.unstage(descendant);
        }

        let on_disk =
            !self.deleted_by_ancestor(&key) && fs::symlink_metadata(self.root.join(&key)).is_ok();
        if self.records.contains_key(&key) || on_disk {
            self.stage(key, Pending::Delete);
        } else {
            log::debug!("Ignoring delete of '{}': it does not exist.", key);
        }
        Ok(())
    }

    /// Moves the content of `from` to `to`: `to` is written and `from` is deleted.
    pub fn rename(&mut self, from: &str, to: &str) -> TreeResult<()> {
        let content = self
            .read(from)?
            .ok_or_else(|| TreeError::RenameMissing(from.to_string()))?;
        self.write(to, content)?;
        self.delete(from)
    }

    /// The net effect of every staged operation, in first-write order.
    pub fn list_changes(&self) -> Vec<FileChange> {
        self.order
            .iter()
            .filter_map(|path| {
                self.records.get(path).map(|pending| FileChange {
                    path: path.clone(),
                    kind: pending.kind(),
                    content: pending.content().map(<[u8]>::to_vec),
                })
            })
            .collect()
    }

    // --- Internal Helpers ---

    fn stage(&mut self, key: String, incoming: Pending) {
        match self.records.remove(&key) {
            Some(existing) => match merge(existing, incoming) {
                Some(merged) => {
                    self.records.insert(key, merged);
                }
                None => self.order.retain(|p| *p != key),
            },
            None => {
                self.order.push(key.clone());
                self.records.insert(key, incoming);
            }
        }
    }

    fn unstage(&mut self, key: &str) {
        self.records.remove(key);
        self.order.retain(|p| p != key);
    }

    fn exists_key(&self, key: &str) -> bool {
        match self.records.get(key) {
            Some(pending) => pending.content().is_some(),
            None if self.deleted_by_ancestor(key) => false,
            None => {
                let has_staged_children = self.records.iter().any(|(staged, pending)| {
                    pending.content().is_some() && strip_dir_prefix(staged, key).is_some()
                });
                has_staged_children || self.root.join(key).exists()
            }
        }
    }

    /// True if `key` itself or one of its ancestors is staged for deletion.
    fn is_gone(&self, key: &str) -> bool {
        matches!(self.records.get(key), Some(Pending::Delete)) || self.deleted_by_ancestor(key)
    }

    fn deleted_by_ancestor(&self, key: &str) -> bool {
        let mut current = key;
        while let Some((parent, _)) = current.rsplit_once('/') {
            if matches!(self.records.get(parent), Some(Pending::Delete)) {
                return true;
            }
            current = parent;
        }
        false
    }
}

fn join_key(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Returns the remainder of `path` below `dir`, if `path` lies strictly inside it.
fn strip_dir_prefix<'a>(path: &'a str, dir: &str) -> Option<&'a str> {
    if dir.is_empty() {
        return Some(path);
    }
    path.strip_prefix(dir)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|rest| !rest.is_empty())
}

// MARK: --- UNIT TESTS ---
