// src/system/env.rs

//! Environment layering for spawned commands.
//!
//! Children inherit the full parent environment. On top of it, two layers may be added:
//! variables loaded from an environment file (never overriding a variable the parent already
//! has) and `FORCE_COLOR` when colored output is requested.

use crate::constants::FORCE_COLOR_VAR;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading an environment file.
#[derive(Error, Debug)]
pub enum EnvFileError {
    #[error("Could not read environment file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid line {line} in environment file '{path}': {content}")]
    Syntax {
        path: String,
        line: usize,
        content: String,
    },
}

/// Reads a `KEY=VALUE` environment file. Blank lines and `#` comments are skipped, an
/// `export ` prefix is accepted, quoted values are unquoted and a trailing ` # comment` is
/// dropped.
pub fn load_env_file(path: &Path) -> Result<BTreeMap<String, String>, EnvFileError> {
    let content = fs::read_to_string(path).map_err(|source| EnvFileError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_env(&content).map_err(|(line, content)| EnvFileError::Syntax {
        path: path.display().to_string(),
        line,
        content,
    })
}

fn parse_env(content: &str) -> Result<BTreeMap<String, String>, (usize, String)> {
    let mut vars = BTreeMap::new();
    for (number, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let invalid = || (number + 1, raw_line.to_string());

        let (key, value) = line.split_once('=').ok_or_else(invalid)?;
        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            return Err(invalid());
        }

        let value = value.trim();
        let value = if value.starts_with('"') || value.starts_with('\'') {
            let parts = shlex::split(value).ok_or_else(invalid)?;
            let mut parts = parts.into_iter();
            let unquoted = parts.next().unwrap_or_default();
            // Only a comment may follow the closing quote.
            if parts.next().is_some_and(|rest| !rest.starts_with('#')) {
                return Err(invalid());
            }
            unquoted
        } else {
            strip_inline_comment(value).to_string()
        };
        vars.insert(key.to_string(), value);
    }
    Ok(vars)
}

/// Cuts a ` # comment` off an unquoted value. A `#` inside a word is kept.
fn strip_inline_comment(value: &str) -> &str {
    let mut previous = None;
    for (index, c) in value.char_indices() {
        if c == '#' && previous.is_some_and(char::is_whitespace) {
            return value.get(..index).unwrap_or(value).trim_end();
        }
        previous = Some(c);
    }
    value
}

/// Computes the variables to set on a child on top of the inherited environment.
///
/// File variables the parent already defines are dropped, so the parent always wins.
pub fn child_env_overlay(
    file_vars: &BTreeMap<String, String>,
    parent_keys: &HashSet<String>,
    color: bool,
) -> BTreeMap<String, String> {
    let mut overlay: BTreeMap<String, String> = file_vars
        .iter()
        .filter(|(key, _)| !parent_keys.contains(*key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    if color {
        overlay.insert(FORCE_COLOR_VAR.to_string(), "true".to_string());
    }
    overlay
}

/// The names of every variable in the current process environment.
pub fn parent_env_keys() -> HashSet<String> {
    std::env::vars_os()
        .map(|(key, _)| key.to_string_lossy().into_owned())
        .collect()
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_env_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        fs::write(
            &path,
            "# comment\n\nSHARED_VAR=shared-nested-value\nexport QUOTED=\"a b c\"\nSINGLE='x y'\nEMPTY=\n",
        )
        .unwrap();

        let vars = load_env_file(&path).unwrap();
        assert_eq!(vars.get("SHARED_VAR").map(String::as_str), Some("shared-nested-value"));
        assert_eq!(vars.get("QUOTED").map(String::as_str), Some("a b c"));
        assert_eq!(vars.get("SINGLE").map(String::as_str), Some("x y"));
        assert_eq!(vars.get("EMPTY").map(String::as_str), Some(""));
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        assert_eq!(parse_env("NOT A VAR").unwrap_err().0, 1);
        assert!(parse_env("A=\"unterminated").is_err());
        assert!(parse_env("A=\"quoted\" trailing").is_err());
    }

    #[test]
    fn test_parse_env_strips_inline_comments() {
        let vars = parse_env(
            "PORT=4200 # dev server\nHASH=a#b\nQUOTED=\"a # b\" # note\nTABBED=x\t# tab\n",
        )
        .unwrap();
        assert_eq!(vars.get("PORT").map(String::as_str), Some("4200"));
        assert_eq!(vars.get("HASH").map(String::as_str), Some("a#b"));
        assert_eq!(vars.get("QUOTED").map(String::as_str), Some("a # b"));
        assert_eq!(vars.get("TABBED").map(String::as_str), Some("x"));
    }

    #[test]
    fn test_missing_env_file_is_io_error() {
        let result = load_env_file(Path::new("/no/such/dir/.env"));
        assert!(matches!(result, Err(EnvFileError::Io { .. })));
    }

    #[test]
    fn test_overlay_never_overrides_parent() {
        let mut file_vars = BTreeMap::new();
        file_vars.insert("VAR".to_string(), "file-value".to_string());
        file_vars.insert("FILE_ONLY".to_string(), "only".to_string());
        let parent: HashSet<String> = ["VAR".to_string()].into_iter().collect();

        let overlay = child_env_overlay(&file_vars, &parent, false);
        assert!(!overlay.contains_key("VAR"));
        assert_eq!(overlay.get("FILE_ONLY").map(String::as_str), Some("only"));
        assert!(!overlay.contains_key(FORCE_COLOR_VAR));
    }

    #[test]
    fn test_overlay_forces_color() {
        let overlay = child_env_overlay(&BTreeMap::new(), &HashSet::new(), true);
        assert_eq!(overlay.get(FORCE_COLOR_VAR).map(String::as_str), Some("true"));
    }
}
