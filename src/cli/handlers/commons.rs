// src/cli/handlers/commons.rs

// Shared helpers for the handlers.

use crate::core::workspace::WorkspaceConfig;
use anyhow::{Context, Result};
use std::path::Path;

/// Loads `workspace.toml` from the workspace root, with a hint on failure.
pub fn load_workspace(root: &Path) -> Result<WorkspaceConfig> {
    WorkspaceConfig::load(root)
        .with_context(|| format!("Failed to load the workspace at '{}'", root.display()))
}
