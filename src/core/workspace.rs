// src/core/workspace.rs

//! # Workspace Configuration
//!
//! Loads `workspace.toml` from the workspace root. Only the parts this crate consumes are
//! modelled: the default collection, where collections live, per-generator option defaults,
//! and run-commands targets.

use crate::{constants::WORKSPACE_CONFIG_FILENAME, models::RunCommandsOptions};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading `workspace.toml`.
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Could not read workspace configuration '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid workspace configuration '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// The `[cli]` table.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct CliConfig {
    /// Used when a generator is named without its collection.
    #[serde(default)]
    pub default_collection: Option<String>,
}

/// The deserialized structure of a `workspace.toml` file.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub cli: CliConfig,
    /// Collection name to the path of its `collection.json`, relative to the root.
    #[serde(default)]
    pub collections: BTreeMap<String, String>,
    /// Either `generators.<collection>.<generator>` or `generators."<collection>:<generator>"`.
    #[serde(default)]
    pub generators: BTreeMap<String, Value>,
    /// Run-commands options keyed by `project:target`.
    #[serde(default)]
    pub targets: BTreeMap<String, RunCommandsOptions>,
}

impl WorkspaceConfig {
    /// Loads the configuration of the workspace at `root`.
    /// A workspace without a configuration file gets the default configuration.
    pub fn load(root: &Path) -> WorkspaceResult<Self> {
        let path = root.join(WORKSPACE_CONFIG_FILENAME);
        if !path.is_file() {
            log::debug!(
                "No '{}' found in '{}', using defaults.",
                WORKSPACE_CONFIG_FILENAME,
                root.display()
            );
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path).map_err(|source| WorkspaceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content).map_err(|source| WorkspaceError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Parses the content of a `workspace.toml`.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn default_collection(&self) -> Option<&str> {
        self.cli.default_collection.as_deref()
    }

    /// Resolves where the manifest of `collection` lives, if the workspace declares it.
    pub fn collection_manifest(&self, root: &Path, collection: &str) -> Option<PathBuf> {
        self.collections.get(collection).map(|p| root.join(p))
    }

    /// Workspace-level option defaults for one generator. The flat `"collection:name"` form
    /// wins over the nested form.
    pub fn generator_defaults(&self, collection: &str, generator: &str) -> Map<String, Value> {
        let mut defaults = Map::new();
        let nested = self
            .generators
            .get(collection)
            .and_then(|c| c.get(generator))
            .and_then(Value::as_object);
        let flat = self
            .generators
            .get(&format!("{}:{}", collection, generator))
            .and_then(Value::as_object);

        for layer in [nested, flat].into_iter().flatten() {
            for (key, value) in layer {
                defaults.insert(key.clone(), value.clone());
            }
        }
        defaults
    }

    /// Looks up a run-commands target by its `project:target` name.
    pub fn target(&self, name: &str) -> Option<&RunCommandsOptions> {
        self.targets.get(name)
    }
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CommandEntry;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[cli]
default_collection = "@acme/tools"

[collections]
"@acme/tools" = "tools/collection.json"

[generators."@acme/tools".library]
directory = "libs"
style = "css"

[generators."@acme/tools:library"]
style = "scss"

[targets."app:serve"]
commands = ["npm start", { command = "npm run api", forwardAllArgs = false }]
parallel = true
readyWhen = "listening"
port = 4200
"#;

    #[test]
    fn test_parse_full_configuration() {
        let config = WorkspaceConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.default_collection(), Some("@acme/tools"));
        assert_eq!(
            config.collection_manifest(Path::new("/ws"), "@acme/tools"),
            Some(PathBuf::from("/ws/tools/collection.json"))
        );
    }

    #[test]
    fn test_generator_defaults_flat_form_wins() {
        let config = WorkspaceConfig::parse(SAMPLE).unwrap();
        let defaults = config.generator_defaults("@acme/tools", "library");
        assert_eq!(defaults.get("directory"), Some(&Value::from("libs")));
        assert_eq!(defaults.get("style"), Some(&Value::from("scss")));
        assert!(config.generator_defaults("@acme/tools", "app").is_empty());
    }

    #[test]
    fn test_target_options_keep_unknown_keys() {
        let config = WorkspaceConfig::parse(SAMPLE).unwrap();
        let target = config.target("app:serve").unwrap();
        assert_eq!(target.ready_when.as_deref(), Some("listening"));
        assert_eq!(
            target.commands[1],
            CommandEntry::Detailed {
                command: "npm run api".to_string(),
                forward_all_args: false
            }
        );
        assert_eq!(target.extra.get("port"), Some(&Value::from(4200)));
    }

    #[test]
    fn test_load_missing_file_yields_default() {
        let dir = TempDir::new().unwrap();
        let config = WorkspaceConfig::load(dir.path()).unwrap();
        assert_eq!(config, WorkspaceConfig::default());
    }

    #[test]
    fn test_load_invalid_file_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(WORKSPACE_CONFIG_FILENAME), "[cli\n").unwrap();
        assert!(matches!(
            WorkspaceConfig::load(dir.path()),
            Err(WorkspaceError::Parse { .. })
        ));
    }
}
