// src/core/builtin.rs

//! The `stagecraft` collection bundled with the binary.
//!
//! It holds small, general generators that are useful in any workspace and double as
//! examples of the generator API: `file`, `remove`, `move` and `run-commands`.

use crate::{
    constants::{BUILTIN_COLLECTION, WORKSPACE_CONFIG_FILENAME},
    core::{
        collection::CollectionError,
        generator::{GeneratorRegistry, GeneratorResult, PostTask},
        tree::Tree,
    },
    models::{CollectionManifest, CommandEntry, ResolvedOptions, RunCommandsOptions},
};
use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;

const MANIFEST_JSON: &str = r#"{
  "name": "stagecraft",
  "generators": {
    "file": {
      "factory": "file",
      "description": "Create or overwrite a file.",
      "schema": {
        "properties": {
          "path": { "type": "string", "$default": { "$source": "argv", "index": 0 },
                    "x-prompt": "Which file should be written?" },
          "content": { "type": "string", "default": "", "alias": "c" }
        },
        "required": ["path"]
      }
    },
    "remove": {
      "factory": "remove",
      "aliases": ["rm"],
      "description": "Delete a file or a directory.",
      "schema": {
        "properties": {
          "path": { "type": "string", "$default": { "$source": "argv", "index": 0 } }
        },
        "required": ["path"]
      }
    },
    "move": {
      "factory": "move",
      "aliases": ["mv"],
      "description": "Move a file, or every file under a directory.",
      "schema": {
        "properties": {
          "from": { "type": "string", "$default": { "$source": "argv", "index": 0 } },
          "to": { "type": "string", "$default": { "$source": "argv", "index": 1 } }
        },
        "required": ["from", "to"]
      }
    },
    "run-commands": {
      "factory": "run-commands",
      "description": "Add a run-commands target to workspace.toml.",
      "schema": {
        "properties": {
          "project": { "type": "string", "$default": { "$source": "argv", "index": 0 } },
          "name": { "type": "string", "$default": { "$source": "argv", "index": 1 },
                    "x-prompt": "What should the target be called?" },
          "command": { "type": "string" },
          "commands": { "type": "array" },
          "readyWhen": { "type": "string" },
          "parallel": { "type": "boolean", "default": true },
          "cwd": { "type": "string" },
          "envFile": { "type": "string" }
        },
        "required": ["project", "name"]
      }
    }
  }
}"#;

/// Registers the bundled collection and its implementations.
pub fn register(registry: &mut GeneratorRegistry) -> GeneratorResult<()> {
    let manifest: CollectionManifest =
        serde_json::from_str(MANIFEST_JSON).map_err(|source| CollectionError::Json {
            path: format!("<{} collection>", BUILTIN_COLLECTION),
            source,
        })?;
    registry.register_collection(BUILTIN_COLLECTION, manifest, None);
    registry.register_fn(BUILTIN_COLLECTION, "file", write_file);
    registry.register_fn(BUILTIN_COLLECTION, "remove", remove_path);
    registry.register_fn(BUILTIN_COLLECTION, "move", move_path);
    registry.register_fn(BUILTIN_COLLECTION, "run-commands", add_run_commands_target);
    Ok(())
}

fn required_str<'a>(options: &'a ResolvedOptions, name: &str) -> Result<&'a str> {
    options
        .get_str(name)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| anyhow!("Option '{}' must be a non-empty string.", name))
}

// --- Generators ---

fn write_file(tree: &mut Tree, options: &ResolvedOptions) -> Result<Option<PostTask>> {
    let path = required_str(options, "path")?;
    let content = options.get_str("content").unwrap_or_default();
    tree.write(path, content)?;
    Ok(None)
}

fn remove_path(tree: &mut Tree, options: &ResolvedOptions) -> Result<Option<PostTask>> {
    let path = required_str(options, "path")?;
    if !tree.exists(path)? {
        bail!("Cannot remove '{}': it does not exist.", path);
    }
    tree.delete(path)?;
    Ok(None)
}

fn move_path(tree: &mut Tree, options: &ResolvedOptions) -> Result<Option<PostTask>> {
    let from = required_str(options, "from")?;
    let to = required_str(options, "to")?;

    if tree.is_file(from)? {
        tree.rename(from, to)?;
        return Ok(None);
    }

    let from_dir = from.trim_end_matches('/');
    let to_dir = to.trim_end_matches('/');
    if to_dir == from_dir || to_dir.starts_with(&format!("{}/", from_dir)) {
        bail!("Cannot move '{}' into itself.", from);
    }

    let files = tree.files_under(from_dir)?;
    if files.is_empty() {
        bail!("Cannot move '{}': no such file or directory.", from);
    }
    let prefix = crate::core::tree::normalize_path(from_dir)?;
    for file in &files {
        let relative = file
            .strip_prefix(&prefix)
            .map(|rest| rest.trim_start_matches('/'))
            .unwrap_or(file);
        tree.rename(file, &format!("{}/{}", to_dir, relative))?;
    }
    tree.delete(from_dir)?;
    Ok(None)
}

fn add_run_commands_target(tree: &mut Tree, options: &ResolvedOptions) -> Result<Option<PostTask>> {
    let project = required_str(options, "project")?;
    let name = required_str(options, "name")?;
    let key = format!("{}:{}", project, name);

    let commands: Vec<CommandEntry> = match options.get("commands") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|command| CommandEntry::Simple(command.to_string()))
            .collect(),
        _ => Vec::new(),
    };
    let command = options.get_str("command").map(str::to_string);
    if command.is_none() && commands.is_empty() {
        bail!("Target '{}' needs --command or --commands.", key);
    }

    let target = RunCommandsOptions {
        command,
        commands,
        parallel: options.get_bool("parallel").unwrap_or(true),
        ready_when: options.get_str("readyWhen").map(str::to_string),
        cwd: options.get_str("cwd").map(str::to_string),
        env_file: options.get_str("envFile").map(str::to_string),
        ..RunCommandsOptions::default()
    };

    let mut document: toml::Table = match tree.read_to_string(WORKSPACE_CONFIG_FILENAME)? {
        Some(content) => content
            .parse()
            .with_context(|| format!("Failed to parse {}", WORKSPACE_CONFIG_FILENAME))?,
        None => toml::Table::new(),
    };

    let targets = document
        .entry("targets")
        .or_insert_with(|| toml::Value::Table(toml::Table::new()))
        .as_table_mut()
        .ok_or_else(|| anyhow!("'targets' in {} is not a table.", WORKSPACE_CONFIG_FILENAME))?;
    if targets.contains_key(&key) {
        bail!("Target '{}' already exists.", key);
    }
    targets.insert(key.clone(), toml::Value::try_from(&target)?);

    tree.write(WORKSPACE_CONFIG_FILENAME, toml::to_string(&document)?)?;

    let post_task: PostTask = Box::new(move |_tree: &Tree| {
        println!("Run it with: stagecraft run {}", key);
        Ok(())
    });
    Ok(Some(post_task))
}

// MARK: --- UNIT TESTS ---
