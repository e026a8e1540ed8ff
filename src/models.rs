// src/models.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// --- STAGED TREE MODELS ---

/// The net kind of a pending file operation, as printed and flushed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        };
        f.write_str(label)
    }
}

/// One entry of a tree's change list. `content` is `None` only for deletions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Root-relative and `/`-separated.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub content: Option<Vec<u8>>,
}

// --- GENERATOR SCHEMA MODELS ---
// These mirror the JSON schema files shipped next to each generator.

/// The declared type of a schema property. Unknown or missing types accept any value.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Boolean,
    Number,
    Integer,
    Array,
    #[default]
    #[serde(other)]
    Any,
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Array => "array",
            Self::Any => "any",
        };
        f.write_str(label)
    }
}

/// `x-prompt` accepts either a bare message or an object with a message and a widget type.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum PromptSpec {
    Message(String),
    Detailed {
        message: String,
        #[serde(rename = "type", default)]
        kind: Option<String>,
    },
}

impl PromptSpec {
    /// The question shown to the user.
    pub fn message(&self) -> &str {
        match self {
            Self::Message(message) | Self::Detailed { message, .. } => message,
        }
    }
}

/// `$default: { "$source": "argv", "index": 0 }` fills a property from a positional argument.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DynamicDefault {
    #[serde(rename = "$source")]
    pub source: String,
    #[serde(default)]
    pub index: Option<usize>,
}

/// One entry of a schema's `properties`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SchemaProperty {
    #[serde(rename = "type", default)]
    pub kind: PropertyType,
    /// The static default, used when neither the command line nor the workspace sets a value.
    #[serde(default)]
    pub default: Option<Value>,
    /// Property-level flag, equivalent to listing the name in the schema's `required`.
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    /// A short flag name, e.g. `d` for `-d`.
    #[serde(default)]
    pub alias: Option<String>,
    /// The values accepted, from the schema's `enum`.
    #[serde(rename = "enum", default)]
    pub allowed: Option<Vec<Value>>,
    #[serde(rename = "x-prompt", default)]
    pub prompt: Option<PromptSpec>,
    #[serde(rename = "$default", default)]
    pub dynamic_default: Option<DynamicDefault>,
}

impl SchemaProperty {
    /// Returns the positional index this property is filled from, if any.
    pub fn argv_index(&self) -> Option<usize> {
        self.dynamic_default
            .as_ref()
            .filter(|d| d.source == "argv")
            .and_then(|d| d.index)
    }
}

/// A generator's declared option schema.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Schema {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, SchemaProperty>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl Schema {
    /// A property is required when flagged on the property itself or listed at the top level.
    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
            || self.properties.get(name).is_some_and(|p| p.required)
    }
}

/// The fully merged, immutable options handed to a generator.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct ResolvedOptions(BTreeMap<String, Value>);

impl ResolvedOptions {
    /// The value of `name`, whatever its type.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// The value of `name` if it is a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// The value of `name` if it is a boolean.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.0.get(name).and_then(Value::as_bool)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for ResolvedOptions {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// --- COLLECTION MODELS ---

/// Where a generator's schema lives: inline in the manifest, or in a file next to it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum SchemaRef {
    Path(String),
    Inline(Schema),
}

/// A generator as declared in `collection.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GeneratorEntry {
    /// The name of the implementation registered for this generator.
    pub factory: String,
    pub schema: SchemaRef,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// The deserialized `collection.json` of a generator collection.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CollectionManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub generators: BTreeMap<String, GeneratorEntry>,
}

/// A generator resolved from its collection, ready to be invoked.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorDescriptor {
    pub collection: String,
    /// The canonical generator name, even when it was looked up by alias.
    pub name: String,
    pub schema: Schema,
    /// The implementation this generator is bound to inside its collection.
    pub entry_point: String,
    pub description: Option<String>,
}

// --- RUN-COMMANDS MODELS ---

fn default_true() -> bool {
    true
}

/// A command as written in a target: either a bare string or an object.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum CommandEntry {
    Simple(String),
    Detailed {
        command: String,
        #[serde(rename = "forwardAllArgs", default = "default_true")]
        forward_all_args: bool,
    },
}

/// A normalized command, after argument interpolation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub command: String,
    /// Whether unknown options are appended to the command as `--key=value` arguments.
    pub forward_all_args: bool,
}

impl From<&CommandEntry> for CommandSpec {
    fn from(entry: &CommandEntry) -> Self {
        match entry {
            CommandEntry::Simple(command) => Self {
                command: command.clone(),
                forward_all_args: true,
            },
            CommandEntry::Detailed {
                command,
                forward_all_args,
            } => Self {
                command: command.clone(),
                forward_all_args: *forward_all_args,
            },
        }
    }
}

/// The options of a run-commands target. Keys the runner does not know are kept in `extra`
/// and become interpolation arguments.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunCommandsOptions {
    /// A single command. Ignored when `commands` is not empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<CommandEntry>,
    /// Sets `FORCE_COLOR` on every child.
    #[serde(default)]
    pub color: bool,
    #[serde(default = "default_true")]
    pub parallel: bool,
    /// Output text that marks a parallel run as ready while its processes keep running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_when: Option<String>,
    /// Working directory, relative to the workspace root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Extra `--key=value` arguments, as a single string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<String>,
    /// Environment file, relative to the workspace root. Defaults to `.env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    /// Every other key, available to commands as `{args.<key>}`.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for RunCommandsOptions {
    fn default() -> Self {
        Self {
            command: None,
            commands: Vec::new(),
            color: false,
            parallel: true,
            ready_when: None,
            cwd: None,
            args: None,
            env_file: None,
            output_path: None,
            extra: BTreeMap::new(),
        }
    }
}

/// A single command that did not finish successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    pub command: String,
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exit_code {
            Some(code) => write!(f, "'{}' exited with status code {}", self.command, code),
            None => write!(f, "'{}' was terminated by a signal", self.command),
        }
    }
}

/// The result contract of a task run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskOutcome {
    pub success: bool,
    pub failures: Vec<CommandFailure>,
}

impl TaskOutcome {
    /// Every command succeeded, or the ready signal was seen.
    pub fn succeeded() -> Self {
        Self {
            success: true,
            failures: Vec::new(),
        }
    }

    /// A failed run with the commands that caused it.
    pub fn failed(failures: Vec<CommandFailure>) -> Self {
        Self {
            success: false,
            failures,
        }
    }
}
