// src/core/options.rs

//! # Option Resolver
//!
//! Merges the raw invocation arguments, a generator's schema and the workspace-level defaults
//! into one immutable [`ResolvedOptions`].
//!
//! Precedence per schema property: explicit argument, then workspace default, then schema
//! default. Required properties still missing after that are either prompted for (through
//! an injected [`Prompter`]) or reported as [`OptionsError::MissingRequiredOption`].

use crate::{
    core::{arg_parser::RawArgs, workspace::WorkspaceConfig},
    models::{PropertyType, ResolvedOptions, Schema, SchemaProperty},
};
use dialoguer::{Confirm, Input, Select, theme::ColorfulTheme};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while resolving a generator's options.
#[derive(Error, Debug)]
pub enum OptionsError {
    /// A required option has no value and could not be prompted for.
    #[error("Required property '{property}' is missing for generator '{generator}'.")]
    MissingRequiredOption { generator: String, property: String },
    /// A value could not be coerced to its declared type, or is outside its `enum`.
    #[error("Property '{property}' expects {expected}, but got {value}.")]
    InvalidOptionType {
        property: String,
        expected: String,
        value: String,
    },
    /// The interactive prompt failed.
    #[error("Could not read a value for '{property}': {message}")]
    Prompt { property: String, message: String },
}
pub type OptionsResult<T> = Result<T, OptionsError>;

// --- Prompting Capability ---

/// The widget used to ask for a value, chosen from the property type.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptKind {
    Text,
    Confirm,
    /// Pick one of the allowed values.
    Select(Vec<String>),
}

/// Everything needed to ask the user for one missing value.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRequest {
    pub property: String,
    pub message: String,
    pub kind: PromptKind,
}

impl PromptRequest {
    fn for_property(name: &str, property: &SchemaProperty) -> Self {
        let message = property
            .prompt
            .as_ref()
            .map(|p| p.message().to_string())
            .or_else(|| property.description.clone())
            .unwrap_or_else(|| format!("Value for '{}'", name));

        let kind = if let Some(allowed) = &property.allowed {
            PromptKind::Select(allowed.iter().map(value_to_plain_string).collect())
        } else if property.kind == PropertyType::Boolean {
            PromptKind::Confirm
        } else {
            PromptKind::Text
        };

        Self {
            property: name.to_string(),
            message,
            kind,
        }
    }
}

/// Asks the user for a value. Implementations block until an answer is available.
pub trait Prompter {
    fn prompt(&self, request: &PromptRequest) -> OptionsResult<Value>;
}

/// Prompts on the terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn prompt(&self, request: &PromptRequest) -> OptionsResult<Value> {
        let theme = ColorfulTheme::default();
        let to_error = |e: dialoguer::Error| OptionsError::Prompt {
            property: request.property.clone(),
            message: e.to_string(),
        };

        match &request.kind {
            PromptKind::Text => Input::<String>::with_theme(&theme)
                .with_prompt(&request.message)
                .interact_text()
                .map(Value::String)
                .map_err(to_error),
            PromptKind::Confirm => Confirm::with_theme(&theme)
                .with_prompt(&request.message)
                .interact()
                .map(Value::Bool)
                .map_err(to_error),
            PromptKind::Select(items) => {
                let selection = Select::with_theme(&theme)
                    .with_prompt(&request.message)
                    .items(items)
                    .default(0)
                    .interact()
                    .map_err(to_error)?;
                items
                    .get(selection)
                    .cloned()
                    .map(Value::String)
                    .ok_or_else(|| OptionsError::Prompt {
                        property: request.property.clone(),
                        message: "selection out of range".to_string(),
                    })
            }
        }
    }
}

// --- Resolution ---

/// Combines raw arguments, workspace defaults and schema defaults into the final options.
///
/// Arguments not declared in the schema are passed through unchanged.
pub fn combine_options(
    raw: &RawArgs,
    collection: &str,
    generator: &str,
    workspace: Option<&WorkspaceConfig>,
    schema: &Schema,
    interactive: bool,
    prompter: &dyn Prompter,
) -> OptionsResult<ResolvedOptions> {
    let mut explicit = expand_aliases(&raw.named, schema);
    for (name, property) in &schema.properties {
        if explicit.contains_key(name) {
            continue;
        }
        if let Some(value) = property
            .argv_index()
            .and_then(|index| raw.positional.get(index))
        {
            explicit.insert(name.clone(), Value::String(value.clone()));
        }
    }

    let workspace_defaults = workspace
        .map(|ws| ws.generator_defaults(collection, generator))
        .unwrap_or_default();

    let mut resolved = Map::new();
    for (name, property) in &schema.properties {
        let candidate = explicit
            .remove(name)
            .or_else(|| workspace_defaults.get(name).cloned())
            .or_else(|| property.default.clone());

        let value = match candidate {
            Some(value) => value,
            None if schema.is_required(name) => {
                if !interactive {
                    return Err(OptionsError::MissingRequiredOption {
                        generator: format!("{}:{}", collection, generator),
                        property: name.clone(),
                    });
                }
                log::debug!("Prompting for required property '{}'.", name);
                prompter.prompt(&PromptRequest::for_property(name, property))?
            }
            None => continue,
        };

        resolved.insert(name.clone(), coerce(name, property, value)?);
    }

    // Whatever is left was not declared by the schema.
    for (name, value) in explicit {
        log::debug!("Passing through undeclared option '{}'.", name);
        resolved.insert(name, value);
    }

    log::debug!("Resolved {} option(s) for {}:{}.", resolved.len(), collection, generator);
    Ok(resolved.into_iter().collect())
}

/// Renames short aliases (e.g. `-d`) to the property they stand for. A full name given
/// alongside its alias wins.
fn expand_aliases(named: &BTreeMap<String, Value>, schema: &Schema) -> Map<String, Value> {
    let mut expanded: Map<String, Value> = Map::new();
    for (key, value) in named {
        let target = if schema.properties.contains_key(key) {
            None
        } else {
            schema
                .properties
                .iter()
                .find(|(_, property)| property.alias.as_deref() == Some(key.as_str()))
                .map(|(name, _)| name.clone())
        };

        match target {
            Some(name) if !named.contains_key(&name) => {
                expanded.insert(name, value.clone());
            }
            Some(_) => {}
            None => {
                expanded.insert(key.clone(), value.clone());
            }
        }
    }
    expanded
}

/// Converts `value` into the property's declared type.
pub fn coerce(name: &str, property: &SchemaProperty, value: Value) -> OptionsResult<Value> {
    let invalid = |value: &Value| OptionsError::InvalidOptionType {
        property: name.to_string(),
        expected: property.kind.to_string(),
        value: value.to_string(),
    };

    let coerced = match property.kind {
        PropertyType::Any => value,
        PropertyType::String => match value {
            Value::String(_) => value,
            Value::Number(n) => Value::String(n.to_string()),
            Value::Bool(b) => Value::String(b.to_string()),
            other => return Err(invalid(&other)),
        },
        PropertyType::Boolean => match value {
            Value::Bool(_) => value,
            Value::String(ref s) if s == "true" => Value::Bool(true),
            Value::String(ref s) if s == "false" => Value::Bool(false),
            other => return Err(invalid(&other)),
        },
        PropertyType::Number => match value {
            Value::Number(_) => value,
            Value::String(ref s) => match s.trim().parse::<f64>().ok().and_then(Number::from_f64) {
                Some(n) => Value::Number(n),
                None => return Err(invalid(&value)),
            },
            other => return Err(invalid(&other)),
        },
        PropertyType::Integer => match value {
            Value::Number(ref n) if n.is_i64() || n.is_u64() => value,
            Value::String(ref s) => match s.trim().parse::<i64>() {
                Ok(n) => Value::from(n),
                Err(_) => return Err(invalid(&value)),
            },
            other => return Err(invalid(&other)),
        },
        PropertyType::Array => match value {
            Value::Array(_) => value,
            Value::String(s) => Value::Array(
                s.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(|item| Value::String(item.to_string()))
                    .collect(),
            ),
            Value::Null => return Err(invalid(&Value::Null)),
            Value::Object(_) => return Err(invalid(&value)),
            scalar => Value::Array(vec![scalar]),
        },
    };

    if let Some(allowed) = &property.allowed
        && !allowed.contains(&coerced)
    {
        return Err(OptionsError::InvalidOptionType {
            property: name.to_string(),
            expected: format!(
                "one of [{}]",
                allowed.iter().map(value_to_plain_string).collect::<Vec<_>>().join(", ")
            ),
            value: coerced.to_string(),
        });
    }

    Ok(coerced)
}

fn value_to_plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Answers prompts from a fixed list and records what was asked.
    struct ScriptedPrompter {
        answers: RefCell<Vec<Value>>,
        asked: RefCell<Vec<PromptRequest>>,
    }

    impl ScriptedPrompter {
        fn new(answers: Vec<Value>) -> Self {
            Self {
                answers: RefCell::new(answers),
                asked: RefCell::new(Vec::new()),
            }
        }
    }

    impl Prompter for ScriptedPrompter {
        fn prompt(&self, request: &PromptRequest) -> OptionsResult<Value> {
            self.asked.borrow_mut().push(request.clone());
            let mut answers = self.answers.borrow_mut();
            if answers.is_empty() {
                return Err(OptionsError::Prompt {
                    property: request.property.clone(),
                    message: "no scripted answer".to_string(),
                });
            }
            Ok(answers.remove(0))
        }
    }

    fn schema() -> Schema {
        serde_json::from_value(serde_json::json!({
            "properties": {
                "name": {
                    "type": "string",
                    "x-prompt": "What name would you like to use?",
                    "$default": { "$source": "argv", "index": 0 }
                },
                "directory": { "type": "string", "alias": "dir" },
                "skipFormat": { "type": "boolean", "default": false },
                "port": { "type": "integer" },
                "tags": { "type": "array" },
                "style": { "type": "string", "default": "css", "enum": ["css", "scss"] }
            },
            "required": ["name"]
        }))
        .unwrap()
    }

    fn raw(params: &[&str]) -> RawArgs {
        let params: Vec<String> = params.iter().map(|s| s.to_string()).collect();
        RawArgs::parse(&params)
    }

    fn no_prompts() -> ScriptedPrompter {
        ScriptedPrompter::new(Vec::new())
    }

    #[test]
    fn test_precedence_cli_over_workspace_over_schema() {
        // --- Setup ---
        let workspace = WorkspaceConfig::parse(
            r#"
[generators."@acme/tools".library]
style = "scss"
directory = "libs"
"#,
        )
        .unwrap();

        // --- Execute ---
        let options = combine_options(
            &raw(&["my-lib", "--directory", "packages"]),
            "@acme/tools",
            "library",
            Some(&workspace),
            &schema(),
            false,
            &no_prompts(),
        )
        .unwrap();

        // --- Assert ---
        assert_eq!(options.get_str("name"), Some("my-lib"));
        assert_eq!(options.get_str("directory"), Some("packages"));
        assert_eq!(options.get_str("style"), Some("scss"));
        assert_eq!(options.get_bool("skipFormat"), Some(false));
        assert!(!options.contains("port"));
    }

    #[test]
    fn test_missing_required_non_interactive_fails() {
        let result = combine_options(
            &raw(&[]),
            "@acme/tools",
            "library",
            None,
            &schema(),
            false,
            &no_prompts(),
        );
        match result {
            Err(OptionsError::MissingRequiredOption { property, .. }) => {
                assert_eq!(property, "name");
            }
            other => panic!("expected MissingRequiredOption, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_interactive_prompts() {
        let prompter = ScriptedPrompter::new(vec![Value::from("prompted-lib")]);
        let options = combine_options(
            &raw(&[]),
            "@acme/tools",
            "library",
            None,
            &schema(),
            true,
            &prompter,
        )
        .unwrap();

        assert_eq!(options.get_str("name"), Some("prompted-lib"));
        let asked = prompter.asked.borrow();
        assert_eq!(asked.len(), 1);
        assert_eq!(asked[0].message, "What name would you like to use?");
        assert_eq!(asked[0].kind, PromptKind::Text);
    }

    #[test]
    fn test_unknown_arguments_pass_through() {
        let options = combine_options(
            &raw(&["lib", "--experimental-flag", "--extra=value"]),
            "@acme/tools",
            "library",
            None,
            &schema(),
            false,
            &no_prompts(),
        )
        .unwrap();
        assert_eq!(options.get_bool("experimentalFlag"), Some(true));
        assert_eq!(options.get_str("extra"), Some("value"));
    }

    #[test]
    fn test_alias_and_coercion() {
        let options = combine_options(
            &raw(&["lib", "--dir", "x", "--port", "8080", "--tags", "a, b", "--skip-format", "true"]),
            "@acme/tools",
            "library",
            None,
            &schema(),
            false,
            &no_prompts(),
        )
        .unwrap();
        assert_eq!(options.get_str("directory"), Some("x"));
        assert!(!options.contains("dir"));
        assert_eq!(options.get("port"), Some(&Value::from(8080)));
        assert_eq!(
            options.get("tags"),
            Some(&Value::Array(vec!["a".into(), "b".into()]))
        );
        assert_eq!(options.get_bool("skipFormat"), Some(true));
    }

    #[test]
    fn test_invalid_type_fails() {
        let result = combine_options(
            &raw(&["lib", "--port", "eighty"]),
            "@acme/tools",
            "library",
            None,
            &schema(),
            false,
            &no_prompts(),
        );
        assert!(matches!(
            result,
            Err(OptionsError::InvalidOptionType { ref property, .. }) if property == "port"
        ));
    }

    #[test]
    fn test_value_outside_enum_fails() {
        let result = combine_options(
            &raw(&["lib", "--style", "less"]),
            "@acme/tools",
            "library",
            None,
            &schema(),
            false,
            &no_prompts(),
        );
        assert!(matches!(result, Err(OptionsError::InvalidOptionType { .. })));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let args = raw(&["lib", "--tags", "a,b"]);
        let run = || {
            combine_options(&args, "c", "g", None, &schema(), false, &no_prompts()).unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_empty_schema_without_arguments_resolves_nothing() {
        let schema: Schema = serde_json::from_value(serde_json::json!({})).unwrap();
        let options =
            combine_options(&raw(&[]), "c", "g", None, &schema, false, &no_prompts()).unwrap();
        assert!(options.is_empty());
        assert_eq!(options.len(), 0);
    }

    #[test]
    fn test_coerce_boolean_rejects_garbage() {
        let property = SchemaProperty {
            kind: PropertyType::Boolean,
            ..SchemaProperty::default()
        };
        assert!(coerce("flag", &property, Value::from("maybe")).is_err());
        assert_eq!(
            coerce("flag", &property, Value::from("false")).unwrap(),
            Value::Bool(false)
        );
    }
}
