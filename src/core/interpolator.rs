// src/core/interpolator.rs

use crate::core::task_executor::{TaskError, TaskResult};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::BTreeMap;

lazy_static! {
    static ref ARGS_PLACEHOLDER_RE: Regex = Regex::new(r"\{args\.([^}]+)\}").unwrap();
}

/// Parses an explicit `args` string of space-separated `--key=value` tokens.
pub fn parse_args_string(args: &str) -> TaskResult<BTreeMap<String, String>> {
    let mut parsed = BTreeMap::new();
    for token in args.split(' ').map(str::trim).filter(|t| !t.is_empty()) {
        let (key, value) = token
            .strip_prefix("--")
            .and_then(|rest| rest.split_once('='))
            .filter(|(key, value)| !key.is_empty() && !value.is_empty())
            .ok_or_else(|| TaskError::InvalidArgsSyntax(args.to_string()))?;
        parsed.insert(key.to_string(), value.to_string());
    }
    Ok(parsed)
}

/// Turns the options the runner does not recognize into interpolation arguments.
pub fn unknown_options_as_args(extra: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
    extra
        .iter()
        .map(|(key, value)| (key.clone(), value_to_arg(value)))
        .collect()
}

fn value_to_arg(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(value_to_arg).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

/// Rewrites a command with its interpolation arguments.
///
/// - Commands with `{args.NAME}` placeholders get each placeholder substituted; unknown
///   names become empty.
/// - Otherwise, when `forward_all_args` is set, every argument is appended as `--name=value`.
/// - Otherwise the command is returned unchanged.
pub fn transform_command(
    command: &str,
    args: &BTreeMap<String, String>,
    forward_all_args: bool,
) -> String {
    if command.contains("{args.") {
        ARGS_PLACEHOLDER_RE
            .replace_all(command, |caps: &Captures<'_>| {
                caps.get(1)
                    .and_then(|name| args.get(name.as_str()))
                    .cloned()
                    .unwrap_or_default()
            })
            .into_owned()
    } else if !args.is_empty() && forward_all_args {
        let forwarded = args
            .iter()
            .map(|(key, value)| format!("--{}={}", key, value))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{} {}", command, forwarded)
    } else {
        command.to_string()
    }
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_placeholder_substitution() {
        let result = transform_command("echo {args.var1}", &args(&[("var1", "x")]), true);
        assert_eq!(result, "echo x");
    }

    #[test]
    fn test_missing_placeholder_becomes_empty() {
        let result = transform_command(
            "echo '{args.a}-{args.missing}'",
            &args(&[("a", "1"), ("b", "2")]),
            true,
        );
        assert_eq!(result, "echo '1-'");
    }

    #[test]
    fn test_forward_all_args_appends_flags() {
        let result = transform_command("npm start", &args(&[("port", "4200"), ("host", "h")]), true);
        assert_eq!(result, "npm start --host=h --port=4200");
    }

    #[test]
    fn test_no_forwarding_leaves_command_unchanged() {
        assert_eq!(
            transform_command("npm start", &args(&[("port", "1")]), false),
            "npm start"
        );
        assert_eq!(transform_command("npm start", &args(&[]), true), "npm start");
    }

    #[test]
    fn test_parse_args_string() {
        let parsed = parse_args_string("--var1=x  --url=http://h?a=b").unwrap();
        assert_eq!(parsed.get("var1").map(String::as_str), Some("x"));
        assert_eq!(parsed.get("url").map(String::as_str), Some("http://h?a=b"));
    }

    #[test]
    fn test_parse_args_string_rejects_bad_tokens() {
        assert!(matches!(
            parse_args_string("var1=x"),
            Err(TaskError::InvalidArgsSyntax(_))
        ));
        assert!(matches!(
            parse_args_string("--flag"),
            Err(TaskError::InvalidArgsSyntax(_))
        ));
        assert!(matches!(
            parse_args_string("--key="),
            Err(TaskError::InvalidArgsSyntax(_))
        ));
    }

    #[test]
    fn test_unknown_options_are_stringified() {
        let mut extra = BTreeMap::new();
        extra.insert("port".to_string(), Value::from(4200));
        extra.insert("watch".to_string(), Value::Bool(true));
        extra.insert("name".to_string(), Value::from("app"));
        let converted = unknown_options_as_args(&extra);
        assert_eq!(converted, args(&[("name", "app"), ("port", "4200"), ("watch", "true")]));
    }
}
