// src/core/arg_parser.rs

use serde_json::Value;
use std::collections::BTreeMap;

/// Raw command-line arguments, classified into positionals and named flags.
/// Values are kept as strings (or `true`/`false` for bare flags); typing them is the job
/// of the option resolver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawArgs {
    /// Parameters that are not flags, in order.
    pub positional: Vec<String>,
    /// Flag values keyed by flag name.
    pub named: BTreeMap<String, Value>,
}

impl RawArgs {
    /// Parses raw parameters, converting kebab-case flag names to camelCase.
    ///
    /// # Logic:
    /// - `--key=value` and `--key value` set `key` to `value`.
    /// - `--key` with no value (end of input, or followed by another flag) sets `key` to `true`.
    /// - `--no-key` sets `key` to `false`.
    /// - `-k` behaves like `--k` (short aliases are resolved later against the schema).
    /// - Everything after a bare `--` is positional.
    /// - A flag given more than once collects its values into an array.
    pub fn parse(cli_params: &[String]) -> Self {
        Self::parse_with(cli_params, true, &[])
    }

    /// Like [`RawArgs::parse`], but the flags named in `boolean_flags` never take the next
    /// parameter as their value. `--flag=value` and `--no-flag` still apply to them.
    ///
    /// Names are matched after the camelCase conversion, so `--dry-run` matches `dryRun`.
    pub fn parse_with_flags(cli_params: &[String], boolean_flags: &[&str]) -> Self {
        Self::parse_with(cli_params, true, boolean_flags)
    }

    /// Like [`RawArgs::parse`], but keeps flag names exactly as written.
    pub fn parse_verbatim(cli_params: &[String]) -> Self {
        Self::parse_with(cli_params, false, &[])
    }

    fn parse_with(cli_params: &[String], camel_case: bool, boolean_flags: &[&str]) -> Self {
        let mut args = Self::default();
        let mut params_iter = cli_params.iter().map(String::as_str).peekable();

        while let Some(param) = params_iter.next() {
            if param == "--" {
                args.positional.extend(params_iter.by_ref().map(str::to_string));
                break;
            }

            let (name, is_long) = if let Some(name) = param.strip_prefix("--") {
                (name, true)
            } else if let Some(name) = param.strip_prefix('-').filter(|n| !n.is_empty()) {
                (name, false)
            } else {
                args.positional.push(param.to_string());
                continue;
            };

            let to_key = |name: &str| {
                if camel_case && is_long {
                    to_camel_case(name)
                } else {
                    name.to_string()
                }
            };

            let (key, value) = match name.split_once('=') {
                Some((name, value)) => (to_key(name), Value::String(value.to_string())),
                None => {
                    if is_long && let Some(negated) = name.strip_prefix("no-") {
                        (to_key(negated), Value::Bool(false))
                    } else {
                        let key = to_key(name);
                        let value = if boolean_flags.contains(&key.as_str()) {
                            None
                        } else {
                            params_iter.next_if(|next| !next.starts_with('-'))
                        };
                        match value {
                            Some(next) => (key, Value::String(next.to_string())),
                            None => (key, Value::Bool(true)),
                        }
                    }
                }
            };
            args.insert(key, value);
        }

        args
    }

    fn insert(&mut self, key: String, value: Value) {
        match self.named.remove(&key) {
            Some(Value::Array(mut values)) => {
                values.push(value);
                self.named.insert(key, Value::Array(values));
            }
            Some(previous) => {
                self.named.insert(key, Value::Array(vec![previous, value]));
            }
            None => {
                self.named.insert(key, value);
            }
        }
    }

    /// Removes the first of `names` that is present and interprets it as a boolean flag.
    /// Every listed spelling is removed.
    pub fn take_flag(&mut self, names: &[&str]) -> Option<bool> {
        let mut found = None;
        for name in names {
            if let Some(value) = self.named.remove(*name)
                && found.is_none()
            {
                found = Some(match value {
                    Value::Bool(b) => b,
                    Value::String(s) => !matches!(s.as_str(), "false" | "0" | "no"),
                    _ => true,
                });
            }
        }
        found
    }
}

/// Converts `kebab-case` to `camelCase`. Names without dashes are returned unchanged.
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '-' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

// MARK: --- UNIT TESTS ---
