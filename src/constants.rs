// src/constants.rs

/// The name of the workspace configuration file, looked up at the workspace root.
pub const WORKSPACE_CONFIG_FILENAME: &str = "workspace.toml";

/// The environment file loaded by the task runner when no `envFile` is configured.
pub const DEFAULT_ENV_FILENAME: &str = ".env";

/// The variable layered on top of a child's environment when `color` is requested.
pub const FORCE_COLOR_VAR: &str = "FORCE_COLOR";

/// The name of the collection bundled with the binary.
pub const BUILTIN_COLLECTION: &str = "stagecraft";
