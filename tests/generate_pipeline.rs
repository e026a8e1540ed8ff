// tests/generate_pipeline.rs

use serde_json::Value;
use stagecraft::core::{
    builtin,
    generate::{GenerateRequest, generate},
    generator::{GeneratorError, GeneratorRegistry, PostTask},
    options::{OptionsError, OptionsResult, PromptRequest, Prompter},
    tree::Tree,
    workspace::WorkspaceConfig,
};
use stagecraft::models::{ChangeKind, CollectionManifest, GeneratorEntry, ResolvedOptions, Schema, SchemaRef};
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;

/// Fails on every prompt, like a terminal that is not interactive.
struct NoPrompter;

impl Prompter for NoPrompter {
    fn prompt(&self, request: &PromptRequest) -> OptionsResult<Value> {
        Err(OptionsError::Prompt {
            property: request.property.clone(),
            message: "no terminal".to_string(),
        })
    }
}

fn to_cli_params(params: &[&str]) -> Vec<String> {
    params.iter().map(|s| s.to_string()).collect()
}

fn builtin_registry() -> GeneratorRegistry {
    let mut registry = GeneratorRegistry::new();
    builtin::register(&mut registry).unwrap();
    registry
}

#[test]
fn test_dry_run_lists_changes_without_touching_disk() {
    // --- Setup ---
    let dir = TempDir::new().unwrap();
    let registry = builtin_registry();
    let request = GenerateRequest::parse(
        &to_cli_params(&["stagecraft:file", "docs/intro.md", "--content=hello", "--dry-run"]),
        None,
    )
    .unwrap();

    // --- Execute ---
    let outcome = generate(
        dir.path(),
        &request,
        &WorkspaceConfig::default(),
        &registry,
        &NoPrompter,
    )
    .unwrap();

    // --- Assert ---
    assert!(outcome.dry_run);
    assert_eq!(outcome.changes.len(), 1);
    assert_eq!(outcome.changes[0].path, "docs/intro.md");
    assert_eq!(outcome.changes[0].kind, ChangeKind::Create);
    assert!(!dir.path().join("docs").exists());
}

#[test]
fn test_generate_flushes_changes() {
    // --- Setup ---
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("old.txt"), "bye").unwrap();
    let registry = builtin_registry();

    // --- Execute ---
    for params in [
        &["file", "docs/intro.md", "--content", "hello"][..],
        &["rm", "old.txt"][..],
    ] {
        let request =
            GenerateRequest::parse(&to_cli_params(params), Some("stagecraft")).unwrap();
        generate(
            dir.path(),
            &request,
            &WorkspaceConfig::default(),
            &registry,
            &NoPrompter,
        )
        .unwrap();
    }

    // --- Assert ---
    assert_eq!(
        fs::read_to_string(dir.path().join("docs/intro.md")).unwrap(),
        "hello"
    );
    assert!(!dir.path().join("old.txt").exists());
}

#[test]
fn test_missing_required_option_without_prompting() {
    let dir = TempDir::new().unwrap();
    let registry = builtin_registry();
    let request =
        GenerateRequest::parse(&to_cli_params(&["stagecraft:file", "--no-interactive"]), None)
            .unwrap();

    let result = generate(
        dir.path(),
        &request,
        &WorkspaceConfig::default(),
        &registry,
        &NoPrompter,
    );

    assert!(matches!(
        result,
        Err(GeneratorError::Options(OptionsError::MissingRequiredOption { .. }))
    ));
}

fn custom_registry(post_task_ran: Arc<AtomicBool>, fail: bool) -> GeneratorRegistry {
    let mut manifest = CollectionManifest::default();
    manifest.generators.insert(
        "app".to_string(),
        GeneratorEntry {
            factory: "app".to_string(),
            schema: SchemaRef::Inline(Schema::default()),
            aliases: Vec::new(),
            description: None,
        },
    );
    let mut registry = GeneratorRegistry::new();
    registry.register_collection("@acme/tools", manifest, None);
    registry.register_fn(
        "@acme/tools",
        "app",
        move |tree: &mut Tree, _options: &ResolvedOptions| {
            tree.write("apps/web/main.rs", "fn main() {}")?;
            if fail {
                anyhow::bail!("Project 'web' already exists");
            }
            let flag = post_task_ran.clone();
            let task: PostTask = Box::new(move |tree: &Tree| {
                assert!(tree.root().join("apps/web/main.rs").is_file());
                flag.store(true, Ordering::SeqCst);
                Ok(())
            });
            Ok(Some(task))
        },
    );
    registry
}

#[test]
fn test_post_task_runs_only_after_flush() {
    // --- Setup ---
    let dir = TempDir::new().unwrap();
    let ran = Arc::new(AtomicBool::new(false));
    let registry = custom_registry(ran.clone(), false);

    // --- Execute: dry run first, then for real ---
    let dry = GenerateRequest::parse(&to_cli_params(&["@acme/tools:app", "-d"]), None).unwrap();
    generate(dir.path(), &dry, &WorkspaceConfig::default(), &registry, &NoPrompter).unwrap();
    let ran_after_dry_run = ran.load(Ordering::SeqCst);

    let real = GenerateRequest::parse(&to_cli_params(&["@acme/tools:app"]), None).unwrap();
    generate(dir.path(), &real, &WorkspaceConfig::default(), &registry, &NoPrompter).unwrap();

    // --- Assert ---
    assert!(!ran_after_dry_run);
    assert!(ran.load(Ordering::SeqCst));
}

#[test]
fn test_failing_generator_writes_nothing() {
    // --- Setup ---
    let dir = TempDir::new().unwrap();
    let registry = custom_registry(Arc::new(AtomicBool::new(false)), true);
    let request = GenerateRequest::parse(&to_cli_params(&["@acme/tools:app"]), None).unwrap();

    // --- Execute ---
    let err = generate(dir.path(), &request, &WorkspaceConfig::default(), &registry, &NoPrompter)
        .err()
        .unwrap();

    // --- Assert ---
    assert_eq!(err.to_string(), "Project 'web' already exists");
    assert!(!dir.path().join("apps").exists());
}

#[test]
fn test_workspace_defaults_and_collection_manifest_on_disk() {
    // --- Setup ---
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("tools/library")).unwrap();
    fs::write(
        root.join("tools/collection.json"),
        r#"{ "generators": { "library": { "factory": "library", "schema": "./library/schema.json" } } }"#,
    )
    .unwrap();
    fs::write(
        root.join("tools/library/schema.json"),
        r#"{ "properties": {
              "name": { "type": "string", "$default": { "$source": "argv", "index": 0 } },
              "directory": { "type": "string", "default": "packages" }
           }, "required": ["name"] }"#,
    )
    .unwrap();
    fs::write(
        root.join("workspace.toml"),
        "[cli]\ndefault_collection = \"@acme/tools\"\n\n[collections]\n\"@acme/tools\" = \"tools/collection.json\"\n\n[generators.\"@acme/tools:library\"]\ndirectory = \"libs\"\n",
    )
    .unwrap();
    let workspace = WorkspaceConfig::load(root).unwrap();

    let mut registry = GeneratorRegistry::new();
    registry.register_fn(
        "@acme/tools",
        "library",
        |tree: &mut Tree, options: &ResolvedOptions| {
            let path = format!(
                "{}/{}/Cargo.toml",
                options.get_str("directory").unwrap_or_default(),
                options.get_str("name").unwrap_or_default()
            );
            tree.write(&path, "[package]")?;
            Ok(None)
        },
    );

    // --- Execute ---
    let request = GenerateRequest::parse(
        &to_cli_params(&["library", "parser"]),
        workspace.default_collection(),
    )
    .unwrap();
    generate(root, &request, &workspace, &registry, &NoPrompter).unwrap();

    // --- Assert ---
    assert!(root.join("libs/parser/Cargo.toml").is_file());
}
