// src/cli/handlers/generate.rs

use crate::{
    cli::handlers::commons,
    constants::BUILTIN_COLLECTION,
    core::{
        builtin,
        generate::{self, GenerateRequest},
        generator::GeneratorRegistry,
        options::TerminalPrompter,
    },
    models::GeneratorDescriptor,
};
use anyhow::Result;
use colored::*;
use std::path::Path;

/// The main handler for the `generate` command.
///
/// Arguments are free-form: the first positional names the generator, everything else is
/// resolved against its schema, so they are not declared to clap.
pub fn handle(args: Vec<String>, root: &Path) -> Result<()> {
    let workspace = commons::load_workspace(root)?;
    let mut registry = GeneratorRegistry::new();
    builtin::register(&mut registry)?;

    let default_collection = workspace.default_collection().unwrap_or(BUILTIN_COLLECTION);
    let request = GenerateRequest::parse(&args, Some(default_collection))?;

    if request.help {
        let descriptor =
            registry.read_generator(root, &workspace, &request.collection, &request.generator)?;
        print_generator_help(&descriptor);
        return Ok(());
    }

    let outcome = generate::generate(root, &request, &workspace, &registry, &TerminalPrompter)?;
    if outcome.changes.is_empty() {
        println!("{}", "No changes were made.".yellow());
    }
    Ok(())
}

/// Prints the options a generator accepts, as declared in its schema.
fn print_generator_help(descriptor: &GeneratorDescriptor) {
    println!(
        "\n--- {}:{} ---",
        descriptor.collection.cyan(),
        descriptor.name.yellow()
    );
    if let Some(description) = &descriptor.description {
        println!("  {}", description);
    }

    let schema = &descriptor.schema;
    if schema.properties.is_empty() {
        println!("\n  {}", "This generator takes no options.".dimmed());
        return;
    }

    println!("\n{}", "Options:".blue());
    for (name, property) in &schema.properties {
        let mut flag = format!("--{}", name);
        if let Some(alias) = &property.alias {
            flag.push_str(&format!(", -{}", alias));
        }
        let required = if schema.is_required(name) {
            " (required)".red().to_string()
        } else {
            String::new()
        };
        println!(
            "  {:<24} {:<8} {}{}",
            flag.green(),
            property.kind.to_string().dimmed(),
            property.description.as_deref().unwrap_or_default(),
            required
        );
    }
}
