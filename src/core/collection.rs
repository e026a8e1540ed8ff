// src/core/collection.rs

use crate::models::{CollectionManifest, GeneratorDescriptor, Schema, SchemaRef};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors raised while locating a collection or one of its generators.
#[derive(Error, Debug)]
pub enum CollectionError {
    /// The invocation does not name a generator.
    #[error("Specify the generator name (e.g., stagecraft generate my-collection:library)")]
    InvalidInvocation,
    /// The collection is neither bundled nor declared in the workspace.
    #[error("Unable to resolve collection '{0}'. Is it listed under [collections] in workspace.toml?")]
    UnknownCollection(String),
    /// The collection exists, but no generator or alias matches.
    #[error("Unable to resolve {collection}:{generator}. The collection has no such generator.")]
    UnknownGenerator {
        collection: String,
        generator: String,
    },
    /// A manifest or schema file could not be read.
    #[error("Could not read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// A manifest or schema file is not valid JSON for its shape.
    #[error("Invalid JSON in '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// A schema given as a path belongs to a collection with no directory to resolve it from.
    #[error("Schema '{schema}' of {collection}:{generator} is a path, but the collection has no directory.")]
    DetachedSchema {
        collection: String,
        generator: String,
        schema: String,
    },
    /// The manifest names an entry point nothing was registered for.
    #[error("No implementation is registered for '{entry_point}' in collection '{collection}'.")]
    MissingImplementation {
        collection: String,
        entry_point: String,
    },
}
pub type CollectionResult<T> = Result<T, CollectionError>;

/// Splits `collection:generator` on its last `:`. A bare generator name falls back to the
/// default collection.
pub fn parse_generator_name(
    spec: &str,
    default_collection: Option<&str>,
) -> CollectionResult<(String, String)> {
    let (collection, generator) = match spec.rfind(':') {
        Some(index) if index > 0 => {
            let (collection, rest) = spec.split_at(index);
            (Some(collection.to_string()), rest.trim_start_matches(':').to_string())
        }
        _ => (default_collection.map(str::to_string), spec.to_string()),
    };

    match collection {
        Some(collection) if !collection.is_empty() && !generator.is_empty() => {
            Ok((collection, generator))
        }
        _ => Err(CollectionError::InvalidInvocation),
    }
}

/// Reads a `collection.json` manifest.
pub fn load_manifest(path: &Path) -> CollectionResult<CollectionManifest> {
    read_json(path)
}

/// Builds the descriptor of `generator` (looked up by name or alias) from a collection manifest.
pub fn resolve_descriptor(
    collection: &str,
    manifest: &CollectionManifest,
    manifest_dir: Option<&Path>,
    generator: &str,
) -> CollectionResult<GeneratorDescriptor> {
    let (name, entry) = manifest
        .generators
        .get_key_value(generator)
        .or_else(|| {
            manifest
                .generators
                .iter()
                .find(|(_, entry)| entry.aliases.iter().any(|a| a == generator))
        })
        .ok_or_else(|| CollectionError::UnknownGenerator {
            collection: collection.to_string(),
            generator: generator.to_string(),
        })?;

    let schema: Schema = match &entry.schema {
        SchemaRef::Inline(schema) => schema.clone(),
        SchemaRef::Path(relative) => {
            let dir = manifest_dir.ok_or_else(|| CollectionError::DetachedSchema {
                collection: collection.to_string(),
                generator: name.clone(),
                schema: relative.clone(),
            })?;
            read_json(&dir.join(relative))?
        }
    };

    log::debug!("Resolved generator {}:{} (entry point '{}').", collection, name, entry.factory);
    Ok(GeneratorDescriptor {
        collection: collection.to_string(),
        name: name.clone(),
        schema,
        entry_point: entry.factory.clone(),
        description: entry.description.clone(),
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> CollectionResult<T> {
    let content = fs::read_to_string(path).map_err(|source| CollectionError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| CollectionError::Json {
        path: path.display().to_string(),
        source,
    })
}

// MARK: --- UNIT TESTS ---
