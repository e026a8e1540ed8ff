// src/core/generator.rs

//! # Generator Runtime
//!
//! Generators are Rust implementations registered in a [`GeneratorRegistry`] under the
//! collection they belong to and the entry point their manifest names. The runtime loads the
//! implementation named by a [`GeneratorDescriptor`] and invokes it against a staged
//! [`Tree`].

use crate::{
    core::{
        collection::{self, CollectionError},
        flush::FlushError,
        options::OptionsError,
        tree::Tree,
        workspace::{WorkspaceConfig, WorkspaceError},
    },
    models::{CollectionManifest, GeneratorDescriptor, ResolvedOptions},
};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Everything that can stop a `generate` run.
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error(transparent)]
    Collection(#[from] CollectionError),
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error(transparent)]
    Options(#[from] OptionsError),
    /// Raised by generator code. The original message is kept as-is.
    #[error(transparent)]
    Implementation(anyhow::Error),
    #[error(transparent)]
    Flush(#[from] FlushError),
    #[error("The post-generation task failed: {0}")]
    PostTask(anyhow::Error),
}
pub type GeneratorResult<T> = Result<T, GeneratorError>;

/// A callback returned by a generator, run after the changes were flushed.
pub type PostTask = Box<dyn FnOnce(&Tree) -> anyhow::Result<()>>;

/// A generator implementation: declares file mutations on `tree` from resolved options.
pub trait Generator: Send + Sync {
    fn generate(&self, tree: &mut Tree, options: &ResolvedOptions)
    -> anyhow::Result<Option<PostTask>>;
}

impl<F> Generator for F
where
    F: Fn(&mut Tree, &ResolvedOptions) -> anyhow::Result<Option<PostTask>> + Send + Sync,
{
    fn generate(
        &self,
        tree: &mut Tree,
        options: &ResolvedOptions,
    ) -> anyhow::Result<Option<PostTask>> {
        self(tree, options)
    }
}

#[derive(Debug, Clone)]
struct RegisteredCollection {
    manifest: CollectionManifest,
    dir: Option<PathBuf>,
}

/// Known collections and the implementations behind their entry points.
#[derive(Default)]
pub struct GeneratorRegistry {
    collections: BTreeMap<String, RegisteredCollection>,
    implementations: HashMap<(String, String), Arc<dyn Generator>>,
}

impl fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entry_points: Vec<_> = self
            .implementations
            .keys()
            .map(|(collection, entry)| format!("{}:{}", collection, entry))
            .collect();
        entry_points.sort();
        f.debug_struct("GeneratorRegistry")
            .field("collections", &self.collections.keys().collect::<Vec<_>>())
            .field("entry_points", &entry_points)
            .finish()
    }
}

impl GeneratorRegistry {
    /// Creates an empty registry. The bundled collection is added by `builtin::register`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a collection whose manifest is known in-process. `dir` is where schema
    /// paths in the manifest are resolved from.
    pub fn register_collection(
        &mut self,
        name: impl Into<String>,
        manifest: CollectionManifest,
        dir: Option<PathBuf>,
    ) {
        self.collections
            .insert(name.into(), RegisteredCollection { manifest, dir });
    }

    /// Binds `generator` to the `entry_point` of `collection`.
    pub fn register(
        &mut self,
        collection: impl Into<String>,
        entry_point: impl Into<String>,
        generator: impl Generator + 'static,
    ) {
        self.implementations
            .insert((collection.into(), entry_point.into()), Arc::new(generator));
    }

    /// Same as [`GeneratorRegistry::register`], with closure signature inference.
    pub fn register_fn<F>(
        &mut self,
        collection: impl Into<String>,
        entry_point: impl Into<String>,
        generator: F,
    ) where
        F: Fn(&mut Tree, &ResolvedOptions) -> anyhow::Result<Option<PostTask>>
            + Send
            + Sync
            + 'static,
    {
        self.register(collection, entry_point, generator);
    }

    /// Resolves a generator by collection and name (or alias). Collections registered
    /// in-process win over the ones declared in the workspace configuration.
    pub fn read_generator(
        &self,
        root: &Path,
        workspace: &WorkspaceConfig,
        collection: &str,
        generator: &str,
    ) -> GeneratorResult<GeneratorDescriptor> {
        if let Some(registered) = self.collections.get(collection) {
            return Ok(collection::resolve_descriptor(
                collection,
                &registered.manifest,
                registered.dir.as_deref(),
                generator,
            )?);
        }

        let manifest_path = workspace
            .collection_manifest(root, collection)
            .ok_or_else(|| CollectionError::UnknownCollection(collection.to_string()))?;
        log::debug!("Loading collection manifest '{}'.", manifest_path.display());
        let manifest = collection::load_manifest(&manifest_path)?;
        Ok(collection::resolve_descriptor(
            collection,
            &manifest,
            manifest_path.parent(),
            generator,
        )?)
    }

    /// Loads the implementation a descriptor points at.
    pub fn implementation(
        &self,
        descriptor: &GeneratorDescriptor,
    ) -> GeneratorResult<Arc<dyn Generator>> {
        self.implementations
            .get(&(descriptor.collection.clone(), descriptor.entry_point.clone()))
            .cloned()
            .ok_or_else(|| {
                CollectionError::MissingImplementation {
                    collection: descriptor.collection.clone(),
                    entry_point: descriptor.entry_point.clone(),
                }
                .into()
            })
    }
}

/// Invokes the generator described by `descriptor` against `tree`.
///
/// Failures inside the generator come back unchanged as [`GeneratorError::Implementation`];
/// whatever it already staged stays in the tree and is the caller's to discard.
pub fn run_generator(
    tree: &mut Tree,
    descriptor: &GeneratorDescriptor,
    registry: &GeneratorRegistry,
    options: &ResolvedOptions,
) -> GeneratorResult<Option<PostTask>> {
    let implementation = registry.implementation(descriptor)?;
    log::debug!(
        "Running generator {}:{} with {} option(s).",
        descriptor.collection,
        descriptor.name,
        options.len()
    );
    implementation
        .generate(tree, options)
        .map_err(GeneratorError::Implementation)
}

// MARK: --- UNIT TESTS ---
