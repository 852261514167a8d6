//! Plugin registries, managers and repository declarations

use crate::{RegistryError, Result};
use ahash::RandomState;
use dashmap::DashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Identifies the class-loader scope plugins are loaded into
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassLoaderScope(String);

impl ClassLoaderScope {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassLoaderScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Known plugin ids, layered by class-loader scope.
///
/// A child sees its own plugins and those of every ancestor; plugins added
/// to a child never leak into the parent.
pub struct PluginRegistry {
    scope: ClassLoaderScope,
    parent: Option<Arc<PluginRegistry>>,
    plugins: DashSet<String, RandomState>,
}

impl PluginRegistry {
    pub fn root(scope: ClassLoaderScope) -> Self {
        Self {
            scope,
            parent: None,
            plugins: DashSet::with_hasher(RandomState::new()),
        }
    }

    /// A registry layered over this one
    pub fn create_child(self: &Arc<Self>, scope: ClassLoaderScope) -> Self {
        Self {
            scope,
            parent: Some(Arc::clone(self)),
            plugins: DashSet::with_hasher(RandomState::new()),
        }
    }

    pub fn class_loader_scope(&self) -> &ClassLoaderScope {
        &self.scope
    }

    pub fn parent(&self) -> Option<&Arc<PluginRegistry>> {
        self.parent.as_ref()
    }

    pub fn register(&self, id: impl Into<String>) {
        self.plugins.insert(id.into());
    }

    /// Check this registry and its ancestors for a plugin id
    pub fn contains(&self, id: &str) -> bool {
        self.plugins.contains(id) || self.parent.as_ref().is_some_and(|p| p.contains(id))
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("scope", &self.scope)
            .field("plugins", &self.plugins.len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

/// Applies plugins from a registry to one target
#[derive(Debug)]
pub struct PluginManager {
    target: String,
    registry: Arc<PluginRegistry>,
    applied: Mutex<Vec<String>>,
}

impl PluginManager {
    pub fn new(target: impl Into<String>, registry: Arc<PluginRegistry>) -> Self {
        Self {
            target: target.into(),
            registry,
            applied: Mutex::new(Vec::new()),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Apply a plugin once; returns `false` for unknown or already applied ids
    pub fn apply(&self, id: &str) -> Result<bool> {
        if !self.registry.contains(id) {
            return Ok(false);
        }
        let mut applied = self
            .applied
            .lock()
            .map_err(|_| RegistryError::Internal("plugin manager lock poisoned".into()))?;
        if applied.iter().any(|a| a == id) {
            return Ok(false);
        }
        applied.push(id.to_owned());
        Ok(true)
    }

    pub fn applied(&self) -> Result<Vec<String>> {
        self.applied
            .lock()
            .map(|applied| applied.clone())
            .map_err(|_| RegistryError::Internal("plugin manager lock poisoned".into()))
    }
}

/// A Maven repository plugins are resolved from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MavenPluginRepository {
    name: String,
    url: Option<String>,
}

impl MavenPluginRepository {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = Some(url.into());
    }
}

/// Ordered list of plugin repositories
#[derive(Debug, Default)]
pub struct PluginRepositoryHandler {
    repositories: Mutex<Vec<MavenPluginRepository>>,
}

impl PluginRepositoryHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a Maven repository, configured by `configure`.
    ///
    /// Repositories are named `maven`, `maven2`, `maven3` and so on.
    pub fn maven<F>(&self, configure: F) -> Result<()>
    where
        F: FnOnce(&mut MavenPluginRepository),
    {
        let mut repositories = self.lock()?;
        let name = match repositories.len() {
            0 => "maven".to_owned(),
            n => format!("maven{}", n + 1),
        };
        let mut repository = MavenPluginRepository { name, url: None };
        configure(&mut repository);
        repositories.push(repository);
        Ok(())
    }

    /// Snapshot of the declared repositories, in declaration order
    pub fn repositories(&self) -> Result<Vec<MavenPluginRepository>> {
        Ok(self.lock()?.clone())
    }

    pub fn urls(&self) -> Result<Vec<String>> {
        Ok(self
            .lock()?
            .iter()
            .filter_map(|repository| repository.url.clone())
            .collect())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<MavenPluginRepository>>> {
        self.repositories
            .lock()
            .map_err(|_| RegistryError::Internal("plugin repository lock poisoned".into()))
    }
}
