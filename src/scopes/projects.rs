//! Project descriptors declared by the settings phase

use ahash::RandomState;
use dashmap::DashMap;
use std::path::{Path, PathBuf};

/// One project of the build, keyed by its path (`:`, `:core`, `:core:api`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDescriptor {
    path: String,
    project_dir: PathBuf,
}

impl ProjectDescriptor {
    pub fn new(path: impl Into<String>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            project_dir: project_dir.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Last path segment, empty for the root project
    pub fn name(&self) -> &str {
        self.path.rsplit(':').next().unwrap_or_default()
    }
}

/// Every project declared so far
#[derive(Debug)]
pub struct ProjectDescriptorRegistry {
    projects: DashMap<String, ProjectDescriptor, RandomState>,
}

impl ProjectDescriptorRegistry {
    pub fn new() -> Self {
        Self {
            projects: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Add or replace a project; returns the descriptor it replaced
    pub fn add(&self, project: ProjectDescriptor) -> Option<ProjectDescriptor> {
        self.projects.insert(project.path.clone(), project)
    }

    pub fn find(&self, path: &str) -> Option<ProjectDescriptor> {
        self.projects.get(path).map(|entry| entry.value().clone())
    }

    /// All project paths, sorted
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.projects.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

impl Default for ProjectDescriptorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_find() {
        let registry = ProjectDescriptorRegistry::new();
        assert!(registry.is_empty());

        registry.add(ProjectDescriptor::new(":", "/work"));
        registry.add(ProjectDescriptor::new(":core", "/work/core"));
        let replaced = registry.add(ProjectDescriptor::new(":core", "/work/modules/core"));

        assert_eq!(replaced.unwrap().project_dir(), Path::new("/work/core"));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.find(":core").unwrap().name(), "core");
        assert_eq!(registry.find(":").unwrap().name(), "");
        assert_eq!(registry.paths(), vec![":", ":core"]);
    }
}
