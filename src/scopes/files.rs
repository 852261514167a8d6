//! File resolution relative to a base directory

use crate::{Factory, RegistryError, Result};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use url::Url;

/// Properties of the file system the build runs on
pub trait FileSystem: Send + Sync {
    fn is_case_sensitive(&self) -> bool;
}

/// The host file system
#[derive(Debug, Clone, Copy)]
pub struct LocalFileSystem {
    case_sensitive: bool,
}

impl LocalFileSystem {
    pub fn new(case_sensitive: bool) -> Self {
        Self { case_sensitive }
    }
}

impl Default for LocalFileSystem {
    fn default() -> Self {
        Self::new(!cfg!(any(windows, target_os = "macos")))
    }
}

impl FileSystem for LocalFileSystem {
    fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }
}

/// Include and exclude patterns for file trees.
///
/// Each resolver hands out fresh copies so callers can edit them freely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    includes: Vec<String>,
    excludes: Vec<String>,
}

impl PatternSet {
    pub fn include(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.includes.push(pattern.into());
        self
    }

    pub fn exclude(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.excludes.push(pattern.into());
        self
    }

    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }
}

/// Turns user-supplied paths into absolute paths and URIs
pub trait FileResolver: Send + Sync {
    /// Resolve a path against the resolver's base directory
    fn resolve(&self, path: &str) -> PathBuf;

    /// Resolve a location to a URI string.
    ///
    /// Locations that already carry a scheme are parsed as URLs; anything
    /// else is treated as a path and turned into a percent-encoded `file:` URI.
    fn resolve_uri(&self, location: &str) -> Result<String>;

    /// A fresh, empty pattern set
    fn patterns(&self) -> PatternSet;
}

/// A resolver rooted at a fixed directory
pub struct BaseDirFileResolver {
    file_system: Arc<dyn FileSystem>,
    base_dir: PathBuf,
    pattern_sets: Factory<PatternSet>,
}

impl BaseDirFileResolver {
    pub fn new(
        file_system: Arc<dyn FileSystem>,
        base_dir: impl Into<PathBuf>,
        pattern_sets: Factory<PatternSet>,
    ) -> Self {
        Self {
            file_system,
            base_dir: base_dir.into(),
            pattern_sets,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.file_system
    }
}

impl FileResolver for BaseDirFileResolver {
    fn resolve(&self, path: &str) -> PathBuf {
        normalize(&self.base_dir.join(path))
    }

    fn resolve_uri(&self, location: &str) -> Result<String> {
        // One-letter schemes are drive letters (`C:\repo`), not URLs
        if let Ok(url) = Url::parse(location) {
            if url.scheme().len() > 1 {
                return Ok(url.into());
            }
        }

        let mut path = self.resolve(location);
        if !path.is_absolute() {
            let cwd = std::env::current_dir()
                .map_err(|err| RegistryError::invalid_location(location, err))?;
            path = normalize(&cwd.join(path));
        }

        Url::from_file_path(&path)
            .map(String::from)
            .map_err(|()| RegistryError::invalid_location(location, "not an absolute file path"))
    }

    fn patterns(&self) -> PatternSet {
        self.pattern_sets.create()
    }
}

impl fmt::Debug for BaseDirFileResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseDirFileResolver")
            .field("base_dir", &self.base_dir)
            .field("case_sensitive", &self.file_system.is_case_sensitive())
            .finish()
    }
}

/// Collapse `.` and `..` without touching the file system
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(base: &str) -> BaseDirFileResolver {
        BaseDirFileResolver::new(
            Arc::new(LocalFileSystem::new(true)),
            base,
            Factory::new(PatternSet::default),
        )
    }

    #[test]
    fn test_uri_with_scheme_is_parsed() {
        let resolver = resolver("/work/build");
        assert_eq!(
            resolver.resolve_uri("https://repo.example.com/maven").unwrap(),
            "https://repo.example.com/maven"
        );
        assert_eq!(
            resolver.resolve_uri("https://a.example.com").unwrap(),
            "https://a.example.com/"
        );
        assert_eq!(
            resolver.resolve_uri("s3+https://bucket/repo").unwrap(),
            "s3+https://bucket/repo"
        );
        assert_eq!(resolver.resolve_uri("file:/tmp/repo").unwrap(), "file:///tmp/repo");
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_location_becomes_file_uri() {
        let resolver = resolver("/work/build");
        assert_eq!(resolver.resolve_uri("repo").unwrap(), "file:///work/build/repo");
        assert_eq!(resolver.resolve_uri("../repo").unwrap(), "file:///work/repo");
        assert_eq!(resolver.resolve_uri("/abs/repo").unwrap(), "file:///abs/repo");
        assert_eq!(
            resolver.resolve_uri("a.example.com").unwrap(),
            "file:///work/build/a.example.com"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_file_uri_is_percent_encoded() {
        let resolver = resolver("/work/my settings");
        assert_eq!(
            resolver.resolve_uri("local repo#1").unwrap(),
            "file:///work/my%20settings/local%20repo%231"
        );
        assert_eq!(
            resolver.resolve_uri("100%").unwrap(),
            "file:///work/my%20settings/100%25"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_base_dir_uses_working_directory() {
        let resolver = resolver("build");
        let uri = resolver.resolve_uri("repo").unwrap();
        assert!(uri.starts_with("file:///"));
        assert!(uri.ends_with("/build/repo"));
    }

    #[test]
    fn test_patterns_are_fresh() {
        let resolver = resolver("/work");
        let mut first = resolver.patterns();
        first.include("**/*.rs").exclude("target/**");
        assert_eq!(first.includes(), ["**/*.rs"]);
        assert!(resolver.patterns().is_empty());
    }
}
