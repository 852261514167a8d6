//! The settings scope
//!
//! Built once per build, as a child of the build-wide scope, after the
//! settings directory is known and before any project is configured.

use crate::provider;
use crate::scopes::files::{BaseDirFileResolver, FileResolver, FileSystem, PatternSet};
use crate::scopes::plugins::{ClassLoaderScope, PluginManager, PluginRegistry, PluginRepositoryHandler};
use crate::scopes::projects::ProjectDescriptorRegistry;
use crate::{Factory, Result, Scope, ServiceRegistration};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;
#[cfg(feature = "logging")]
use crate::logging::TARGET;

/// The settings being evaluated
#[derive(Debug, Clone)]
pub struct Settings {
    settings_dir: PathBuf,
    class_loader_scope: ClassLoaderScope,
}

impl Settings {
    pub fn new(settings_dir: impl Into<PathBuf>, class_loader_scope: ClassLoaderScope) -> Self {
        Self {
            settings_dir: settings_dir.into(),
            class_loader_scope,
        }
    }

    pub fn settings_dir(&self) -> &Path {
        &self.settings_dir
    }

    pub fn class_loader_scope(&self) -> &ClassLoaderScope {
        &self.class_loader_scope
    }
}

/// Externally supplied settings-phase options.
///
/// `plugin_repository_urls` is a comma-separated list of repository
/// locations; entries are trimmed and empty entries ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct SettingsConfig {
    pub plugin_repository_urls: Option<String>,
}

impl SettingsConfig {
    /// Prefix of environment variables read by [`load`](Self::load)
    pub const ENV_PREFIX: &'static str = "SERVICE_REGISTRY_";

    pub fn with_plugin_repository_urls(urls: impl Into<String>) -> Self {
        Self {
            plugin_repository_urls: Some(urls.into()),
        }
    }

    /// Configured repository locations, in order
    pub fn repository_urls(&self) -> Vec<&str> {
        self.plugin_repository_urls
            .as_deref()
            .map(|urls| {
                urls.split(',')
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(feature = "config")]
impl SettingsConfig {
    /// Load from defaults, an optional TOML file, then `SERVICE_REGISTRY_*`
    /// environment variables; later sources win.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        use figment::Figment;
        use figment::providers::{Env, Format, Serialized, Toml};

        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        Self::from_figment(figment.merge(Env::prefixed(Self::ENV_PREFIX)))
    }

    pub fn from_figment(figment: figment::Figment) -> Result<Self> {
        Ok(figment.extract()?)
    }
}

/// Services of the settings scope.
///
/// Expects the parent chain to provide `dyn FileSystem`, a
/// `Factory<PatternSet>`, the build's `PluginRegistry` and its
/// `PluginRepositoryHandler`.
#[derive(Debug)]
pub struct SettingsScopeServices {
    settings: Arc<Settings>,
    config: SettingsConfig,
}

impl SettingsScopeServices {
    pub fn new(settings: Settings, config: SettingsConfig) -> Self {
        Self {
            settings: Arc::new(settings),
            config,
        }
    }

    /// Build the settings scope as a child of `parent`.
    ///
    /// The `Settings` themselves are bound in the new scope too.
    pub fn build_scope(self, parent: &Scope) -> Result<Scope> {
        let settings = Arc::clone(&self.settings);
        parent
            .child_builder()
            .named("settings")
            .instance_arc(settings)
            .provider(self)
            .build()
    }
}

#[provider]
impl SettingsScopeServices {
    #[expose(dyn FileResolver)]
    fn create_file_resolver(
        &self,
        file_system: Arc<dyn FileSystem>,
        pattern_sets: Factory<PatternSet>,
    ) -> BaseDirFileResolver {
        BaseDirFileResolver::new(file_system, self.settings.settings_dir(), pattern_sets)
    }

    fn create_plugin_registry(&self, parent: Arc<PluginRegistry>) -> PluginRegistry {
        parent.create_child(self.settings.class_loader_scope().clone())
    }

    fn create_plugin_manager(&self, registry: Arc<PluginRegistry>) -> PluginManager {
        let target = format!("settings '{}'", self.settings.settings_dir().display());
        PluginManager::new(target, registry)
    }

    fn create_project_descriptor_registry() -> ProjectDescriptorRegistry {
        ProjectDescriptorRegistry::new()
    }

    fn configure_plugin_repositories(&self, registration: &ServiceRegistration<'_>) -> Result<()> {
        let urls = self.config.repository_urls();
        if urls.is_empty() {
            return Ok(());
        }

        let handler = registration.get::<PluginRepositoryHandler>()?;
        let resolver = registration.get::<dyn FileResolver>()?;
        for url in urls {
            let normalized = resolver.resolve_uri(url)?;

            #[cfg(feature = "logging")]
            debug!(
                target: TARGET,
                url = url,
                normalized = %normalized,
                "Adding plugin repository"
            );

            handler.maven(|repository| repository.set_url(normalized))?;
        }
        Ok(())
    }
}
