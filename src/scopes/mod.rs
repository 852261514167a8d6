//! Concrete scopes built on the registry
//!
//! The settings scope sits between the build-wide scope and the project
//! scopes. It contributes a file resolver rooted at the settings directory,
//! a child plugin registry, a plugin manager and the project descriptor
//! registry, and wires configured plugin repositories onto the inherited
//! repository handler while it is built.
//!
//! The collaborators are small in-memory types.

pub mod files;
pub mod plugins;
pub mod projects;
pub mod settings;

pub use files::{BaseDirFileResolver, FileResolver, FileSystem, LocalFileSystem, PatternSet};
pub use plugins::{
    ClassLoaderScope, MavenPluginRepository, PluginManager, PluginRegistry,
    PluginRepositoryHandler,
};
pub use projects::{ProjectDescriptor, ProjectDescriptorRegistry};
pub use settings::{Settings, SettingsConfig, SettingsScopeServices};
