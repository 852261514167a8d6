//! # service-registry - hierarchical, convention-based service registry
//!
//! A dependency-injection container that resolves, lazily constructs and
//! caches services by type, arranged in parent/child scopes that mirror the
//! phases of a long-running process (global, settings, project, task).
//!
//! ## Features
//!
//! - **Scoped** - a child searches its own bindings first, then delegates to
//!   its parent; child bindings shadow inherited ones
//! - **Lazy singletons** - factories run on first access, exactly once per
//!   scope, even under concurrent lookups
//! - **Convention scanning** - `#[provider]` turns `create_*` methods into
//!   factories and `configure_*` methods into registration actions
//! - **Typed dependencies** - `Arc<T>`, `Option<Arc<T>>`, `Vec<Arc<T>>` and
//!   `Factory<T>` parameters, resolved at invocation time
//! - **Checked wiring** - cycles, conflicts and ambiguity are reported with
//!   the types involved
//! - **Observable** - optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use service_registry::{FactoryDescriptor, Scope};
//! use std::sync::Arc;
//!
//! struct Database { url: String }
//! struct UserService { db: Arc<Database> }
//!
//! let global = Scope::builder()
//!     .instance(Database { url: "postgres://localhost".into() })
//!     .build()
//!     .unwrap();
//!
//! let request = global
//!     .child_builder()
//!     .factory(FactoryDescriptor::new(
//!         "create_user_service",
//!         |(db,): (Arc<Database>,)| Ok(UserService { db }),
//!     ))
//!     .build()
//!     .unwrap();
//!
//! let users = request.get::<UserService>().unwrap();
//! assert_eq!(users.db.url, "postgres://localhost");
//! ```
//!
//! ## Convention Scanning
//!
//! ```rust
//! # #[cfg(feature = "derive")] {
//! use service_registry::{provider, Scope, ServiceRegistration};
//! use std::sync::{Arc, Mutex};
//!
//! struct Greeting(String);
//! struct Guests(Mutex<Vec<String>>);
//!
//! struct PartyServices;
//!
//! #[provider]
//! impl PartyServices {
//!     fn create_guests(&self) -> Guests {
//!         Guests(Mutex::new(Vec::new()))
//!     }
//!
//!     fn create_greeting(&self, guests: Arc<Guests>) -> Greeting {
//!         Greeting(format!("hello {} guests", guests.0.lock().unwrap().len()))
//!     }
//!
//!     fn configure_guests(&self, _registration: &ServiceRegistration<'_>, guests: Arc<Guests>) {
//!         guests.0.lock().unwrap().push("ada".into());
//!     }
//! }
//!
//! let scope = Scope::builder().provider(PartyServices).build().unwrap();
//! assert_eq!(scope.get::<Greeting>().unwrap().0, "hello 1 guests");
//! # }
//! ```

// Lets generated `::service_registry::` paths resolve inside this crate
extern crate self as service_registry;

mod builder;
mod dependency;
mod error;
mod factory;
#[cfg(feature = "logging")]
pub mod logging;
mod provider;
mod scope;
#[cfg(feature = "derive")]
pub mod scopes;
mod storage;

pub use builder::{ScopeBuilder, ServiceRegistration};
pub use dependency::{Dependencies, Dependency, DependencyKind, DependencySpec, Factory, Resolved};
pub use error::*;
pub use factory::{FactoryDescriptor, Instance, InstanceDescriptor, RegistrationAction};
pub use provider::{Injectable, Provider, ServiceType};
pub use scope::{Scope, ScopeId};

#[cfg(feature = "derive")]
pub use service_registry_derive::provider;

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Factory, FactoryDescriptor, InstanceDescriptor, Provider, RegistrationAction, RegistryError,
        Result, Scope, ScopeBuilder, ServiceRegistration,
    };
    #[cfg(feature = "derive")]
    pub use service_registry_derive::provider;
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Database {
        url: String,
    }

    #[test]
    fn test_instance_registration() {
        let scope = Scope::new();
        scope.register(Database { url: "test".into() }).unwrap();

        let db = scope.get::<Database>().unwrap();
        assert_eq!(db.url, "test");
    }

    #[test]
    fn test_multiple_resolve_same_instance() {
        let scope = Scope::new();
        scope.register(Database { url: "test".into() }).unwrap();

        let db1 = scope.get::<Database>().unwrap();
        let db2 = scope.get::<Database>().unwrap();

        assert!(Arc::ptr_eq(&db1, &db2));
    }

    #[test]
    fn test_override_in_child() {
        let root = Scope::new();
        root.register(Database {
            url: "production".into(),
        })
        .unwrap();

        let test_scope = root.child();
        test_scope.register(Database { url: "test".into() }).unwrap();

        assert_eq!(root.get::<Database>().unwrap().url, "production");
        assert_eq!(test_scope.get::<Database>().unwrap().url, "test");
    }

    #[test]
    fn test_resolved_by_trait_object() {
        trait Store: Send + Sync {
            fn kind(&self) -> &'static str;
        }
        struct Memory;
        impl Store for Memory {
            fn kind(&self) -> &'static str {
                "memory"
            }
        }

        let scope = Scope::new();
        scope.register_arc::<dyn Store>(Arc::new(Memory)).unwrap();
        assert_eq!(scope.get::<dyn Store>().unwrap().kind(), "memory");
    }
}
