//! Scope construction and registration actions
//!
//! [`ScopeBuilder`] collects instances, providers and actions, then builds
//! the scope in one step: bindings are inserted first, registration actions
//! run afterwards in declaration order. If anything fails the scope is
//! dropped and never handed out.

use crate::dependency::{Dependencies, Factory};
use crate::factory::{Binding, FactoryDescriptor, InstanceDescriptor, RegistrationAction, factory_of};
use crate::provider::{Injectable, Provider};
use crate::scope::Scope;
use crate::{RegistryError, Result};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;
#[cfg(feature = "logging")]
use crate::logging::TARGET;

struct Pending {
    binding: Binding,
    from_provider: bool,
}

/// Builder for a scope with pre-configured services.
///
/// # Examples
///
/// ```rust
/// use service_registry::{RegistrationAction, Scope};
///
/// struct BuildRoot(String);
/// struct Banner(String);
///
/// let scope = Scope::builder()
///     .named("build")
///     .instance(BuildRoot("/work".into()))
///     .action(RegistrationAction::new("configure_banner", |registration| {
///         let root = registration.get::<BuildRoot>()?;
///         registration.add(Banner(format!("building {}", root.0)))
///     }))
///     .build()
///     .unwrap();
///
/// assert_eq!(scope.get::<Banner>().unwrap().0, "building /work");
/// ```
pub struct ScopeBuilder {
    parent: Option<Scope>,
    name: Option<String>,
    bindings: Vec<Pending>,
    actions: Vec<RegistrationAction>,
}

impl ScopeBuilder {
    /// Create a builder for a root scope.
    #[inline]
    pub fn new() -> Self {
        Self {
            parent: None,
            name: None,
            bindings: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Create a builder for a child of `parent`.
    #[inline]
    pub fn with_parent(parent: Scope) -> Self {
        Self {
            parent: Some(parent),
            ..Self::new()
        }
    }

    /// Name shown in errors and logs
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a provider's factories; its actions join the action list.
    pub fn provider<P: Provider>(self, provider: P) -> Self {
        self.provider_arc(Arc::new(provider))
    }

    pub fn provider_arc<P: Provider>(mut self, provider: Arc<P>) -> Self {
        self.actions.extend(Arc::clone(&provider).actions());
        self.bindings
            .extend(provider.factories().into_iter().map(|descriptor| Pending {
                binding: descriptor.into_binding(),
                from_provider: true,
            }));
        self
    }

    /// Add an instance bound under its own type.
    pub fn instance<T: Injectable>(self, instance: T) -> Self {
        self.instance_descriptor(InstanceDescriptor::new(instance))
    }

    /// Add a shared instance; `T` may be a trait object.
    pub fn instance_arc<T: ?Sized + Injectable>(self, instance: Arc<T>) -> Self {
        self.instance_descriptor(InstanceDescriptor::from_arc(instance))
    }

    pub fn instance_descriptor<T: ?Sized + Injectable>(
        mut self,
        descriptor: InstanceDescriptor<T>,
    ) -> Self {
        self.bindings.push(Pending {
            binding: descriptor.into_binding(),
            from_provider: false,
        });
        self
    }

    pub fn factory(mut self, descriptor: FactoryDescriptor) -> Self {
        self.bindings.push(Pending {
            binding: descriptor.into_binding(),
            from_provider: false,
        });
        self
    }

    /// Add a factory-of binding producing fresh `T` values.
    pub fn factory_of<T, F>(mut self, create: F) -> Self
    where
        T: 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.bindings.push(Pending {
            binding: factory_of(create).into_binding(),
            from_provider: false,
        });
        self
    }

    /// Append a registration action.
    pub fn action(mut self, action: RegistrationAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Build the scope.
    ///
    /// Fails with `BindingConflict` or `DuplicateBinding` when two bindings
    /// share a primary type, and with `Registration` when an action fails.
    pub fn build(self) -> Result<Scope> {
        let scope = Scope::create(self.parent, self.name);

        for pending in self.bindings {
            scope.insert(pending.binding, pending.from_provider)?;
        }
        run_actions(&scope, self.actions)?;

        #[cfg(feature = "logging")]
        debug!(
            target: TARGET,
            scope = %scope,
            depth = scope.depth(),
            services = scope.len(),
            "Scope built"
        );

        Ok(scope)
    }
}

impl Default for ScopeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScopeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeBuilder")
            .field("parent", &self.parent.as_ref().map(Scope::id))
            .field("name", &self.name)
            .field("bindings", &self.bindings.len())
            .field("actions", &self.actions.len())
            .finish()
    }
}

/// Run actions in order, wrapping the first failure.
pub(crate) fn run_actions(scope: &Scope, actions: Vec<RegistrationAction>) -> Result<()> {
    for action in actions {
        let (name, run) = action.into_parts();

        #[cfg(feature = "logging")]
        debug!(
            target: TARGET,
            scope = %scope,
            action = %name,
            "Running registration action"
        );

        let registration = ServiceRegistration { scope };
        run(&registration).map_err(|source| {
            #[cfg(feature = "logging")]
            debug!(
                target: TARGET,
                scope = %scope,
                action = %name,
                error = %source,
                "Registration action failed"
            );

            RegistryError::Registration {
                scope: scope.to_string(),
                action: name.into_owned(),
                source: Box::new(source),
            }
        })?;
    }
    Ok(())
}

/// Handle given to registration actions.
///
/// Lookups through this handle do not close the scope, so an action may both
/// read services and register new ones.
pub struct ServiceRegistration<'a> {
    scope: &'a Scope,
}

impl<'a> ServiceRegistration<'a> {
    /// The scope under construction
    #[inline]
    pub fn scope(&self) -> &'a Scope {
        self.scope
    }

    #[inline]
    pub fn get<T: ?Sized + Injectable>(&self) -> Result<Arc<T>> {
        self.scope.resolve::<T>()
    }

    #[inline]
    pub fn try_get<T: ?Sized + Injectable>(&self) -> Result<Option<Arc<T>>> {
        self.scope.resolve_optional::<T>()
    }

    #[inline]
    pub fn get_all<T: ?Sized + Injectable>(&self) -> Result<Vec<Arc<T>>> {
        self.scope.resolve_all::<T>()
    }

    pub fn get_factory<T: 'static>(&self) -> Result<Factory<T>> {
        self.scope
            .resolve::<Factory<T>>()
            .map(|factory| (*factory).clone())
    }

    /// Resolve a parameter list the way factory parameters are resolved
    pub fn resolve_dependencies<D: Dependencies>(&self) -> Result<D> {
        let resolved = D::specs()
            .into_iter()
            .map(|spec| self.scope.resolve_spec(spec))
            .collect::<Result<Vec<_>>>()?;
        D::extract(resolved)
    }

    #[inline]
    pub fn add<T: Injectable>(&self, instance: T) -> Result<()> {
        self.scope.register(instance)
    }

    #[inline]
    pub fn add_arc<T: ?Sized + Injectable>(&self, instance: Arc<T>) -> Result<()> {
        self.scope.register_arc(instance)
    }

    #[inline]
    pub fn add_instance<T: ?Sized + Injectable>(&self, descriptor: InstanceDescriptor<T>) -> Result<()> {
        self.scope.register_instance(descriptor)
    }

    #[inline]
    pub fn add_factory(&self, descriptor: FactoryDescriptor) -> Result<()> {
        self.scope.register_factory(descriptor)
    }

    #[inline]
    pub fn add_factory_of<T, F>(&self, create: F) -> Result<()>
    where
        T: 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.scope.register_factory_of(create)
    }

    /// Add a nested provider; its actions run before this call returns.
    #[inline]
    pub fn add_provider<P: Provider>(&self, provider: P) -> Result<()> {
        self.scope.register_provider(provider)
    }
}

impl std::fmt::Debug for ServiceRegistration<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistration")
            .field("scope", self.scope)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Endpoint(String);

    struct Handler {
        endpoints: Mutex<Vec<String>>,
    }

    struct Events(Mutex<Vec<&'static str>>);

    struct FirstServices;
    struct SecondServices;

    impl Provider for FirstServices {
        fn factories(self: Arc<Self>) -> Vec<FactoryDescriptor> {
            vec![FactoryDescriptor::new("FirstServices::create_endpoint", |(): ()| {
                Ok(Endpoint("first".into()))
            })]
        }
    }

    impl Provider for SecondServices {
        fn factories(self: Arc<Self>) -> Vec<FactoryDescriptor> {
            vec![FactoryDescriptor::new("SecondServices::create_endpoint", |(): ()| {
                Ok(Endpoint("second".into()))
            })]
        }
    }

    #[test]
    fn test_actions_run_in_declaration_order() {
        let scope = Scope::builder()
            .instance(Events(Mutex::new(Vec::new())))
            .action(RegistrationAction::new("first", |registration| {
                registration.get::<Events>()?.0.lock().unwrap().push("first");
                Ok(())
            }))
            .action(RegistrationAction::new("second", |registration| {
                registration.get::<Events>()?.0.lock().unwrap().push("second");
                Ok(())
            }))
            .build()
            .unwrap();

        let events = scope.get::<Events>().unwrap();
        assert_eq!(*events.0.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_action_lookups_keep_scope_open() {
        let scope = Scope::builder()
            .instance(Handler {
                endpoints: Mutex::new(Vec::new()),
            })
            .action(RegistrationAction::with_dependencies(
                "configure_endpoint",
                |registration, (handler,): (Arc<Handler>,)| {
                    handler.endpoints.lock().unwrap().push("a".into());
                    registration.add(Endpoint("registered".into()))
                },
            ))
            .build()
            .unwrap();

        assert!(!scope.is_sealed());
        assert_eq!(scope.get::<Endpoint>().unwrap().0, "registered");
        assert_eq!(scope.get::<Handler>().unwrap().endpoints.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_dependency_on_later_action_fails() {
        let err = Scope::builder()
            .named("settings")
            .action(RegistrationAction::new("reads_endpoint", |registration| {
                registration.get::<Endpoint>().map(|_| ())
            }))
            .action(RegistrationAction::new("adds_endpoint", |registration| {
                registration.add(Endpoint("late".into()))
            }))
            .build()
            .unwrap_err();

        match &err {
            RegistryError::Registration { scope, action, .. } => {
                assert!(scope.starts_with("settings"));
                assert_eq!(action, "reads_endpoint");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            err.root_cause(),
            RegistryError::UnknownService { .. }
        ));
    }

    #[test]
    fn test_conflicting_providers() {
        let err = Scope::builder()
            .provider(FirstServices)
            .provider(SecondServices)
            .build()
            .unwrap_err();

        match err {
            RegistryError::BindingConflict { first, second, .. } => {
                assert_eq!(first, "FirstServices::create_endpoint");
                assert_eq!(second, "SecondServices::create_endpoint");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_provider_shadows_instance_in_parent() {
        let root = Scope::builder()
            .instance(Endpoint("root".into()))
            .build()
            .unwrap();
        let child = root.child_builder().provider(FirstServices).build().unwrap();

        assert_eq!(child.get::<Endpoint>().unwrap().0, "first");
        assert_eq!(root.get::<Endpoint>().unwrap().0, "root");
    }

    #[test]
    fn test_nested_provider_from_action() {
        let scope = Scope::builder()
            .action(RegistrationAction::new("add_first", |registration| {
                registration.add_provider(FirstServices)
            }))
            .build()
            .unwrap();

        assert_eq!(scope.get::<Endpoint>().unwrap().0, "first");
    }
}
