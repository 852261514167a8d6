//! Hierarchical scopes
//!
//! A scope owns a binding table and an optional parent. Lookups search the
//! local table first and then delegate up the parent chain; factory bindings
//! are materialized on first access and cached for the scope's lifetime.

use crate::builder::{ScopeBuilder, run_actions};
use crate::dependency::{DependencyKind, DependencySpec, Factory, Resolved};
use crate::factory::{Binding, FactoryDescriptor, Instance, InstanceDescriptor, factory_of};
use crate::provider::{Injectable, Provider, ServiceType};
use crate::storage::BindingTable;
use crate::{RegistryError, Result};
use ahash::AHashSet;
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[cfg(feature = "logging")]
use tracing::{debug, trace};
#[cfg(feature = "logging")]
use crate::logging::TARGET;

/// Unique scope identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

impl ScopeId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[inline]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope-{}", self.0)
    }
}

struct ScopeInner {
    id: ScopeId,
    name: Option<String>,
    depth: u32,
    /// Strong reference; a parent always outlives its children
    parent: Option<Scope>,
    table: BindingTable,
    /// Set by the first public lookup on this scope or a descendant
    sealed: AtomicBool,
}

/// A node in the scope tree.
///
/// Cloning is cheap and yields a handle to the same scope.
///
/// # Examples
///
/// ```rust
/// use service_registry::Scope;
///
/// struct BuildConfig { parallel: bool }
/// struct TaskName(String);
///
/// let global = Scope::new();
/// global.register(BuildConfig { parallel: true }).unwrap();
///
/// let task = global.child();
/// task.register(TaskName("compile".into())).unwrap();
///
/// // The child sees its own bindings and everything inherited
/// assert!(task.get::<BuildConfig>().unwrap().parallel);
/// assert_eq!(task.get::<TaskName>().unwrap().0, "compile");
///
/// // The parent never sees the child's bindings
/// assert!(global.get::<TaskName>().is_err());
/// ```
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    /// Create an empty root scope.
    #[inline]
    pub fn new() -> Self {
        Self::create(None, None)
    }

    /// Start building a root scope from providers and instances.
    #[inline]
    pub fn builder() -> ScopeBuilder {
        ScopeBuilder::new()
    }

    /// Create an empty child scope.
    ///
    /// Bindings registered on the child shadow those of its ancestors for
    /// lookups rooted at or below the child.
    #[inline]
    pub fn child(&self) -> Self {
        Self::create(Some(self.clone()), None)
    }

    /// Start building a child scope from providers and instances.
    #[inline]
    pub fn child_builder(&self) -> ScopeBuilder {
        ScopeBuilder::with_parent(self.clone())
    }

    pub(crate) fn create(parent: Option<Scope>, name: Option<String>) -> Self {
        let depth = parent.as_ref().map_or(0, |p| p.depth() + 1);
        let id = ScopeId::next();

        #[cfg(feature = "logging")]
        debug!(
            target: TARGET,
            scope = %id,
            name = name.as_deref().unwrap_or(""),
            depth = depth,
            "Creating scope"
        );

        Self {
            inner: Arc::new(ScopeInner {
                id,
                name,
                depth,
                parent,
                table: BindingTable::new(),
                sealed: AtomicBool::new(false),
            }),
        }
    }

    // =========================================================================
    // Registration Methods
    // =========================================================================

    /// Register an instance under its own type.
    #[inline]
    pub fn register<T: Injectable>(&self, instance: T) -> Result<()> {
        self.register_instance(InstanceDescriptor::new(instance))
    }

    /// Register a shared instance; `T` may be a trait object.
    #[inline]
    pub fn register_arc<T: ?Sized + Injectable>(&self, instance: Arc<T>) -> Result<()> {
        self.register_instance(InstanceDescriptor::from_arc(instance))
    }

    /// Register an instance together with its declared supertypes.
    pub fn register_instance<T: ?Sized + Injectable>(
        &self,
        descriptor: InstanceDescriptor<T>,
    ) -> Result<()> {
        self.check_open::<T>()?;
        self.insert(descriptor.into_binding(), false)
    }

    /// Register a lazily invoked factory.
    ///
    /// Fails with `DuplicateBinding` when the produced type is already bound
    /// in this scope. Bindings of ancestors are shadowed, not replaced.
    pub fn register_factory(&self, descriptor: FactoryDescriptor) -> Result<()> {
        if self.is_sealed() {
            return Err(RegistryError::LateRegistration {
                type_name: descriptor.service().name(),
                scope: self.to_string(),
            });
        }
        self.insert(descriptor.into_binding(), false)
    }

    /// Register a factory-of binding producing fresh `T` values.
    ///
    /// Looked up with [`get_factory`](Self::get_factory).
    pub fn register_factory_of<T, F>(&self, create: F) -> Result<()>
    where
        T: 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.check_open::<Factory<T>>()?;
        self.insert(factory_of(create).into_binding(), false)
    }

    /// Add a provider's factories and run its registration actions now.
    ///
    /// Unlike [`ScopeBuilder::build`], a failing action does not undo the
    /// bindings inserted before it.
    pub fn register_provider<P: Provider>(&self, provider: P) -> Result<()> {
        self.register_provider_arc(Arc::new(provider))
    }

    /// Same as [`register_provider`](Self::register_provider) for a shared provider.
    pub fn register_provider_arc<P: Provider>(&self, provider: Arc<P>) -> Result<()> {
        self.check_open::<P>()?;
        let actions = Arc::clone(&provider).actions();
        for descriptor in provider.factories() {
            self.insert(descriptor.into_binding(), true)?;
        }
        run_actions(self, actions)
    }

    fn check_open<T: ?Sized + 'static>(&self) -> Result<()> {
        if self.is_sealed() {
            #[cfg(feature = "logging")]
            debug!(
                target: TARGET,
                service = std::any::type_name::<T>(),
                scope = %self,
                "Rejecting registration on sealed scope"
            );
            return Err(RegistryError::late_registration::<T>(self));
        }
        Ok(())
    }

    /// Insert into the local table, classifying clashes.
    ///
    /// Two provider factories for one type are a `BindingConflict`; anything
    /// else is a `DuplicateBinding`.
    pub(crate) fn insert(&self, binding: Binding, from_provider: bool) -> Result<()> {
        let service = binding.service();
        let origin = binding.origin().to_owned();
        #[cfg(feature = "logging")]
        let lazy = binding.is_factory();

        match self.inner.table.insert(binding) {
            Ok(_) => {
                #[cfg(feature = "logging")]
                debug!(
                    target: TARGET,
                    service = service.name(),
                    scope = %self,
                    factory = %origin,
                    lazy = lazy,
                    "Registered binding"
                );
                Ok(())
            }
            Err(existing) if from_provider && existing.is_factory() => {
                Err(RegistryError::BindingConflict {
                    type_name: service.name(),
                    scope: self.to_string(),
                    first: existing.origin().to_owned(),
                    second: origin,
                })
            }
            Err(_) => Err(RegistryError::DuplicateBinding {
                type_name: service.name(),
                scope: self.to_string(),
            }),
        }
    }

    // =========================================================================
    // Resolution Methods
    // =========================================================================

    /// Resolve a service from this scope or its ancestors.
    ///
    /// The first lookup closes this scope and its ancestors for registration.
    #[inline]
    pub fn get<T: ?Sized + Injectable>(&self) -> Result<Arc<T>> {
        self.seal();
        self.resolve::<T>()
    }

    /// Resolve a service, `None` when no scope in the chain binds it.
    ///
    /// Construction failures, cycles and ambiguity are still errors.
    #[inline]
    pub fn try_get<T: ?Sized + Injectable>(&self) -> Result<Option<Arc<T>>> {
        self.seal();
        self.resolve_optional::<T>()
    }

    /// Every service of type `T` across the chain.
    ///
    /// Local bindings come before inherited ones, each scope in registration
    /// order. Empty when nothing matches.
    #[inline]
    pub fn get_all<T: ?Sized + Injectable>(&self) -> Result<Vec<Arc<T>>> {
        self.seal();
        self.resolve_all::<T>()
    }

    /// The nearest factory-of binding producing `T`.
    #[inline]
    pub fn get_factory<T: 'static>(&self) -> Result<Factory<T>> {
        self.get::<Factory<T>>().map(|factory| (*factory).clone())
    }

    /// Every factory-of binding producing `T` across the chain.
    #[inline]
    pub fn get_factories<T: 'static>(&self) -> Result<Vec<Factory<T>>> {
        Ok(self
            .get_all::<Factory<T>>()?
            .into_iter()
            .map(|factory| (*factory).clone())
            .collect())
    }

    /// Non-sealing lookup used while the scope is still being wired.
    pub(crate) fn resolve<T: ?Sized + Injectable>(&self) -> Result<Arc<T>> {
        let key = ServiceType::of::<T>();
        match self.resolve_single(key)? {
            Some(instance) => downcast_instance::<T>(&instance),
            None => {
                #[cfg(feature = "logging")]
                debug!(
                    target: TARGET,
                    service = key.name(),
                    scope = %self,
                    depth = self.depth(),
                    "Service not found in scope or parent chain"
                );
                Err(RegistryError::unknown::<T>(self))
            }
        }
    }

    pub(crate) fn resolve_optional<T: ?Sized + Injectable>(&self) -> Result<Option<Arc<T>>> {
        self.resolve_single(ServiceType::of::<T>())?
            .map(|instance| downcast_instance::<T>(&instance))
            .transpose()
    }

    pub(crate) fn resolve_all<T: ?Sized + Injectable>(&self) -> Result<Vec<Arc<T>>> {
        self.collect_all(ServiceType::of::<T>())?
            .iter()
            .map(downcast_instance::<T>)
            .collect()
    }

    /// Resolve one declared dependency from this scope
    pub(crate) fn resolve_spec(&self, spec: DependencySpec) -> Result<Resolved> {
        match spec.kind {
            DependencyKind::Single => self
                .resolve_single(spec.service)?
                .map(Resolved::Single)
                .ok_or_else(|| RegistryError::UnknownService {
                    type_name: spec.service.name(),
                    scope: self.to_string(),
                }),
            DependencyKind::Optional => Ok(Resolved::Optional(self.resolve_single(spec.service)?)),
            DependencyKind::All => Ok(Resolved::All(self.collect_all(spec.service)?)),
        }
    }

    /// The nearest scope binding `key`, with its matching bindings
    fn locate(&self, key: ServiceType) -> Option<(&Scope, Vec<Arc<Binding>>)> {
        self.ancestry().find_map(|scope| {
            let bindings = scope.inner.table.lookup(key);
            if bindings.is_empty() {
                return None;
            }

            #[cfg(feature = "logging")]
            trace!(
                target: TARGET,
                service = key.name(),
                scope = %self,
                owner = %scope,
                delegated = scope.depth() != self.depth(),
                "Located binding"
            );

            Some((scope, bindings))
        })
    }

    fn resolve_single(&self, key: ServiceType) -> Result<Option<Instance>> {
        let Some((owner, bindings)) = self.locate(key) else {
            return Ok(None);
        };

        if bindings.len() > 1 {
            return Err(RegistryError::AmbiguousService {
                type_name: key.name(),
                scope: owner.to_string(),
                count: bindings.len(),
            });
        }

        owner.materialize(&bindings[0], key).map(Some)
    }

    fn collect_all(&self, key: ServiceType) -> Result<Vec<Instance>> {
        let mut instances = Vec::new();
        for scope in self.ancestry() {
            for binding in scope.inner.table.lookup(key) {
                instances.push(scope.materialize(&binding, key)?);
            }
        }
        Ok(instances)
    }

    /// Build (or fetch) a binding owned by this scope and view it as `key`
    fn materialize(&self, binding: &Binding, key: ServiceType) -> Result<Instance> {
        let primary = match binding.cached() {
            Some(instance) => instance.clone(),
            None => {
                // Reject cycles before any cell is locked, so two threads
                // entering a cycle from opposite ends cannot deadlock
                if ConstructionGuard::is_idle() {
                    CycleWalk::default().visit_binding(self, binding)?;
                }

                let _guard = ConstructionGuard::enter(binding)?;
                binding.get_or_construct(|specs| self.resolve_dependencies(binding, specs))?
            }
        };

        binding.view(&primary, key)
    }

    /// Resolve a factory's parameters.
    ///
    /// A parameter of the factory's own type decorates the inherited service
    /// and is resolved from the parent scope.
    fn resolve_dependencies(&self, binding: &Binding, specs: &[DependencySpec]) -> Result<Vec<Resolved>> {
        specs
            .iter()
            .map(|spec| {
                if spec.service != binding.service() {
                    return self.resolve_spec(*spec);
                }
                match self.parent() {
                    Some(parent) => parent.resolve_spec(*spec),
                    None => match spec.kind {
                        DependencyKind::Single => Err(RegistryError::UnknownService {
                            type_name: spec.service.name(),
                            scope: self.to_string(),
                        }),
                        DependencyKind::Optional => Ok(Resolved::Optional(None)),
                        DependencyKind::All => Ok(Resolved::All(Vec::new())),
                    },
                }
            })
            .collect()
    }

    /// Close this scope and its ancestors for registration
    fn seal(&self) {
        for scope in self.ancestry() {
            if scope.inner.sealed.swap(true, Ordering::AcqRel) {
                break;
            }

            #[cfg(feature = "logging")]
            debug!(
                target: TARGET,
                scope = %scope,
                services = scope.len(),
                "Scope sealed - no further registrations allowed"
            );
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Check if any scope in the chain binds `T`.
    #[inline]
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        let key = ServiceType::of::<T>();
        self.ancestry().any(|scope| scope.inner.table.contains(key))
    }

    /// Check if this scope itself binds `T`.
    #[inline]
    pub fn contains_local<T: ?Sized + 'static>(&self) -> bool {
        self.inner.table.contains(ServiceType::of::<T>())
    }

    /// Primary types bound in this scope, in registration order
    pub fn service_types(&self) -> Vec<ServiceType> {
        self.inner.table.service_types()
    }

    /// Number of bindings in this scope (not counting ancestors)
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.table.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.table.is_empty()
    }

    #[inline]
    pub fn parent(&self) -> Option<&Scope> {
        self.inner.parent.as_ref()
    }

    /// Distance from the root scope
    #[inline]
    pub fn depth(&self) -> u32 {
        self.inner.depth
    }

    #[inline]
    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Whether lookups have closed this scope for registration
    #[inline]
    pub fn is_sealed(&self) -> bool {
        self.inner.sealed.load(Ordering::Acquire)
    }

    /// Check whether two handles refer to the same scope
    #[inline]
    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// This scope followed by its ancestors, nearest first
    fn ancestry(&self) -> impl Iterator<Item = &Scope> {
        std::iter::successors(Some(self), |scope| scope.parent())
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.name {
            Some(name) => write!(f, "{} ({})", name, self.inner.id),
            None => write!(f, "{}", self.inner.id),
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("depth", &self.inner.depth)
            .field("bindings", &self.inner.table.len())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}

fn downcast_instance<T: ?Sized + Injectable>(instance: &Instance) -> Result<Arc<T>> {
    instance.downcast::<T>().ok_or_else(|| {
        RegistryError::Internal(format!(
            "binding for {} holds a value of another type",
            std::any::type_name::<T>()
        ))
    })
}

// =============================================================================
// Cycle detection
// =============================================================================

thread_local! {
    /// Bindings under construction on this thread, outermost first
    static CONSTRUCTING: RefCell<Vec<(u64, &'static str)>> = const { RefCell::new(Vec::new()) };
}

/// Marks a binding as in progress for as long as it lives.
struct ConstructionGuard;

impl ConstructionGuard {
    fn is_idle() -> bool {
        CONSTRUCTING.with(|stack| stack.borrow().is_empty())
    }

    fn enter(binding: &Binding) -> Result<Self> {
        CONSTRUCTING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(start) = stack.iter().position(|(id, _)| *id == binding.id()) {
                let mut chain: Vec<_> = stack[start..].iter().map(|(_, name)| *name).collect();
                chain.push(binding.service().name());
                return Err(RegistryError::CyclicDependency { chain });
            }
            stack.push((binding.id(), binding.service().name()));
            Ok(ConstructionGuard)
        })
    }
}

impl Drop for ConstructionGuard {
    fn drop(&mut self) {
        CONSTRUCTING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Depth-first walk over the declared dependencies of unbuilt bindings.
#[derive(Default)]
struct CycleWalk {
    path: Vec<(u64, &'static str)>,
    finished: AHashSet<u64>,
}

impl CycleWalk {
    fn visit_key(&mut self, scope: &Scope, spec: DependencySpec) -> Result<()> {
        match spec.kind {
            DependencyKind::All => {
                for owner in scope.ancestry() {
                    for binding in owner.inner.table.lookup(spec.service) {
                        self.visit_binding(owner, &binding)?;
                    }
                }
            }
            DependencyKind::Single | DependencyKind::Optional => {
                // Missing or ambiguous keys fail later with a precise error
                if let Some((owner, bindings)) = scope.locate(spec.service) {
                    if let [binding] = bindings.as_slice() {
                        self.visit_binding(owner, binding)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn visit_binding(&mut self, owner: &Scope, binding: &Binding) -> Result<()> {
        if binding.cached().is_some() || self.finished.contains(&binding.id()) {
            return Ok(());
        }

        if let Some(start) = self.path.iter().position(|(id, _)| *id == binding.id()) {
            let mut chain: Vec<_> = self.path[start..].iter().map(|(_, name)| *name).collect();
            chain.push(binding.service().name());

            #[cfg(feature = "logging")]
            debug!(
                target: TARGET,
                scope = %owner,
                cycle = %chain.join(" -> "),
                "Cyclic dependency detected"
            );

            return Err(RegistryError::CyclicDependency { chain });
        }

        self.path.push((binding.id(), binding.service().name()));
        for spec in binding.dependencies() {
            if spec.service == binding.service() {
                if let Some(parent) = owner.parent() {
                    self.visit_key(parent, *spec)?;
                }
            } else {
                self.visit_key(owner, *spec)?;
            }
        }
        self.path.pop();
        self.finished.insert(binding.id());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    struct GlobalService;

    struct RequestService {
        id: String,
    }

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;
    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    struct French;
    impl Greeter for French {
        fn greet(&self) -> String {
            "bonjour".into()
        }
    }

    #[test]
    fn test_child_sees_parent() {
        let root = Scope::new();
        root.register(GlobalService).unwrap();

        let child = root.child();
        child
            .register(RequestService { id: "req-1".into() })
            .unwrap();

        assert!(child.contains::<GlobalService>());
        assert!(child.contains::<RequestService>());
        assert!(!child.contains_local::<GlobalService>());
        assert!(!root.contains::<RequestService>());
        assert_eq!(child.depth(), 1);
        assert!(child.parent().unwrap().ptr_eq(&root));
    }

    #[test]
    fn test_unknown_service_names_type() {
        let scope = Scope::new();
        let err = scope.get::<RequestService>().err().unwrap();
        assert!(matches!(err, RegistryError::UnknownService { .. }));
        assert!(err.to_string().contains("RequestService"));
        assert!(scope.try_get::<RequestService>().unwrap().is_none());
    }

    #[test]
    fn test_lookup_seals_scope_and_ancestors() {
        let root = Scope::new();
        let child = root.child();
        assert!(!root.is_sealed());

        let _ = child.try_get::<GlobalService>();
        assert!(child.is_sealed());
        assert!(root.is_sealed());

        let err = root.register(GlobalService).unwrap_err();
        assert!(matches!(err, RegistryError::LateRegistration { .. }));

        // A fresh child of a sealed parent is still open
        let late = root.child();
        late.register(GlobalService).unwrap();
    }

    #[test]
    fn test_factory_invoked_once() {
        static CALLS: AtomicU32 = AtomicU32::new(0);

        let scope = Scope::new();
        scope
            .register_factory(FactoryDescriptor::new("create_request_service", |(): ()| {
                CALLS.fetch_add(1, Ordering::SeqCst);
                Ok(RequestService { id: "lazy".into() })
            }))
            .unwrap();

        assert_eq!(CALLS.load(Ordering::SeqCst), 0);
        let a = scope.get::<RequestService>().unwrap();
        let b = scope.get::<RequestService>().unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.id, "lazy");
    }

    #[test]
    fn test_exposed_supertypes_and_ambiguity() {
        let scope = Scope::new();
        scope
            .register_instance(InstanceDescriptor::new(English).exposed_as::<dyn Greeter, _>(|g| g))
            .unwrap();
        scope
            .register_instance(InstanceDescriptor::new(French).exposed_as::<dyn Greeter, _>(|g| g))
            .unwrap();

        let err = scope.get::<dyn Greeter>().err().unwrap();
        assert!(matches!(err, RegistryError::AmbiguousService { count: 2, .. }));

        let greetings: Vec<_> = scope
            .get_all::<dyn Greeter>()
            .unwrap()
            .iter()
            .map(|g| g.greet())
            .collect();
        assert_eq!(greetings, vec!["hello", "bonjour"]);

        // Primary types stay unambiguous
        assert_eq!(scope.get::<French>().unwrap().greet(), "bonjour");
    }

    #[test]
    fn test_duplicate_binding() {
        let scope = Scope::new();
        scope.register(GlobalService).unwrap();
        let err = scope
            .register_factory(FactoryDescriptor::new("create_global_service", |(): ()| {
                Ok(GlobalService)
            }))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateBinding { .. }));
        assert_eq!(scope.len(), 1);
    }

    #[test]
    fn test_self_dependency_resolves_from_parent() {
        struct Counter(u32);

        let root = Scope::new();
        root.register(Counter(1)).unwrap();

        let child = root.child();
        child
            .register_factory(FactoryDescriptor::new(
                "create_counter",
                |(parent,): (Arc<Counter>,)| Ok(Counter(parent.0 + 1)),
            ))
            .unwrap();

        assert_eq!(child.get::<Counter>().unwrap().0, 2);
        assert_eq!(root.get::<Counter>().unwrap().0, 1);
    }

    #[test]
    fn test_cycle_is_reported() {
        struct Left;
        struct Right;

        let scope = Scope::new();
        scope
            .register_factory(FactoryDescriptor::new("create_left", |(_,): (Arc<Right>,)| {
                Ok(Left)
            }))
            .unwrap();
        scope
            .register_factory(FactoryDescriptor::new("create_right", |(_,): (Arc<Left>,)| {
                Ok(Right)
            }))
            .unwrap();

        let err = scope.get::<Left>().err().unwrap();
        let chain = err.cycle().unwrap();
        assert_eq!(chain.len(), 3);
        assert!(chain[0].ends_with("Left"));
        assert!(chain[1].ends_with("Right"));
        assert!(chain[2].ends_with("Left"));

        // Nothing was left half-built
        assert!(scope.get::<Right>().is_err());
    }

    #[test]
    fn test_factory_of() {
        #[derive(Default)]
        struct PatternSet {
            includes: Vec<String>,
        }

        let root = Scope::new();
        root.register_factory_of(PatternSet::default).unwrap();
        let child = root.child();
        child
            .register_factory_of(|| PatternSet {
                includes: vec!["*.rs".into()],
            })
            .unwrap();

        assert_eq!(child.get_factory::<PatternSet>().unwrap().create().includes.len(), 1);
        assert_eq!(child.get_factories::<PatternSet>().unwrap().len(), 2);
        assert!(root.get_factory::<PatternSet>().unwrap().create().includes.is_empty());
    }

    #[test]
    fn test_scope_display() {
        let scope = Scope::new();
        assert!(scope.to_string().starts_with("scope-"));
        assert_ne!(Scope::new().id(), scope.id());
    }
}
