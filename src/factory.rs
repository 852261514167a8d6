//! Bindings: how a scope obtains an instance of a service type
//!
//! A binding is either a pre-built instance or a factory with a declared
//! dependency list and a single-flight cache. Registration actions live here
//! too; they are bindings of a sort, run exactly once while a scope is built.

use crate::builder::ServiceRegistration;
use crate::dependency::{Dependencies, DependencySpec, Factory, Resolved};
use crate::provider::{Injectable, ServiceType};
use crate::{RegistryError, Result};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "logging")]
use tracing::{debug, trace};
#[cfg(feature = "logging")]
use crate::logging::TARGET;

// =============================================================================
// Type-erased instances
// =============================================================================

/// A type-erased `Arc<T>`.
///
/// The `Arc<T>` itself is stored behind `dyn Any`, so unsized service types
/// (`dyn Trait`) are erased the same way as concrete ones.
#[derive(Clone)]
pub struct Instance(Arc<dyn Any + Send + Sync>);

impl Instance {
    #[inline]
    pub fn new<T: ?Sized + Injectable>(value: Arc<T>) -> Self {
        Self(Arc::new(value))
    }

    /// Recover the typed `Arc`, `None` if the instance holds another type
    #[inline]
    pub fn downcast<T: ?Sized + Injectable>(&self) -> Option<Arc<T>> {
        self.0.downcast_ref::<Arc<T>>().cloned()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Instance")
    }
}

/// Converts the primary instance of a binding into one of its exposed types
type Cast = Arc<dyn Fn(&Instance) -> Result<Instance> + Send + Sync>;

fn cast_between<T, U, F>(cast: F) -> Cast
where
    T: ?Sized + Injectable,
    U: ?Sized + Injectable,
    F: Fn(Arc<T>) -> Arc<U> + Send + Sync + 'static,
{
    Arc::new(move |instance: &Instance| {
        let value = instance.downcast::<T>().ok_or_else(|| {
            RegistryError::Internal(format!(
                "cannot expose {} as {}: primary value has another type",
                std::any::type_name::<T>(),
                std::any::type_name::<U>()
            ))
        })?;
        Ok(Instance::new(cast(value)))
    })
}

// =============================================================================
// Descriptors
// =============================================================================

/// Type-erased constructor: resolved dependencies in, primary instance out
type Constructor = Box<dyn Fn(Vec<Resolved>) -> Result<Instance> + Send + Sync>;

/// A factory for one service type with its declared dependencies.
///
/// Built by `#[provider]` for every `create_*` method, or by hand:
///
/// ```rust
/// use service_registry::{FactoryDescriptor, Scope};
/// use std::sync::Arc;
///
/// struct Settings { dir: String }
/// struct Resolver { base: String }
///
/// let scope = Scope::new();
/// scope.register(Settings { dir: "/work".into() }).unwrap();
/// scope
///     .register_factory(FactoryDescriptor::new(
///         "create_resolver",
///         |(settings,): (Arc<Settings>,)| Ok(Resolver { base: settings.dir.clone() }),
///     ))
///     .unwrap();
///
/// assert_eq!(scope.get::<Resolver>().unwrap().base, "/work");
/// ```
pub struct FactoryDescriptor {
    name: Cow<'static, str>,
    service: ServiceType,
    dependencies: Vec<DependencySpec>,
    exposed: Vec<(ServiceType, Cast)>,
    construct: Constructor,
}

impl FactoryDescriptor {
    /// A factory producing an owned `T`
    pub fn new<T, D, F>(name: impl Into<Cow<'static, str>>, factory: F) -> Self
    where
        T: Injectable,
        D: Dependencies,
        F: Fn(D) -> Result<T> + Send + Sync + 'static,
    {
        Self::from_arc(name, move |deps: D| factory(deps).map(Arc::new))
    }

    /// A factory producing a shared `Arc<T>`; `T` may be a trait object
    pub fn from_arc<T, D, F>(name: impl Into<Cow<'static, str>>, factory: F) -> Self
    where
        T: ?Sized + Injectable,
        D: Dependencies,
        F: Fn(D) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            service: ServiceType::of::<T>(),
            dependencies: D::specs(),
            exposed: Vec::new(),
            construct: Box::new(move |resolved| {
                let deps = D::extract(resolved)?;
                factory(deps).map(Instance::new)
            }),
        }
    }

    /// Also bind the produced service under the supertype `U`.
    ///
    /// `T` must be the produced type; a mismatch surfaces as `Internal` on
    /// lookup of `U`.
    pub fn exposed_as<U, T, F>(mut self, cast: F) -> Self
    where
        U: ?Sized + Injectable,
        T: ?Sized + Injectable,
        F: Fn(Arc<T>) -> Arc<U> + Send + Sync + 'static,
    {
        self.exposed.push((ServiceType::of::<U>(), cast_between(cast)));
        self
    }

    /// The produced type
    #[inline]
    pub fn service(&self) -> ServiceType {
        self.service
    }

    /// Declared dependencies in parameter order
    #[inline]
    pub fn dependencies(&self) -> &[DependencySpec] {
        &self.dependencies
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_binding(self) -> Binding {
        Binding {
            id: next_binding_id(),
            service: self.service,
            origin: self.name,
            exposed: self
                .exposed
                .into_iter()
                .map(|(service, cast)| Exposure {
                    service,
                    view: ExposedView::Lazy {
                        cast,
                        cell: OnceCell::new(),
                    },
                })
                .collect(),
            kind: BindingKind::Factory {
                dependencies: self.dependencies,
                construct: self.construct,
                cell: OnceCell::new(),
            },
        }
    }
}

impl fmt::Debug for FactoryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryDescriptor")
            .field("name", &self.name)
            .field("service", &self.service)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// A pre-built instance and the supertypes it is also bound as.
///
/// ```rust
/// use service_registry::{InstanceDescriptor, Scope};
///
/// trait Greeter: Send + Sync { fn greet(&self) -> String; }
/// struct English;
/// impl Greeter for English { fn greet(&self) -> String { "hello".into() } }
///
/// let scope = Scope::new();
/// scope
///     .register_instance(InstanceDescriptor::new(English).exposed_as::<dyn Greeter, _>(|g| g))
///     .unwrap();
///
/// assert_eq!(scope.get::<dyn Greeter>().unwrap().greet(), "hello");
/// ```
pub struct InstanceDescriptor<T: ?Sized> {
    value: Arc<T>,
    exposed: Vec<(ServiceType, Instance)>,
}

impl<T: Injectable> InstanceDescriptor<T> {
    #[inline]
    pub fn new(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }
}

impl<T: ?Sized + Injectable> InstanceDescriptor<T> {
    #[inline]
    pub fn from_arc(value: Arc<T>) -> Self {
        Self {
            value,
            exposed: Vec::new(),
        }
    }

    /// Also bind the instance under the supertype `U`
    pub fn exposed_as<U, F>(mut self, cast: F) -> Self
    where
        U: ?Sized + Injectable,
        F: FnOnce(Arc<T>) -> Arc<U>,
    {
        let view = cast(Arc::clone(&self.value));
        self.exposed.push((ServiceType::of::<U>(), Instance::new(view)));
        self
    }

    pub(crate) fn into_binding(self) -> Binding {
        Binding {
            id: next_binding_id(),
            service: ServiceType::of::<T>(),
            origin: Cow::Borrowed("instance"),
            exposed: self
                .exposed
                .into_iter()
                .map(|(service, instance)| Exposure {
                    service,
                    view: ExposedView::Ready(instance),
                })
                .collect(),
            kind: BindingKind::Instance(Instance::new(self.value)),
        }
    }
}

/// Build the factory-of binding for `T`
pub(crate) fn factory_of<T, F>(create: F) -> InstanceDescriptor<Factory<T>>
where
    T: 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    InstanceDescriptor::new(Factory::new(create))
}

// =============================================================================
// Registration actions
// =============================================================================

type ActionFn = Box<dyn FnOnce(&ServiceRegistration<'_>) -> Result<()> + Send>;

/// A callback run exactly once while a scope is being built.
///
/// Actions may look services up and register further bindings. They run in
/// declaration order; a failing action aborts construction of the scope.
pub struct RegistrationAction {
    name: Cow<'static, str>,
    run: ActionFn,
}

impl RegistrationAction {
    pub fn new<F>(name: impl Into<Cow<'static, str>>, action: F) -> Self
    where
        F: FnOnce(&ServiceRegistration<'_>) -> Result<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            run: Box::new(action),
        }
    }

    /// An action whose extra parameters are resolved from the scope first
    pub fn with_dependencies<D, F>(name: impl Into<Cow<'static, str>>, action: F) -> Self
    where
        D: Dependencies,
        F: FnOnce(&ServiceRegistration<'_>, D) -> Result<()> + Send + 'static,
    {
        Self::new(name, move |registration: &ServiceRegistration<'_>| {
            let deps = registration.resolve_dependencies::<D>()?;
            action(registration, deps)
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (Cow<'static, str>, ActionFn) {
        (self.name, self.run)
    }
}

impl fmt::Debug for RegistrationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationAction")
            .field("name", &self.name)
            .finish()
    }
}

// =============================================================================
// Bindings
// =============================================================================

fn next_binding_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

enum ExposedView {
    Ready(Instance),
    Lazy {
        cast: Cast,
        cell: OnceCell<Instance>,
    },
}

struct Exposure {
    service: ServiceType,
    view: ExposedView,
}

enum BindingKind {
    Instance(Instance),
    Factory {
        dependencies: Vec<DependencySpec>,
        construct: Constructor,
        cell: OnceCell<Instance>,
    },
}

/// One entry of a binding table.
pub(crate) struct Binding {
    id: u64,
    service: ServiceType,
    origin: Cow<'static, str>,
    exposed: Vec<Exposure>,
    kind: BindingKind,
}

impl Binding {
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The primary type
    #[inline]
    pub fn service(&self) -> ServiceType {
        self.service
    }

    /// Factory name, or `"instance"`
    #[inline]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Every key this binding answers to, primary first
    pub fn keys(&self) -> impl Iterator<Item = ServiceType> + '_ {
        std::iter::once(self.service).chain(self.exposed.iter().map(|e| e.service))
    }

    pub fn dependencies(&self) -> &[DependencySpec] {
        match &self.kind {
            BindingKind::Instance(_) => &[],
            BindingKind::Factory { dependencies, .. } => dependencies,
        }
    }

    pub fn is_factory(&self) -> bool {
        matches!(self.kind, BindingKind::Factory { .. })
    }

    /// The primary instance, if it exists already
    pub fn cached(&self) -> Option<&Instance> {
        match &self.kind {
            BindingKind::Instance(instance) => Some(instance),
            BindingKind::Factory { cell, .. } => cell.get(),
        }
    }

    /// The primary instance, constructing it on first access.
    ///
    /// `resolve` turns the declared dependencies into values. Concurrent
    /// callers block until the first construction finishes; a failed
    /// construction leaves the binding unbuilt.
    pub fn get_or_construct<R>(&self, resolve: R) -> Result<Instance>
    where
        R: FnOnce(&[DependencySpec]) -> Result<Vec<Resolved>>,
    {
        match &self.kind {
            BindingKind::Instance(instance) => Ok(instance.clone()),
            BindingKind::Factory {
                dependencies,
                construct,
                cell,
            } => {
                if let Some(instance) = cell.get() {
                    #[cfg(feature = "logging")]
                    trace!(
                        target: TARGET,
                        service = self.service.name(),
                        "Factory already invoked, returning cached instance"
                    );
                    return Ok(instance.clone());
                }

                cell.get_or_try_init(|| {
                    #[cfg(feature = "logging")]
                    debug!(
                        target: TARGET,
                        service = self.service.name(),
                        factory = %self.origin,
                        dependencies = dependencies.len(),
                        "Invoking factory on first access"
                    );

                    let resolved = resolve(dependencies)?;
                    construct(resolved)
                })
                .cloned()
            }
        }
    }

    /// View a primary instance as `key`, which must be one of `keys()`
    pub fn view(&self, primary: &Instance, key: ServiceType) -> Result<Instance> {
        if key == self.service {
            return Ok(primary.clone());
        }

        let exposure = self
            .exposed
            .iter()
            .find(|e| e.service == key)
            .ok_or_else(|| {
                RegistryError::Internal(format!(
                    "binding for {} does not expose {}",
                    self.service, key
                ))
            })?;

        match &exposure.view {
            ExposedView::Ready(instance) => Ok(instance.clone()),
            ExposedView::Lazy { cast, cell } => cell.get_or_try_init(|| cast(primary)).cloned(),
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("service", &self.service)
            .field("origin", &self.origin)
            .field("factory", &self.is_factory())
            .field("built", &self.cached().is_some())
            .finish()
    }
}
