//! Typed factory dependencies
//!
//! A factory declares what it needs through the types of its parameters.
//! Each parameter type maps to a [`DependencySpec`] (what to look up and how)
//! and knows how to rebuild itself from the resolved value.
//!
//! # Supported Dependency Types
//!
//! - `Arc<T>` - single required service
//! - `Option<Arc<T>>` - single optional service
//! - `Vec<Arc<T>>` - every service of type `T` in the scope chain
//! - `Factory<T>` - the factory-of binding producing `T`
//! - tuples of the above (up to 12) for a whole parameter list

use crate::factory::Instance;
use crate::provider::{Injectable, ServiceType};
use crate::{RegistryError, Result};
use std::fmt;
use std::sync::Arc;

/// How a dependency is looked up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    /// Exactly one service, failing when absent
    Single,
    /// At most one service, `None` when absent
    Optional,
    /// Every service of the type across the scope chain
    All,
}

/// A declared dependency of a factory or registration action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencySpec {
    pub service: ServiceType,
    pub kind: DependencyKind,
}

impl DependencySpec {
    #[inline]
    pub fn new(service: ServiceType, kind: DependencyKind) -> Self {
        Self { service, kind }
    }
}

/// A resolved dependency, still type-erased
pub enum Resolved {
    Single(Instance),
    Optional(Option<Instance>),
    All(Vec<Instance>),
}

impl Resolved {
    fn kind(&self) -> DependencyKind {
        match self {
            Resolved::Single(_) => DependencyKind::Single,
            Resolved::Optional(_) => DependencyKind::Optional,
            Resolved::All(_) => DependencyKind::All,
        }
    }
}

fn mismatch<T: ?Sized + 'static>(expected: DependencyKind, found: DependencyKind) -> RegistryError {
    RegistryError::Internal(format!(
        "dependency {} resolved as {:?}, expected {:?}",
        std::any::type_name::<T>(),
        found,
        expected
    ))
}

fn downcast<T: ?Sized + Injectable>(instance: &Instance) -> Result<Arc<T>> {
    instance.downcast::<T>().ok_or_else(|| {
        RegistryError::Internal(format!(
            "binding for {} holds a value of another type",
            std::any::type_name::<T>()
        ))
    })
}

/// A single factory parameter.
pub trait Dependency: Sized + 'static {
    /// What to look up
    fn spec() -> DependencySpec;

    /// Rebuild the parameter from its resolved value
    fn extract(resolved: Resolved) -> Result<Self>;
}

impl<T: ?Sized + Injectable> Dependency for Arc<T> {
    #[inline]
    fn spec() -> DependencySpec {
        DependencySpec::new(ServiceType::of::<T>(), DependencyKind::Single)
    }

    fn extract(resolved: Resolved) -> Result<Self> {
        match resolved {
            Resolved::Single(instance) => downcast::<T>(&instance),
            other => Err(mismatch::<T>(DependencyKind::Single, other.kind())),
        }
    }
}

impl<T: ?Sized + Injectable> Dependency for Option<Arc<T>> {
    #[inline]
    fn spec() -> DependencySpec {
        DependencySpec::new(ServiceType::of::<T>(), DependencyKind::Optional)
    }

    fn extract(resolved: Resolved) -> Result<Self> {
        match resolved {
            Resolved::Optional(instance) => instance.as_ref().map(downcast::<T>).transpose(),
            other => Err(mismatch::<T>(DependencyKind::Optional, other.kind())),
        }
    }
}

impl<T: ?Sized + Injectable> Dependency for Vec<Arc<T>> {
    #[inline]
    fn spec() -> DependencySpec {
        DependencySpec::new(ServiceType::of::<T>(), DependencyKind::All)
    }

    fn extract(resolved: Resolved) -> Result<Self> {
        match resolved {
            Resolved::All(instances) => instances.iter().map(downcast::<T>).collect(),
            other => Err(mismatch::<T>(DependencyKind::All, other.kind())),
        }
    }
}

impl<T: 'static> Dependency for Factory<T> {
    #[inline]
    fn spec() -> DependencySpec {
        DependencySpec::new(ServiceType::of::<Factory<T>>(), DependencyKind::Single)
    }

    fn extract(resolved: Resolved) -> Result<Self> {
        match resolved {
            Resolved::Single(instance) => downcast::<Factory<T>>(&instance).map(|f| (*f).clone()),
            other => Err(mismatch::<Factory<T>>(DependencyKind::Single, other.kind())),
        }
    }
}

/// A whole parameter list: `()` or a tuple of [`Dependency`] types.
pub trait Dependencies: Sized + 'static {
    /// Specs in parameter order
    fn specs() -> Vec<DependencySpec>;

    /// Rebuild the parameter list from values resolved in spec order
    fn extract(resolved: Vec<Resolved>) -> Result<Self>;
}

impl Dependencies for () {
    #[inline]
    fn specs() -> Vec<DependencySpec> {
        Vec::new()
    }

    #[inline]
    fn extract(_resolved: Vec<Resolved>) -> Result<Self> {
        Ok(())
    }
}

// Tuple implementations (1-12 elements)
macro_rules! impl_dependencies_tuple {
    ($($T:ident),+) => {
        impl<$($T: Dependency),+> Dependencies for ($($T,)+) {
            fn specs() -> Vec<DependencySpec> {
                vec![$($T::spec()),+]
            }

            fn extract(resolved: Vec<Resolved>) -> Result<Self> {
                let mut values = resolved.into_iter();
                Ok(($(
                    $T::extract(values.next().ok_or_else(|| {
                        RegistryError::Internal("fewer resolved dependencies than declared".into())
                    })?)?,
                )+))
            }
        }
    };
}

impl_dependencies_tuple!(A);
impl_dependencies_tuple!(A, B);
impl_dependencies_tuple!(A, B, C);
impl_dependencies_tuple!(A, B, C, D);
impl_dependencies_tuple!(A, B, C, D, E);
impl_dependencies_tuple!(A, B, C, D, E, F);
impl_dependencies_tuple!(A, B, C, D, E, F, G);
impl_dependencies_tuple!(A, B, C, D, E, F, G, H);
impl_dependencies_tuple!(A, B, C, D, E, F, G, H, I);
impl_dependencies_tuple!(A, B, C, D, E, F, G, H, I, J);
impl_dependencies_tuple!(A, B, C, D, E, F, G, H, I, J, K);
impl_dependencies_tuple!(A, B, C, D, E, F, G, H, I, J, K, L);

// =============================================================================
// Factory-of bindings
// =============================================================================

/// Produces fresh `T` values on demand.
///
/// Bound in a scope with `register_factory_of` and looked up by the type it
/// produces through `get_factory::<T>()`. Useful for template objects that
/// every caller must own separately.
///
/// ```rust
/// use service_registry::Scope;
///
/// #[derive(Default)]
/// struct PatternSet { includes: Vec<String> }
///
/// let scope = Scope::new();
/// scope.register_factory_of(PatternSet::default).unwrap();
///
/// let patterns = scope.get_factory::<PatternSet>().unwrap();
/// let mut first = patterns.create();
/// first.includes.push("**/*.rs".into());
/// assert!(patterns.create().includes.is_empty());
/// ```
pub struct Factory<T> {
    create: Arc<dyn Fn() -> T + Send + Sync>,
}

impl<T> Factory<T> {
    pub fn new<F>(create: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            create: Arc::new(create),
        }
    }

    /// Create a new value
    #[inline]
    pub fn create(&self) -> T {
        (self.create)()
    }
}

impl<T> Clone for Factory<T> {
    fn clone(&self) -> Self {
        Self {
            create: Arc::clone(&self.create),
        }
    }
}

impl<T> fmt::Debug for Factory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Factory<{}>", std::any::type_name::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Config {
        debug: bool,
    }

    trait Sink: Send + Sync {
        fn name(&self) -> &str;
    }

    struct Console;

    impl Sink for Console {
        fn name(&self) -> &str {
            "console"
        }
    }

    fn instance<T: Injectable>(value: T) -> Instance {
        Instance::new(Arc::new(value))
    }

    #[test]
    fn test_specs_follow_parameter_order() {
        let specs = <(Arc<Config>, Option<Arc<dyn Sink>>, Vec<Arc<dyn Sink>>)>::specs();
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].service, ServiceType::of::<Config>());
        assert_eq!(specs[0].kind, DependencyKind::Single);
        assert_eq!(specs[1].kind, DependencyKind::Optional);
        assert_eq!(specs[2].service, ServiceType::of::<dyn Sink>());
        assert_eq!(specs[2].kind, DependencyKind::All);
        assert!(<()>::specs().is_empty());
    }

    #[test]
    fn test_extract_single_and_all() {
        let sink: Arc<dyn Sink> = Arc::new(Console);
        let resolved = vec![
            Resolved::Single(instance(Config { debug: true })),
            Resolved::All(vec![Instance::new(sink.clone()), Instance::new(sink)]),
        ];

        let (config, sinks) = <(Arc<Config>, Vec<Arc<dyn Sink>>)>::extract(resolved).unwrap();
        assert!(config.debug);
        assert_eq!(sinks.len(), 2);
        assert_eq!(sinks[0].name(), "console");
    }

    #[test]
    fn test_single_and_collection_are_not_conflated() {
        let result = <(Arc<Config>,)>::extract(vec![Resolved::All(Vec::new())]);
        assert!(matches!(result, Err(RegistryError::Internal(_))));

        let result = <(Vec<Arc<Config>>,)>::extract(vec![Resolved::Single(instance(Config {
            debug: false,
        }))]);
        assert!(result.is_err());
    }

    #[test]
    fn test_optional_absent() {
        let (config,) = <(Option<Arc<Config>>,)>::extract(vec![Resolved::Optional(None)]).unwrap();
        assert!(config.is_none());
    }

    #[test]
    fn test_factory_creates_fresh_values() {
        let factory = Factory::new(|| vec![1, 2, 3]);
        let mut a = factory.create();
        a.push(4);
        assert_eq!(factory.create(), vec![1, 2, 3]);
        assert_eq!(
            Factory::<Vec<i32>>::spec().service,
            ServiceType::of::<Factory<Vec<i32>>>()
        );
    }
}
