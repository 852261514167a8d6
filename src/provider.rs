//! Provider traits and service type keys
//!
//! These define what can live in a scope, how it is keyed, and how a group
//! of factory methods is handed to a scope under construction.

use crate::factory::{FactoryDescriptor, RegistrationAction};
use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Marker trait for types that can be bound in a scope.
///
/// Automatically implemented for every `Send + Sync + 'static` type,
/// including unsized ones such as `dyn Trait`, which is how interfaces are
/// requested.
pub trait Injectable: Send + Sync + 'static {}

// Blanket implementation - everything that's Send + Sync + 'static is Injectable
impl<T: ?Sized + Send + Sync + 'static> Injectable for T {}

/// Identity of a service type used as a lookup key.
///
/// Equality and hashing use the `TypeId` only; the name is carried along
/// for error messages and logs.
#[derive(Clone, Copy)]
pub struct ServiceType {
    id: TypeId,
    name: &'static str,
}

impl ServiceType {
    /// The key for `T`
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying `TypeId`
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Human-readable type name
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ServiceType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceType {}

impl Hash for ServiceType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A group of factory methods and registration actions contributed to a scope.
///
/// Usually generated by `#[provider]` from `create_*` and `configure_*`
/// methods, but can be written by hand:
///
/// ```rust
/// use service_registry::{FactoryDescriptor, Provider, Scope};
/// use std::sync::Arc;
///
/// struct Greeting(String);
///
/// struct GreetingServices;
///
/// impl Provider for GreetingServices {
///     fn factories(self: Arc<Self>) -> Vec<FactoryDescriptor> {
///         vec![FactoryDescriptor::new("create_greeting", |(): ()| {
///             Ok(Greeting("hello".into()))
///         })]
///     }
/// }
///
/// let scope = Scope::builder().provider(GreetingServices).build().unwrap();
/// assert_eq!(scope.get::<Greeting>().unwrap().0, "hello");
/// ```
pub trait Provider: Send + Sync + 'static {
    /// Factory descriptors, in declaration order.
    fn factories(self: Arc<Self>) -> Vec<FactoryDescriptor>;

    /// Registration actions, in declaration order.
    fn actions(self: Arc<Self>) -> Vec<RegistrationAction> {
        Vec::new()
    }
}
