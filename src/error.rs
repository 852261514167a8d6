//! Error types for registry operations

use std::error::Error as StdError;
use thiserror::Error;

/// Boxed error produced by a factory body.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors that can occur while building scopes or resolving services.
///
/// All of these are wiring errors: none are transient and none are retried.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// No binding for the type anywhere in the scope chain
    #[error("No service of type {type_name} available in {scope}")]
    UnknownService {
        type_name: &'static str,
        scope: String,
    },

    /// Several bindings in one scope expose the requested type
    #[error("Multiple services of type {type_name} available in {scope} ({count} candidates)")]
    AmbiguousService {
        type_name: &'static str,
        scope: String,
        count: usize,
    },

    /// Explicit registration of a type already bound in the scope
    #[error("Service {type_name} is already registered in {scope}")]
    DuplicateBinding {
        type_name: &'static str,
        scope: String,
    },

    /// Two providers of one scope declare the same return type
    #[error("Conflicting providers for {type_name} in {scope}: {first} and {second}")]
    BindingConflict {
        type_name: &'static str,
        scope: String,
        first: String,
        second: String,
    },

    /// Resolution re-entered a binding that is still being constructed
    #[error("Cyclic dependency between services: {}", .chain.join(" -> "))]
    CyclicDependency { chain: Vec<&'static str> },

    /// Registration after the scope was opened for lookups
    #[error("Cannot register {type_name} in {scope}: lookups have already started")]
    LateRegistration {
        type_name: &'static str,
        scope: String,
    },

    /// A registration action failed; the scope was not built
    #[error("Registration action '{action}' failed while building {scope}")]
    Registration {
        scope: String,
        action: String,
        #[source]
        source: Box<RegistryError>,
    },

    /// A factory returned an error
    #[error("Failed to create service {type_name}")]
    CreationFailed {
        type_name: &'static str,
        #[source]
        source: BoxError,
    },

    /// A configured location is neither a URL nor a usable file path
    #[error("Invalid location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    /// Settings configuration could not be loaded
    #[cfg(feature = "config")]
    #[error("Failed to load configuration")]
    Config(#[source] Box<figment::Error>),

    /// Internal invariant violated
    #[error("Internal registry error: {0}")]
    Internal(String),
}

impl RegistryError {
    /// Create an UnknownService error for a type
    #[inline]
    pub fn unknown<T: ?Sized + 'static>(scope: impl ToString) -> Self {
        Self::UnknownService {
            type_name: std::any::type_name::<T>(),
            scope: scope.to_string(),
        }
    }

    /// Create a CreationFailed error for a type
    #[inline]
    pub fn creation_failed<T: ?Sized + 'static>(source: impl Into<BoxError>) -> Self {
        Self::CreationFailed {
            type_name: std::any::type_name::<T>(),
            source: source.into(),
        }
    }

    /// Create a LateRegistration error for a type
    #[inline]
    pub fn late_registration<T: ?Sized + 'static>(scope: impl ToString) -> Self {
        Self::LateRegistration {
            type_name: std::any::type_name::<T>(),
            scope: scope.to_string(),
        }
    }

    /// Create an InvalidLocation error
    pub fn invalid_location(location: &str, reason: impl ToString) -> Self {
        Self::InvalidLocation {
            location: location.to_owned(),
            reason: reason.to_string(),
        }
    }

    /// The participating types when this is a cycle error
    pub fn cycle(&self) -> Option<&[&'static str]> {
        match self {
            Self::CyclicDependency { chain } => Some(chain),
            _ => None,
        }
    }

    /// Walk `Registration` wrappers down to the error that caused them
    pub fn root_cause(&self) -> &RegistryError {
        match self {
            Self::Registration { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(feature = "config")]
impl From<figment::Error> for RegistryError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
