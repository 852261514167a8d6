//! Binding table for one scope
//!
//! Uses DashMap for lock-free concurrent access. Every binding is indexed
//! under its primary type and under each exposed supertype.

use crate::factory::Binding;
use crate::provider::ServiceType;
use ahash::RandomState;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::any::TypeId;
use std::sync::Arc;

/// Thread-safe binding storage of a single scope.
///
/// Parent scopes are not consulted here; delegation is the scope's job.
pub(crate) struct BindingTable {
    /// Primary type -> its only binding
    primaries: DashMap<TypeId, Arc<Binding>, RandomState>,
    /// Any key -> bindings answering to it, in registration order
    index: DashMap<TypeId, Vec<Arc<Binding>>, RandomState>,
}

impl BindingTable {
    /// Create an empty table.
    ///
    /// Scopes rarely hold more than a few dozen services, so the shard count
    /// stays low to keep scope creation cheap.
    #[inline]
    pub fn new() -> Self {
        Self {
            primaries: DashMap::with_capacity_and_hasher_and_shard_amount(
                0,
                RandomState::new(),
                8,
            ),
            index: DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8),
        }
    }

    /// Insert a binding.
    ///
    /// Fails with the binding already holding the same primary type. The
    /// check and the insert are one atomic step.
    pub fn insert(&self, binding: Binding) -> Result<Arc<Binding>, Arc<Binding>> {
        let binding = Arc::new(binding);

        match self.primaries.entry(binding.service().id()) {
            Entry::Occupied(existing) => return Err(Arc::clone(existing.get())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&binding));
            }
        }

        for key in binding.keys() {
            self.index
                .entry(key.id())
                .or_default()
                .push(Arc::clone(&binding));
        }

        Ok(binding)
    }

    /// Bindings answering to `key`, in registration order
    #[inline]
    pub fn lookup(&self, key: ServiceType) -> Vec<Arc<Binding>> {
        self.index
            .get(&key.id())
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Check if any binding answers to `key`
    #[inline]
    pub fn contains(&self, key: ServiceType) -> bool {
        self.index.contains_key(&key.id())
    }

    /// Number of bindings (not keys)
    #[inline]
    pub fn len(&self) -> usize {
        self.primaries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.primaries.is_empty()
    }

    /// Primary types of all bindings, ordered by registration
    pub fn service_types(&self) -> Vec<ServiceType> {
        let mut bindings: Vec<_> = self
            .primaries
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        bindings.sort_by_key(|b| b.id());
        bindings.into_iter().map(|b| b.service()).collect()
    }
}

impl Default for BindingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BindingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingTable")
            .field("bindings", &self.len())
            .field("keys", &self.index.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{FactoryDescriptor, InstanceDescriptor};

    trait Repository: Send + Sync {}

    struct SqlRepository;
    impl Repository for SqlRepository {}

    struct MemoryRepository;
    impl Repository for MemoryRepository {}

    #[test]
    fn test_insert_and_lookup() {
        let table = BindingTable::new();
        assert!(table.is_empty());

        table
            .insert(InstanceDescriptor::new(SqlRepository).into_binding())
            .unwrap();

        assert_eq!(table.len(), 1);
        assert!(table.contains(ServiceType::of::<SqlRepository>()));
        assert_eq!(table.lookup(ServiceType::of::<SqlRepository>()).len(), 1);
        assert!(table.lookup(ServiceType::of::<MemoryRepository>()).is_empty());
    }

    #[test]
    fn test_duplicate_primary_rejected() {
        let table = BindingTable::new();
        let first = table
            .insert(InstanceDescriptor::new(SqlRepository).into_binding())
            .unwrap();

        let existing = table
            .insert(
                FactoryDescriptor::new("create_sql_repository", |(): ()| Ok(SqlRepository))
                    .into_binding(),
            )
            .unwrap_err();

        assert_eq!(existing.id(), first.id());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_exposed_keys_collect_all_bindings() {
        let table = BindingTable::new();
        table
            .insert(
                InstanceDescriptor::new(SqlRepository)
                    .exposed_as::<dyn Repository, _>(|r| r)
                    .into_binding(),
            )
            .unwrap();
        table
            .insert(
                InstanceDescriptor::new(MemoryRepository)
                    .exposed_as::<dyn Repository, _>(|r| r)
                    .into_binding(),
            )
            .unwrap();

        let repositories = table.lookup(ServiceType::of::<dyn Repository>());
        assert_eq!(repositories.len(), 2);
        assert_eq!(repositories[0].service(), ServiceType::of::<SqlRepository>());
        assert_eq!(
            table.service_types(),
            vec![
                ServiceType::of::<SqlRepository>(),
                ServiceType::of::<MemoryRepository>()
            ]
        );
    }
}
