//! Shared cache of resolved entity identities.

use crate::entity::HasIdentity;
use crate::error::ModelResult;
use crate::identity::EntityIdentity;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Maps entity types to their resolved [`EntityIdentity`].
///
/// Entries are created lazily on first access. Reads run concurrently;
/// inserts and removals take the write lock one at a time. Identities are
/// fully resolved before they are published, so readers never observe a
/// partially built entry.
#[derive(Debug, Default)]
pub struct EntityTypeRegistry {
    identities: RwLock<HashMap<TypeId, Arc<EntityIdentity>>>,
}

impl EntityTypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached identity of `T`, resolving and storing it on first use.
    ///
    /// If two callers race on the same type, the first stored resolution wins
    /// and both receive it.
    pub fn get_or_create<T: HasIdentity>(&self) -> ModelResult<Arc<EntityIdentity>> {
        let key = TypeId::of::<T>();
        if let Some(identity) = self.read().get(&key) {
            return Ok(Arc::clone(identity));
        }

        let resolved = Arc::new(EntityIdentity::resolve::<T>()?);

        let mut identities = self.write();
        let stored = identities.entry(key).or_insert_with(|| {
            debug!(
                "Registered identity for {}: {:?}",
                T::ENTITY_TYPE,
                resolved.identifier_names()
            );
            Arc::clone(&resolved)
        });
        Ok(Arc::clone(stored))
    }

    /// Returns true if `T` has a cached identity.
    pub fn contains<T: HasIdentity>(&self) -> bool {
        self.read().contains_key(&TypeId::of::<T>())
    }

    /// Drops the cached identity of `T`. Returns true if one was cached.
    pub fn remove<T: HasIdentity>(&self) -> bool {
        self.write().remove(&TypeId::of::<T>()).is_some()
    }

    /// Drops every cached identity.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Number of cached identities.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panicking writer can only poison the lock between whole-map
    // operations, so the map is still consistent.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<TypeId, Arc<EntityIdentity>>> {
        self.identities.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<TypeId, Arc<EntityIdentity>>> {
        self.identities.write().unwrap_or_else(PoisonError::into_inner)
    }
}
