use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use backoffice_core::TenantId;

use crate::error::PersistenceError;

/// Tenant-isolated document store.
///
/// Backs the catalog, affiliates, the sale ledger and the dispatch-order
/// projection. Every call returns a `Result`; a backend failure is never
/// reported as "empty".
pub trait TenantStore<K, V>: Send + Sync {
    fn get(&self, tenant_id: TenantId, key: &K) -> Result<Option<V>, PersistenceError>;

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) -> Result<(), PersistenceError>;

    /// Insert-only write; an existing key is a [`PersistenceError::Conflict`].
    fn insert_new(&self, tenant_id: TenantId, key: K, value: V) -> Result<(), PersistenceError>;

    fn list(&self, tenant_id: TenantId) -> Result<Vec<V>, PersistenceError>;

    fn count(&self, tenant_id: TenantId) -> Result<usize, PersistenceError>;

    /// Drop every record of a tenant (projection rebuilds).
    fn clear_tenant(&self, tenant_id: TenantId) -> Result<(), PersistenceError>;
}

impl<K, V, S> TenantStore<K, V> for Arc<S>
where
    S: TenantStore<K, V> + ?Sized,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Result<Option<V>, PersistenceError> {
        (**self).get(tenant_id, key)
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) -> Result<(), PersistenceError> {
        (**self).upsert(tenant_id, key, value)
    }

    fn insert_new(&self, tenant_id: TenantId, key: K, value: V) -> Result<(), PersistenceError> {
        (**self).insert_new(tenant_id, key, value)
    }

    fn list(&self, tenant_id: TenantId) -> Result<Vec<V>, PersistenceError> {
        (**self).list(tenant_id)
    }

    fn count(&self, tenant_id: TenantId) -> Result<usize, PersistenceError> {
        (**self).count(tenant_id)
    }

    fn clear_tenant(&self, tenant_id: TenantId) -> Result<(), PersistenceError> {
        (**self).clear_tenant(tenant_id)
    }
}

#[derive(Debug)]
pub struct InMemoryTenantStore<K, V> {
    inner: RwLock<HashMap<(TenantId, K), V>>,
}

impl<K, V> InMemoryTenantStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryTenantStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TenantStore<K, V> for InMemoryTenantStore<K, V>
where
    K: Clone + Eq + Hash + core::fmt::Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Result<Option<V>, PersistenceError> {
        let map = self.inner.read().map_err(|_| PersistenceError::poisoned())?;
        Ok(map.get(&(tenant_id, key.clone())).cloned())
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) -> Result<(), PersistenceError> {
        let mut map = self.inner.write().map_err(|_| PersistenceError::poisoned())?;
        map.insert((tenant_id, key), value);
        Ok(())
    }

    fn insert_new(&self, tenant_id: TenantId, key: K, value: V) -> Result<(), PersistenceError> {
        let mut map = self.inner.write().map_err(|_| PersistenceError::poisoned())?;
        let slot = (tenant_id, key);
        if map.contains_key(&slot) {
            return Err(PersistenceError::Conflict(format!("record {} already exists", slot.1)));
        }
        map.insert(slot, value);
        Ok(())
    }

    fn list(&self, tenant_id: TenantId) -> Result<Vec<V>, PersistenceError> {
        let map = self.inner.read().map_err(|_| PersistenceError::poisoned())?;
        Ok(map
            .iter()
            .filter_map(|((t, _k), v)| (*t == tenant_id).then(|| v.clone()))
            .collect())
    }

    fn count(&self, tenant_id: TenantId) -> Result<usize, PersistenceError> {
        let map = self.inner.read().map_err(|_| PersistenceError::poisoned())?;
        Ok(map.keys().filter(|(t, _k)| *t == tenant_id).count())
    }

    fn clear_tenant(&self, tenant_id: TenantId) -> Result<(), PersistenceError> {
        let mut map = self.inner.write().map_err(|_| PersistenceError::poisoned())?;
        map.retain(|(t, _k), _v| *t != tenant_id);
        Ok(())
    }
}
