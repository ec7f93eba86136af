//! Adapter resolution per entity type.

use crate::adapter::{PersistenceAdapter, StoreAdapter};
use crate::entity::Entity;
use crate::transaction::TransactionManager;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Hands out the adapter for each entity type.
///
/// By default every type gets a [`StoreAdapter`] over the database's store.
/// A different adapter can be registered for a type with
/// [`register`](Self::register), e.g. one that answers semantic search from
/// an index; repositories built afterwards use it without knowing.
pub struct AdapterFactory {
    transactions: Arc<TransactionManager>,
    overrides: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl AdapterFactory {
    /// Creates a factory over `transactions`.
    pub fn new(transactions: Arc<TransactionManager>) -> Self {
        Self {
            transactions,
            overrides: RwLock::new(HashMap::new()),
        }
    }

    /// Uses `adapter` for every later request for `T`.
    pub fn register<T: Entity>(&self, adapter: Arc<dyn PersistenceAdapter<T>>) {
        debug!(entity_type = T::ENTITY_TYPE, "custom adapter registered");
        self.overrides
            .write()
            .insert(TypeId::of::<T>(), Box::new(adapter));
    }

    /// Returns the adapter for `T`.
    #[must_use]
    pub fn adapter<T: Entity>(&self) -> Arc<dyn PersistenceAdapter<T>> {
        let custom = self
            .overrides
            .read()
            .get(&TypeId::of::<T>())
            .and_then(|any| any.downcast_ref::<Arc<dyn PersistenceAdapter<T>>>())
            .cloned();
        match custom {
            Some(adapter) => adapter,
            None => Arc::new(StoreAdapter::<T>::new(Arc::clone(&self.transactions))),
        }
    }
}

impl std::fmt::Debug for AdapterFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterFactory")
            .field("overrides", &self.overrides.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{transactions, Doc, Plain};

    #[test]
    fn default_adapter_uses_type_name() {
        let factory = AdapterFactory::new(transactions());
        assert_eq!(factory.adapter::<Doc>().collection(), "doc");
        assert_eq!(factory.adapter::<Plain>().collection(), "plain");
    }

    #[test]
    fn registered_adapter_replaces_default_for_that_type_only() {
        let tm = transactions();
        let factory = AdapterFactory::new(Arc::clone(&tm));
        let custom: Arc<dyn PersistenceAdapter<Doc>> = Arc::new(StoreAdapter::<Doc>::new(tm));
        factory.register(Arc::clone(&custom));

        let resolved = factory.adapter::<Doc>();
        assert!(Arc::ptr_eq(&resolved, &custom));
        assert_eq!(factory.adapter::<Plain>().collection(), "plain");
    }
}
