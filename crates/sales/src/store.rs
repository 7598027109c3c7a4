use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use connector_core::{AggregateRoot, DomainError, DomainResult, ExpectedVersion, OrderId};

use crate::order::SaleOrder;

/// Record read/write/create on sales orders.
///
/// Implemented by the host's transactional store; every `save` is one
/// record's atomic transition.
pub trait SaleOrderStore: Send + Sync {
    fn get(&self, id: OrderId) -> Option<SaleOrder>;

    /// Create a record. Fails with `Conflict` if the id is taken.
    fn insert(&self, order: SaleOrder) -> DomainResult<()>;

    /// Write back a record previously read from the store.
    ///
    /// The record's `version` must match the stored one; on success the
    /// stored version is bumped and returned.
    fn save(&self, order: SaleOrder) -> DomainResult<u64>;
}

impl<S> SaleOrderStore for Arc<S>
where
    S: SaleOrderStore + ?Sized,
{
    fn get(&self, id: OrderId) -> Option<SaleOrder> {
        (**self).get(id)
    }

    fn insert(&self, order: SaleOrder) -> DomainResult<()> {
        (**self).insert(order)
    }

    fn save(&self, order: SaleOrder) -> DomainResult<u64> {
        (**self).save(order)
    }
}

/// In-memory sales order store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemorySaleOrderStore {
    inner: RwLock<HashMap<OrderId, SaleOrder>>,
}

impl InMemorySaleOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SaleOrderStore for InMemorySaleOrderStore {
    fn get(&self, id: OrderId) -> Option<SaleOrder> {
        let map = self.inner.read().ok()?;
        map.get(&id).cloned()
    }

    fn insert(&self, order: SaleOrder) -> DomainResult<()> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| DomainError::conflict("order store lock poisoned"))?;
        if map.contains_key(order.id()) {
            return Err(DomainError::conflict(format!(
                "sales order {} already exists",
                order.id
            )));
        }
        map.insert(order.id, order);
        Ok(())
    }

    fn save(&self, mut order: SaleOrder) -> DomainResult<u64> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| DomainError::conflict("order store lock poisoned"))?;
        let stored = map
            .get(order.id())
            .ok_or_else(|| DomainError::not_found(format!("sales order {}", order.id)))?;
        ExpectedVersion::Exact(order.version()).check(stored.version())?;

        order.version += 1;
        let version = order.version;
        map.insert(order.id, order);
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connector_core::PartnerId;

    fn test_order() -> SaleOrder {
        SaleOrder::new(OrderId::new(), "SO001", PartnerId::new())
    }

    #[test]
    fn insert_then_get_returns_the_record() {
        let store = InMemorySaleOrderStore::new();
        let order = test_order();
        store.insert(order.clone()).unwrap();
        assert_eq!(store.get(order.id), Some(order));
    }

    #[test]
    fn insert_twice_conflicts() {
        let store = InMemorySaleOrderStore::new();
        let order = test_order();
        store.insert(order.clone()).unwrap();
        assert!(matches!(store.insert(order), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn save_bumps_version() {
        let store = InMemorySaleOrderStore::new();
        let order = test_order();
        store.insert(order.clone()).unwrap();

        let mut read = store.get(order.id).unwrap();
        read.cancellation_resolved = true;
        assert_eq!(store.save(read).unwrap(), 1);

        let reread = store.get(order.id).unwrap();
        assert_eq!(reread.version, 1);
        assert!(reread.cancellation_resolved);
    }

    #[test]
    fn stale_save_is_rejected() {
        let store = InMemorySaleOrderStore::new();
        let order = test_order();
        store.insert(order.clone()).unwrap();

        let first = store.get(order.id).unwrap();
        let stale = first.clone();
        store.save(first).unwrap();

        match store.save(stale) {
            Err(DomainError::Conflict(msg)) => assert!(msg.contains("optimistic concurrency")),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn save_unknown_order_is_not_found() {
        let store = InMemorySaleOrderStore::new();
        assert!(matches!(
            store.save(test_order()),
            Err(DomainError::NotFound(_))
        ));
    }
}
