//! Parent-order strategies.
//!
//! A parent order is an order replaced by another one; some backends cancel
//! an edited order and create a new one pointing at it. How the link is
//! found is backend-specific, so it is a pluggable strategy.

use std::collections::HashMap;
use std::sync::RwLock;

use connector_core::{DomainError, DomainResult, OrderId};

use crate::order::SaleOrder;

/// Resolves the parent order of an order, if any.
///
/// An `Err` means the link could not be read; callers must not treat it as
/// "no parent".
pub trait ParentResolver: Send + Sync {
    fn parent_of(&self, order: &SaleOrder) -> DomainResult<Option<OrderId>>;
}

/// Backends without a parent notion.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoParent;

impl ParentResolver for NoParent {
    fn parent_of(&self, _order: &SaleOrder) -> DomainResult<Option<OrderId>> {
        Ok(None)
    }
}

impl<F> ParentResolver for F
where
    F: Fn(&SaleOrder) -> Option<OrderId> + Send + Sync,
{
    fn parent_of(&self, order: &SaleOrder) -> DomainResult<Option<OrderId>> {
        Ok(self(order))
    }
}

/// Explicit child → parent table, filled by a connector as it imports
/// replacement orders.
#[derive(Debug, Default)]
pub struct ParentMap {
    inner: RwLock<HashMap<OrderId, OrderId>>,
}

impl ParentMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link(&self, child: OrderId, parent: OrderId) -> DomainResult<()> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| DomainError::conflict("parent map lock poisoned"))?;
        map.insert(child, parent);
        Ok(())
    }
}

impl ParentResolver for ParentMap {
    fn parent_of(&self, order: &SaleOrder) -> DomainResult<Option<OrderId>> {
        let map = self
            .inner
            .read()
            .map_err(|_| DomainError::conflict("parent map lock poisoned"))?;
        Ok(map.get(&order.id).copied())
    }
}

#[cfg(test)]
impl ParentMap {
    /// A map whose lock was poisoned by a panicking writer.
    pub(crate) fn poisoned() -> Self {
        let map = Self::new();
        std::thread::scope(|s| {
            let _ = s
                .spawn(|| {
                    let _guard = map.inner.write();
                    panic!("writer died holding the parent map");
                })
                .join();
        });
        map
    }
}
