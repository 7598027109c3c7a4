//! Backend cancellation of sales orders.
//!
//! When a sales order is cancelled on the e-commerce backend, the connector
//! flags `canceled_in_backend`. The resolver then:
//!
//! - tries to cancel the order automatically (best effort, never fails);
//! - reports the order as needing cancellation until the flag is resolved,
//!   either because the order got cancelled or because a user chose to keep
//!   it open;
//! - propagates that state to the orders replacing it (parent chain), so a
//!   replacement order stays blocked while its parent is unresolved.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, info, warn};

use connector_core::{DomainError, DomainResult, OrderId};

use crate::chatter::{MessageLog, RecordRef};
use crate::config::ConnectorConfig;
use crate::order::{SaleOrder, SaleOrderState, SaleOrderWrite};
use crate::parent::{NoParent, ParentResolver};
use crate::store::SaleOrderStore;
use crate::transitions::{CancelTransitions, TransitionError};

/// Bodies of the messages posted on records.
pub mod messages {
    pub const RESOLUTION: &str = "Resolution:\n\
        1. Cancel the linked invoices, delivery orders, automatic payments.\n\
        2. Cancel the sales order manually.";
    pub const ALREADY_DONE: &str =
        "The sales order cannot be automatically canceled because it is already done.";
    pub const AUTO_CANCELED: &str = "The sales order has been automatically canceled.";
    pub const AUTO_CANCEL_FAILED: &str = "The sales order could not be automatically canceled.";
    pub const UNSUPPORTED_STATE: &str =
        "The sales order could not be automatically canceled for this status.";
    pub const CANCELED_IN_BACKEND: &str = "The sales order has been canceled on the backend.";

    pub fn origin_canceled(order_name: &str) -> String {
        format!("Warning: the origin sales order {order_name} has been canceled on the backend.")
    }

    pub fn kept_open(reason: &str) -> String {
        format!(
            "Despite the cancellation of the sales order on the backend, \
             it should stay open.\n\nReason: {reason}"
        )
    }
}

/// What `try_auto_cancel` did with one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoCancelOutcome {
    /// Already cancelled; nothing to do, nothing logged.
    AlreadyCanceled,
    AlreadyDone,
    Canceled,
    /// The transition was refused; the flag stays unresolved.
    Failed { reason: String },
    /// A state from which cancellation is not offered (exceptions, waiting date).
    UnsupportedState(SaleOrderState),
    /// Unknown id; reported through tracing only.
    NotFound,
}

impl AutoCancelOutcome {
    /// Message to post on the order, if any.
    pub fn message(&self) -> Option<String> {
        match self {
            AutoCancelOutcome::AlreadyCanceled | AutoCancelOutcome::NotFound => None,
            AutoCancelOutcome::AlreadyDone => Some(messages::ALREADY_DONE.to_string()),
            AutoCancelOutcome::Canceled => Some(messages::AUTO_CANCELED.to_string()),
            AutoCancelOutcome::Failed { .. } => Some(format!(
                "{}\n{}",
                messages::AUTO_CANCEL_FAILED,
                messages::RESOLUTION
            )),
            AutoCancelOutcome::UnsupportedState(_) => Some(format!(
                "{}\n{}",
                messages::UNSUPPORTED_STATE,
                messages::RESOLUTION
            )),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            AutoCancelOutcome::AlreadyCanceled => "already_canceled",
            AutoCancelOutcome::AlreadyDone => "already_done",
            AutoCancelOutcome::Canceled => "canceled",
            AutoCancelOutcome::Failed { .. } => "failed",
            AutoCancelOutcome::UnsupportedState(_) => "unsupported_state",
            AutoCancelOutcome::NotFound => "not_found",
        }
    }
}

/// Failure of an explicit cancel action.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CancelError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Which list a parent order is displayed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderList {
    Quotations,
    SalesOrders,
}

/// Where to navigate to show the parent of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentView {
    pub parent_id: OrderId,
    pub list: OrderList,
}

#[derive(Debug, Clone, Copy)]
enum CancelPath {
    Quotation,
    Order,
}

/// Tracks and resolves backend cancellations over a sales order store.
pub struct CancellationResolver<S, T, L, P = NoParent> {
    store: S,
    transitions: T,
    log: L,
    parents: P,
    config: ConnectorConfig,
}

impl<S, T, L> CancellationResolver<S, T, L, NoParent>
where
    S: SaleOrderStore,
    T: CancelTransitions,
    L: MessageLog,
{
    pub fn new(store: S, transitions: T, log: L) -> Self {
        Self {
            store,
            transitions,
            log,
            parents: NoParent,
            config: ConnectorConfig::default(),
        }
    }
}

impl<S, T, L, P> CancellationResolver<S, T, L, P>
where
    S: SaleOrderStore,
    T: CancelTransitions,
    L: MessageLog,
    P: ParentResolver,
{
    /// Replace the parent strategy (backend-specific).
    pub fn with_parents<Q: ParentResolver>(self, parents: Q) -> CancellationResolver<S, T, L, Q> {
        CancellationResolver {
            store: self.store,
            transitions: self.transitions,
            log: self.log,
            parents,
            config: self.config,
        }
    }

    pub fn with_config(mut self, config: ConnectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Cancelled on the backend and not resolved yet.
    pub fn need_cancel(&self, order: &SaleOrder) -> bool {
        order.need_cancel()
    }

    /// True if any ancestor of `order` needs cancellation.
    ///
    /// The chain is walked iteratively; a cycle or a chain longer than
    /// `max_parent_depth` is corrupt data and reported as an invariant
    /// violation.
    pub fn parent_need_cancel(&self, order: &SaleOrder) -> DomainResult<bool> {
        let mut visited = HashSet::from([order.id]);
        let mut next = self.parents.parent_of(order)?;
        let mut depth = 0usize;

        while let Some(parent_id) = next {
            if !visited.insert(parent_id) {
                return Err(DomainError::invariant(format!(
                    "cycle in parent chain of sales order {} at {parent_id}",
                    order.id
                )));
            }
            depth += 1;
            if depth > self.config.max_parent_depth {
                return Err(DomainError::invariant(format!(
                    "parent chain of sales order {} exceeds {} levels",
                    order.id, self.config.max_parent_depth
                )));
            }

            let parent = self
                .store
                .get(parent_id)
                .ok_or_else(|| DomainError::not_found(format!("parent sales order {parent_id}")))?;
            if parent.need_cancel() {
                debug!(order_id = %order.id, %parent_id, depth, "ancestor needs cancellation");
                return Ok(true);
            }
            next = self.parents.parent_of(&parent)?;
        }

        Ok(false)
    }

    /// The order or one of its ancestors still waits for a cancellation
    /// decision; such orders must not be confirmed.
    pub fn cancellation_pending(&self, order: &SaleOrder) -> DomainResult<bool> {
        if order.need_cancel() {
            return Ok(true);
        }
        self.parent_need_cancel(order)
    }

    /// Create an order; a creation already flagged as cancelled upstream is
    /// logged and auto-cancelled right away.
    pub fn create(&self, order: SaleOrder) -> DomainResult<OrderId> {
        let id = order.id;
        let flagged = order.canceled_in_backend;
        self.store.insert(order)?;

        if flagged {
            self.handle_backend_cancellation(&[id])?;
        }
        Ok(id)
    }

    /// Write `values` on every order of `ids`.
    pub fn write(&self, ids: &[OrderId], values: &SaleOrderWrite) -> DomainResult<()> {
        for &id in ids {
            let mut order = self.get(id)?;
            if values.apply_to(&mut order) {
                debug!(order_id = %id, "backend cancellation re-armed");
            }
            self.store.save(order)?;
        }

        if values.flags_backend_cancellation() {
            self.handle_backend_cancellation(ids)?;
        }
        Ok(())
    }

    /// Try to cancel orders flagged as cancelled upstream.
    ///
    /// Never fails: every outcome is posted on the order and returned.
    pub fn try_auto_cancel(&self, ids: &[OrderId]) -> Vec<(OrderId, AutoCancelOutcome)> {
        ids.iter()
            .map(|&id| {
                let outcome = self.auto_cancel_one(id);
                info!(order_id = %id, outcome = outcome.label(), "auto-cancel attempted");
                if let Some(body) = outcome.message() {
                    self.log.post(RecordRef::SaleOrder(id), &body);
                }
                (id, outcome)
            })
            .collect()
    }

    /// Cancel confirmed orders; a pending backend cancellation is resolved
    /// by it.
    pub fn action_cancel(&self, ids: &[OrderId]) -> Result<(), CancelError> {
        for &id in ids {
            let order = self.get(id)?;
            self.cancel(order, CancelPath::Order)?;
        }
        Ok(())
    }

    /// Keep orders open despite their backend cancellation.
    pub fn ignore_cancellation(&self, ids: &[OrderId], reason: &str) -> DomainResult<()> {
        let body = messages::kept_open(reason);
        for &id in ids {
            let mut order = self.get(id)?;
            order.cancellation_resolved = true;
            self.store.save(order)?;
            self.log.post(RecordRef::SaleOrder(id), &body);
            info!(order_id = %id, reason, "backend cancellation ignored");
        }
        Ok(())
    }

    /// Where the parent of `id` is shown, or `None` without a parent.
    pub fn parent_view(&self, id: OrderId) -> DomainResult<Option<ParentView>> {
        let order = self.get(id)?;
        let Some(parent_id) = self.parents.parent_of(&order)? else {
            return Ok(None);
        };
        let parent = self.get(parent_id)?;
        let list = match parent.state {
            SaleOrderState::Draft | SaleOrderState::Sent | SaleOrderState::Cancel => {
                OrderList::Quotations
            }
            _ => OrderList::SalesOrders,
        };
        Ok(Some(ParentView { parent_id, list }))
    }

    fn get(&self, id: OrderId) -> DomainResult<SaleOrder> {
        self.store
            .get(id)
            .ok_or_else(|| DomainError::not_found(format!("sales order {id}")))
    }

    fn handle_backend_cancellation(&self, ids: &[OrderId]) -> DomainResult<()> {
        self.log_canceled_in_backend(ids)?;
        self.try_auto_cancel(ids);
        Ok(())
    }

    fn log_canceled_in_backend(&self, ids: &[OrderId]) -> DomainResult<()> {
        for &id in ids {
            let order = self.get(id)?;
            self.log
                .post(RecordRef::SaleOrder(id), messages::CANCELED_IN_BACKEND);

            let warning = messages::origin_canceled(&order.name);
            for &picking in &order.picking_ids {
                self.log.post(RecordRef::Picking(picking), &warning);
            }
            for &invoice in &order.invoice_ids {
                self.log.post(RecordRef::Invoice(invoice), &warning);
            }
            warn!(order_id = %id, name = %order.name, "sales order canceled on the backend");
        }
        Ok(())
    }

    fn auto_cancel_one(&self, id: OrderId) -> AutoCancelOutcome {
        let Some(order) = self.store.get(id) else {
            warn!(order_id = %id, "auto-cancel requested for unknown sales order");
            return AutoCancelOutcome::NotFound;
        };

        let path = match order.state {
            SaleOrderState::Cancel => return AutoCancelOutcome::AlreadyCanceled,
            SaleOrderState::Done => return AutoCancelOutcome::AlreadyDone,
            state if state.is_quotation() => CancelPath::Quotation,
            state if state.is_confirmed_cancellable() => CancelPath::Order,
            state => return AutoCancelOutcome::UnsupportedState(state),
        };

        match self.cancel(order, path) {
            Ok(()) => AutoCancelOutcome::Canceled,
            Err(err) => {
                warn!(order_id = %id, error = %err, "automatic cancellation failed");
                AutoCancelOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    fn cancel(&self, mut order: SaleOrder, path: CancelPath) -> Result<(), CancelError> {
        match path {
            CancelPath::Quotation => self.transitions.cancel_quotation(&mut order)?,
            CancelPath::Order => self.transitions.cancel_order(&mut order)?,
        }
        // A cancelled order is a resolved backend cancellation.
        if order.need_cancel() {
            order.cancellation_resolved = true;
        }
        self.store.save(order)?;
        Ok(())
    }
}
