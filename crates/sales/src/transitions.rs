//! Cancellation transitions of the host workflow.

use std::sync::Arc;

use thiserror::Error;

use crate::order::{SaleOrder, SaleOrderState};

/// A cancellation transition refused by the host.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The transition does not exist from the current state.
    #[error("cannot cancel a sales order in state '{0}'")]
    InvalidState(SaleOrderState),

    /// The host refused the transition (linked documents, permissions...).
    #[error("cancellation refused: {0}")]
    Refused(String),
}

/// The two cancellation paths of a sales order.
///
/// Quotations are cancelled through the workflow signal, confirmed orders
/// through the cancel action, mirroring the buttons of the order form.
/// Implementations mutate the passed record; the caller persists it.
pub trait CancelTransitions: Send + Sync {
    /// Quotation-stage cancellation (`draft`, `sent`).
    fn cancel_quotation(&self, order: &mut SaleOrder) -> Result<(), TransitionError>;

    /// Confirmed-stage cancellation (`manual`, `progress`).
    fn cancel_order(&self, order: &mut SaleOrder) -> Result<(), TransitionError>;
}

impl<T> CancelTransitions for Arc<T>
where
    T: CancelTransitions + ?Sized,
{
    fn cancel_quotation(&self, order: &mut SaleOrder) -> Result<(), TransitionError> {
        (**self).cancel_quotation(order)
    }

    fn cancel_order(&self, order: &mut SaleOrder) -> Result<(), TransitionError> {
        (**self).cancel_order(order)
    }
}

/// Default transition rules.
///
/// - quotations move straight to `cancel`;
/// - an order can be cancelled unless it is done, already cancelled, or
///   still has invoices attached (those must be cancelled first).
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardTransitions;

impl CancelTransitions for StandardTransitions {
    fn cancel_quotation(&self, order: &mut SaleOrder) -> Result<(), TransitionError> {
        if !order.state.is_quotation() {
            return Err(TransitionError::InvalidState(order.state));
        }
        order.state = SaleOrderState::Cancel;
        Ok(())
    }

    fn cancel_order(&self, order: &mut SaleOrder) -> Result<(), TransitionError> {
        if matches!(order.state, SaleOrderState::Done | SaleOrderState::Cancel) {
            return Err(TransitionError::InvalidState(order.state));
        }
        if !order.invoice_ids.is_empty() {
            return Err(TransitionError::Refused(
                "cancel all the invoices related to this sales order first".to_string(),
            ));
        }
        order.state = SaleOrderState::Cancel;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connector_core::{InvoiceId, OrderId, PartnerId};

    fn order_in(state: SaleOrderState) -> SaleOrder {
        let mut order = SaleOrder::new(OrderId::new(), "SO001", PartnerId::new());
        order.state = state;
        order
    }

    #[test]
    fn quotation_cancel_moves_to_cancel() {
        let mut order = order_in(SaleOrderState::Sent);
        StandardTransitions.cancel_quotation(&mut order).unwrap();
        assert_eq!(order.state, SaleOrderState::Cancel);
    }

    #[test]
    fn quotation_cancel_rejects_confirmed_orders() {
        let mut order = order_in(SaleOrderState::Progress);
        let err = StandardTransitions.cancel_quotation(&mut order).unwrap_err();
        assert_eq!(err, TransitionError::InvalidState(SaleOrderState::Progress));
        assert_eq!(order.state, SaleOrderState::Progress);
    }

    #[test]
    fn order_cancel_is_refused_with_invoices() {
        let mut order = order_in(SaleOrderState::Manual);
        order.invoice_ids.push(InvoiceId::new());
        let err = StandardTransitions.cancel_order(&mut order).unwrap_err();
        assert!(matches!(err, TransitionError::Refused(_)));
        assert_eq!(order.state, SaleOrderState::Manual);
    }

    #[test]
    fn order_cancel_rejects_done_orders() {
        let mut order = order_in(SaleOrderState::Done);
        assert!(StandardTransitions.cancel_order(&mut order).is_err());
    }
}
