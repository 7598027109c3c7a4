use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use connector_core::{
    AggregateRoot, FiscalPositionId, InvoiceId, OrderId, PartnerId, PaymentMethodId,
    PaymentTermId, PickingId, PricelistId, ProductId, TaxId, UomId, WorkflowProcessId,
};

/// Sales order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleOrderState {
    /// Quotation.
    Draft,
    /// Quotation sent to the customer.
    Sent,
    WaitingDate,
    /// Confirmed, waiting for a manual invoice.
    Manual,
    /// Confirmed, in progress.
    Progress,
    ShippingExcept,
    InvoiceExcept,
    Done,
    Cancel,
}

impl SaleOrderState {
    /// Quotation-stage states, cancelled through the workflow signal.
    pub fn is_quotation(self) -> bool {
        matches!(self, SaleOrderState::Draft | SaleOrderState::Sent)
    }

    /// Confirmed states, cancelled through the order cancel action.
    pub fn is_confirmed_cancellable(self) -> bool {
        matches!(self, SaleOrderState::Manual | SaleOrderState::Progress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SaleOrderState::Draft => "draft",
            SaleOrderState::Sent => "sent",
            SaleOrderState::WaitingDate => "waiting_date",
            SaleOrderState::Manual => "manual",
            SaleOrderState::Progress => "progress",
            SaleOrderState::ShippingExcept => "shipping_except",
            SaleOrderState::InvoiceExcept => "invoice_except",
            SaleOrderState::Done => "done",
            SaleOrderState::Cancel => "cancel",
        }
    }
}

impl core::fmt::Display for SaleOrderState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When deliveries are created for a confirmed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickingPolicy {
    /// Deliver each product when available.
    Direct,
    /// Deliver all products at once.
    One,
}

/// When the order is invoiced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoicePolicy {
    Manual,
    Picking,
    Prepaid,
}

/// Order line: product, quantity, unit price and the fields derived from them.
///
/// Derived fields (`uom_id`, `tax_ids`, `weight`) start unset on lines built
/// by a connector and are filled by the onchange replay.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SaleOrderLine {
    pub sequence: u32,
    pub product_id: Option<ProductId>,
    pub name: String,
    pub quantity: i64,
    /// Quantity in the unit of sale, when it differs from `quantity`.
    pub uos_quantity: Option<i64>,
    pub uom_id: Option<UomId>,
    /// Price in smallest currency unit (e.g., cents); negative for discounts.
    pub price_unit: Option<i64>,
    pub tax_ids: Vec<TaxId>,
    /// Theoretical weight in grams.
    pub weight: Option<u64>,
}

impl SaleOrderLine {
    pub fn new(sequence: u32, product_id: ProductId, quantity: i64) -> Self {
        Self {
            sequence,
            product_id: Some(product_id),
            quantity,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_price_unit(mut self, price_unit: i64) -> Self {
        self.price_unit = Some(price_unit);
        self
    }
}

/// Aggregate root: SaleOrder.
///
/// A plain record: the host store owns persistence, the resolver and the
/// onchange engine mutate it through their own operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleOrder {
    pub id: OrderId,
    pub name: String,
    pub state: SaleOrderState,
    pub partner_id: PartnerId,
    pub partner_invoice_id: Option<PartnerId>,
    pub partner_shipping_id: Option<PartnerId>,
    pub pricelist_id: Option<PricelistId>,
    pub payment_term_id: Option<PaymentTermId>,
    pub payment_method_id: Option<PaymentMethodId>,
    pub workflow_process_id: Option<WorkflowProcessId>,
    pub fiscal_position_id: Option<FiscalPositionId>,
    pub picking_policy: Option<PickingPolicy>,
    pub invoice_policy: Option<InvoicePolicy>,
    pub date_order: DateTime<Utc>,
    pub picking_ids: Vec<PickingId>,
    pub invoice_ids: Vec<InvoiceId>,
    /// Set by a connector when the order was cancelled on the e-commerce backend.
    pub canceled_in_backend: bool,
    /// Set once the backend cancellation was acted on (order cancelled, or
    /// explicitly kept open).
    pub cancellation_resolved: bool,
    pub lines: Vec<SaleOrderLine>,
    pub version: u64,
}

impl SaleOrder {
    /// A new draft order for `partner_id`; everything derivable is left unset.
    pub fn new(id: OrderId, name: impl Into<String>, partner_id: PartnerId) -> Self {
        Self {
            id,
            name: name.into(),
            state: SaleOrderState::Draft,
            partner_id,
            partner_invoice_id: None,
            partner_shipping_id: None,
            pricelist_id: None,
            payment_term_id: None,
            payment_method_id: None,
            workflow_process_id: None,
            fiscal_position_id: None,
            picking_policy: None,
            invoice_policy: None,
            date_order: Utc::now(),
            picking_ids: Vec::new(),
            invoice_ids: Vec::new(),
            canceled_in_backend: false,
            cancellation_resolved: false,
            lines: Vec::new(),
            version: 0,
        }
    }

    /// True when the order was cancelled upstream and nobody acted on it yet.
    pub fn need_cancel(&self) -> bool {
        self.canceled_in_backend && !self.cancellation_resolved
    }

    pub fn with_line(mut self, line: SaleOrderLine) -> Self {
        self.lines.push(line);
        self
    }
}

impl AggregateRoot for SaleOrder {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Partial write on a sales order, as sent by a connector.
///
/// Only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleOrderWrite {
    pub canceled_in_backend: Option<bool>,
    pub cancellation_resolved: Option<bool>,
    pub state: Option<SaleOrderState>,
    pub picking_ids: Option<Vec<PickingId>>,
    pub invoice_ids: Option<Vec<InvoiceId>>,
}

impl SaleOrderWrite {
    pub fn canceled_in_backend() -> Self {
        Self {
            canceled_in_backend: Some(true),
            ..Self::default()
        }
    }

    /// Whether this write flags the order as cancelled upstream.
    pub fn flags_backend_cancellation(&self) -> bool {
        self.canceled_in_backend == Some(true)
    }

    /// Apply the write; returns true if it re-armed a resolved cancellation.
    ///
    /// A resolution is never withdrawn by a write: only a fresh upstream
    /// cancellation clears it. Moving a pending order to `cancel` resolves it.
    pub fn apply_to(&self, order: &mut SaleOrder) -> bool {
        let mut rearmed = false;
        if let Some(flag) = self.canceled_in_backend {
            if flag && !order.canceled_in_backend {
                // A fresh upstream cancellation needs a fresh resolution.
                order.cancellation_resolved = false;
                rearmed = true;
            }
            order.canceled_in_backend = flag;
        }
        if self.cancellation_resolved == Some(true) {
            order.cancellation_resolved = true;
        }
        if let Some(state) = self.state {
            order.state = state;
            if state == SaleOrderState::Cancel && order.need_cancel() {
                order.cancellation_resolved = true;
            }
        }
        if let Some(picking_ids) = &self.picking_ids {
            order.picking_ids = picking_ids.clone();
        }
        if let Some(invoice_ids) = &self.invoice_ids {
            order.invoice_ids = invoice_ids.clone();
        }
        rearmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_order() -> SaleOrder {
        SaleOrder::new(OrderId::new(), "SO001", PartnerId::new())
    }

    #[test]
    fn new_order_is_draft_and_not_flagged() {
        let order = test_order();
        assert_eq!(order.state, SaleOrderState::Draft);
        assert!(!order.canceled_in_backend);
        assert!(!order.cancellation_resolved);
        assert!(!order.need_cancel());
        assert_eq!(order.version(), 0);
    }

    #[test]
    fn state_groups_match_cancellation_paths() {
        assert!(SaleOrderState::Draft.is_quotation());
        assert!(SaleOrderState::Sent.is_quotation());
        assert!(!SaleOrderState::Manual.is_quotation());
        assert!(SaleOrderState::Manual.is_confirmed_cancellable());
        assert!(SaleOrderState::Progress.is_confirmed_cancellable());
        assert!(!SaleOrderState::ShippingExcept.is_confirmed_cancellable());
        assert!(!SaleOrderState::Done.is_confirmed_cancellable());
    }

    #[test]
    fn flagging_cancellation_rearms_resolution() {
        let mut order = test_order();
        order.canceled_in_backend = false;
        order.cancellation_resolved = true;

        let rearmed = SaleOrderWrite::canceled_in_backend().apply_to(&mut order);

        assert!(rearmed);
        assert!(order.need_cancel());
    }

    #[test]
    fn reflagging_an_already_flagged_order_keeps_resolution() {
        let mut order = test_order();
        order.canceled_in_backend = true;
        order.cancellation_resolved = true;

        let rearmed = SaleOrderWrite::canceled_in_backend().apply_to(&mut order);

        assert!(!rearmed);
        assert!(order.cancellation_resolved);
    }

    #[test]
    fn write_cannot_withdraw_a_resolution() {
        let mut order = test_order();
        order.canceled_in_backend = true;
        order.cancellation_resolved = true;

        let values = SaleOrderWrite {
            cancellation_resolved: Some(false),
            ..SaleOrderWrite::default()
        };
        values.apply_to(&mut order);

        assert!(order.cancellation_resolved);
        assert!(!order.need_cancel());
    }

    #[test]
    fn write_can_resolve_a_pending_cancellation() {
        let mut order = test_order();
        order.canceled_in_backend = true;

        let values = SaleOrderWrite {
            cancellation_resolved: Some(true),
            ..SaleOrderWrite::default()
        };
        values.apply_to(&mut order);

        assert!(!order.need_cancel());
    }

    #[test]
    fn writing_cancel_state_resolves_pending_cancellation() {
        let mut order = test_order();
        order.state = SaleOrderState::ShippingExcept;
        order.canceled_in_backend = true;

        let values = SaleOrderWrite {
            state: Some(SaleOrderState::Cancel),
            ..SaleOrderWrite::default()
        };
        values.apply_to(&mut order);

        assert_eq!(order.state, SaleOrderState::Cancel);
        assert!(order.cancellation_resolved);
        assert!(!order.need_cancel());
    }

    #[test]
    fn writing_cancel_state_leaves_unflagged_order_unresolved() {
        let mut order = test_order();
        let values = SaleOrderWrite {
            state: Some(SaleOrderState::Cancel),
            ..SaleOrderWrite::default()
        };
        values.apply_to(&mut order);

        assert_eq!(order.state, SaleOrderState::Cancel);
        assert!(!order.cancellation_resolved);
    }

    #[test]
    fn state_serializes_snake_case() {
        let json = serde_json::to_string(&SaleOrderState::ShippingExcept).unwrap();
        assert_eq!(json, "\"shipping_except\"");
        assert_eq!(SaleOrderState::WaitingDate.to_string(), "waiting_date");
    }
}
