//! Onchange replay.
//!
//! Orders imported by a connector are assembled without a form, so the
//! recomputations a user would trigger by picking a customer or a product
//! never ran. [`SaleOrderOnchange::play`] replays them, in form order, and
//! only fills what the import left empty.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use connector_core::{
    DomainError, DomainResult, FiscalPositionId, PartnerId, PaymentMethodId, PricelistId,
    ProductId, UomId, WorkflowProcessId,
};

use crate::order::{SaleOrder, SaleOrderLine};
use crate::update::{LineUpdate, OrderUpdate};

/// Inputs of the product recomputation of one line.
#[derive(Debug, Clone)]
pub struct ProductChange<'a> {
    pub pricelist_id: PricelistId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub uom_id: Option<UomId>,
    pub uos_quantity: i64,
    pub name: &'a str,
    pub partner_id: PartnerId,
    pub date_order: DateTime<Utc>,
    pub fiscal_position_id: Option<FiscalPositionId>,
    pub update_tax: bool,
    /// Explicit unit price of the line; pricing rules must keep it.
    pub forced_price: Option<i64>,
    /// Lines already processed in this replay.
    pub previous_lines: &'a [SaleOrderLine],
}

/// The recomputations a sales order form performs.
pub trait OnchangeRules {
    /// Customer picked: addresses, pricelist, payment term, fiscal position.
    fn partner_changed(&self, order: &SaleOrder) -> DomainResult<OrderUpdate>;

    fn payment_method_changed(
        &self,
        order: &SaleOrder,
        method: PaymentMethodId,
    ) -> DomainResult<OrderUpdate>;

    fn workflow_process_changed(
        &self,
        order: &SaleOrder,
        process: WorkflowProcessId,
    ) -> DomainResult<OrderUpdate>;

    /// Product picked on a line: description, uom, price, taxes, weight.
    fn product_changed(&self, change: &ProductChange<'_>) -> DomainResult<LineUpdate>;
}

impl<R> OnchangeRules for Arc<R>
where
    R: OnchangeRules + ?Sized,
{
    fn partner_changed(&self, order: &SaleOrder) -> DomainResult<OrderUpdate> {
        (**self).partner_changed(order)
    }

    fn payment_method_changed(
        &self,
        order: &SaleOrder,
        method: PaymentMethodId,
    ) -> DomainResult<OrderUpdate> {
        (**self).payment_method_changed(order, method)
    }

    fn workflow_process_changed(
        &self,
        order: &SaleOrder,
        process: WorkflowProcessId,
    ) -> DomainResult<OrderUpdate> {
        (**self).workflow_process_changed(order, process)
    }

    fn product_changed(&self, change: &ProductChange<'_>) -> DomainResult<LineUpdate> {
        (**self).product_changed(change)
    }
}

/// Replays the onchange rules of a sales order and its lines.
#[derive(Debug, Clone)]
pub struct SaleOrderOnchange<R> {
    rules: R,
}

impl<R: OnchangeRules> SaleOrderOnchange<R> {
    pub fn new(rules: R) -> Self {
        Self { rules }
    }

    /// Replay the header rules, then the product rules of every line.
    ///
    /// `extra_lines` are lines built outside the order (shipping fees,
    /// discounts...). Lines are processed in sequence order and replace the
    /// order's lines.
    pub fn play(
        &self,
        order: SaleOrder,
        extra_lines: Vec<SaleOrderLine>,
    ) -> DomainResult<SaleOrder> {
        let mut order = self.play_order_onchange(order)?;

        let mut all_lines = std::mem::take(&mut order.lines);
        all_lines.extend(extra_lines);
        all_lines.sort_by_key(|line| line.sequence);

        let mut processed: Vec<SaleOrderLine> = Vec::with_capacity(all_lines.len());
        for line in all_lines {
            let line = self.play_line_onchange(line, &processed, &order)?;
            processed.push(line);
        }
        order.lines = processed;
        Ok(order)
    }

    fn play_order_onchange(&self, mut order: SaleOrder) -> DomainResult<SaleOrder> {
        let explicit = order.clone();

        let update = self.rules.partner_changed(&order)?;
        let current = order.clone();
        let written = update.merge_into(&mut order, &current);
        debug!(order = %order.name, ?written, "partner onchange replayed");

        // Later rules may replace derived values, never explicit input.
        if let Some(method) = order.payment_method_id {
            let update = self.rules.payment_method_changed(&order, method)?;
            let written = update.merge_into(&mut order, &explicit);
            debug!(order = %order.name, ?written, "payment method onchange replayed");
        }

        if let Some(process) = order.workflow_process_id {
            let update = self.rules.workflow_process_changed(&order, process)?;
            let written = update.merge_into(&mut order, &explicit);
            debug!(order = %order.name, ?written, "workflow process onchange replayed");
        }

        Ok(order)
    }

    fn play_line_onchange(
        &self,
        mut line: SaleOrderLine,
        previous_lines: &[SaleOrderLine],
        order: &SaleOrder,
    ) -> DomainResult<SaleOrderLine> {
        let update = {
            let change = self.product_change_params(&line, previous_lines, order)?;
            self.rules.product_changed(&change)?
        };
        let input = line.clone();
        let written = update.merge_into(&mut line, &input);
        debug!(order = %order.name, sequence = line.sequence, ?written, "product onchange replayed");
        Ok(line)
    }

    fn product_change_params<'a>(
        &self,
        line: &'a SaleOrderLine,
        previous_lines: &'a [SaleOrderLine],
        order: &SaleOrder,
    ) -> DomainResult<ProductChange<'a>> {
        let product_id = line.product_id.ok_or_else(|| {
            DomainError::precondition(format!(
                "line {} of sales order {} has no product",
                line.sequence, order.name
            ))
        })?;
        let pricelist_id = order.pricelist_id.ok_or_else(|| {
            DomainError::precondition(format!("sales order {} has no pricelist", order.name))
        })?;

        Ok(ProductChange {
            pricelist_id,
            product_id,
            quantity: line.quantity,
            uom_id: line.uom_id,
            uos_quantity: line.uos_quantity.unwrap_or(line.quantity),
            name: &line.name,
            partner_id: order.partner_id,
            date_order: order.date_order,
            fiscal_position_id: order.fiscal_position_id,
            update_tax: true,
            forced_price: line.price_unit,
            previous_lines,
        })
    }
}
