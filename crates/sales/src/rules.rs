//! Onchange rules backed by the in-memory catalog.

use std::sync::Arc;

use connector_core::{DomainError, DomainResult, PartnerId, PaymentMethodId, WorkflowProcessId};

use crate::catalog::{InMemoryCatalog, Partner, PartnerKind, ProductCatalog};
use crate::onchange::{OnchangeRules, ProductChange};
use crate::order::SaleOrder;
use crate::update::{LineUpdate, OrderUpdate};

/// Standard sales recomputations over [`InMemoryCatalog`].
#[derive(Debug, Clone)]
pub struct CatalogRules {
    catalog: Arc<InMemoryCatalog>,
}

impl CatalogRules {
    pub fn new(catalog: Arc<InMemoryCatalog>) -> Self {
        Self { catalog }
    }

    fn partner(&self, id: PartnerId) -> DomainResult<Partner> {
        self.catalog
            .partner(id)
            .ok_or_else(|| DomainError::precondition(format!("unknown partner {id}")))
    }

    /// `field` of the partner, falling back to its commercial parent.
    fn commercial<T>(&self, partner: &Partner, field: impl Fn(&Partner) -> Option<T>) -> Option<T> {
        field(partner).or_else(|| {
            partner
                .parent_id
                .and_then(|parent| self.catalog.partner(parent))
                .and_then(|parent| field(&parent))
        })
    }

    fn address(&self, partner: &Partner, kind: PartnerKind) -> PartnerId {
        self.catalog
            .child_address(partner.id, kind)
            .map(|address| address.id)
            .unwrap_or(partner.id)
    }
}

impl OnchangeRules for CatalogRules {
    fn partner_changed(&self, order: &SaleOrder) -> DomainResult<OrderUpdate> {
        let partner = self.partner(order.partner_id)?;

        Ok(OrderUpdate {
            partner_invoice_id: Some(self.address(&partner, PartnerKind::Invoice)),
            partner_shipping_id: Some(self.address(&partner, PartnerKind::Delivery)),
            pricelist_id: self
                .commercial(&partner, |p| p.pricelist_id)
                .or_else(|| self.catalog.default_pricelist()),
            payment_term_id: self.commercial(&partner, |p| p.payment_term_id),
            fiscal_position_id: self.commercial(&partner, |p| p.fiscal_position_id),
            ..OrderUpdate::default()
        })
    }

    fn payment_method_changed(
        &self,
        _order: &SaleOrder,
        method: PaymentMethodId,
    ) -> DomainResult<OrderUpdate> {
        let method = self
            .catalog
            .payment_method(method)
            .ok_or_else(|| DomainError::precondition(format!("unknown payment method {method}")))?;
        Ok(OrderUpdate {
            payment_term_id: method.payment_term_id,
            ..OrderUpdate::default()
        })
    }

    fn workflow_process_changed(
        &self,
        _order: &SaleOrder,
        process: WorkflowProcessId,
    ) -> DomainResult<OrderUpdate> {
        let process = self.catalog.workflow_process(process).ok_or_else(|| {
            DomainError::precondition(format!("unknown workflow process {process}"))
        })?;
        Ok(OrderUpdate {
            picking_policy: process.picking_policy,
            invoice_policy: process.invoice_policy,
            ..OrderUpdate::default()
        })
    }

    fn product_changed(&self, change: &ProductChange<'_>) -> DomainResult<LineUpdate> {
        let product = self.catalog.product(change.product_id).ok_or_else(|| {
            DomainError::precondition(format!("unknown product {}", change.product_id))
        })?;

        let price_unit = match change.forced_price {
            Some(price) => price,
            None => {
                let pricelist = self.catalog.pricelist(change.pricelist_id).ok_or_else(|| {
                    DomainError::precondition(format!("unknown pricelist {}", change.pricelist_id))
                })?;
                pricelist.price_for(&product)?
            }
        };

        let tax_ids = if change.update_tax {
            match change
                .fiscal_position_id
                .and_then(|id| self.catalog.fiscal_position(id))
            {
                Some(position) => position.map_taxes(&product.tax_ids),
                None => product.tax_ids.clone(),
            }
        } else {
            Vec::new()
        };

        let units = u64::try_from(change.quantity).unwrap_or(0);

        Ok(LineUpdate {
            name: product.display_name(),
            uom_id: Some(product.uom_id),
            price_unit: Some(price_unit),
            tax_ids,
            weight: Some(product.weight.saturating_mul(units)),
        })
    }
}
