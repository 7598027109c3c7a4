//! Partial updates produced by the onchange rules.
//!
//! A rule returns the values it would set; merging writes a value only when
//! the matching field of a *guard* record is still unset. Using the record
//! itself as guard gives "fill if empty"; using the input snapshot lets a
//! later rule replace a derived value while still never touching what the
//! caller set explicitly.

use serde::{Deserialize, Serialize};

use connector_core::{
    FiscalPositionId, PartnerId, PaymentTermId, PricelistId, TaxId, UomId,
};

use crate::order::{InvoicePolicy, PickingPolicy, SaleOrder, SaleOrderLine};

/// A field value that can be "not set yet".
pub trait Unset {
    fn is_unset(&self) -> bool;
}

impl<T> Unset for Option<T> {
    fn is_unset(&self) -> bool {
        self.is_none()
    }
}

impl<T> Unset for Vec<T> {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

impl Unset for String {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

/// Write `value` into `target` if it carries something and `guard` is unset.
fn fill<T: Unset>(target: &mut T, guard: &T, value: T) -> bool {
    if value.is_unset() || !guard.is_unset() {
        return false;
    }
    *target = value;
    true
}

macro_rules! merge_fields {
    ($update:expr, $target:expr, $guard:expr, [$($field:ident),+ $(,)?]) => {{
        let mut written: Vec<&'static str> = Vec::new();
        $(
            if fill(&mut $target.$field, &$guard.$field, $update.$field) {
                written.push(stringify!($field));
            }
        )+
        written
    }};
}

/// Values derived on the order header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub partner_invoice_id: Option<PartnerId>,
    pub partner_shipping_id: Option<PartnerId>,
    pub pricelist_id: Option<PricelistId>,
    pub payment_term_id: Option<PaymentTermId>,
    pub fiscal_position_id: Option<FiscalPositionId>,
    pub picking_policy: Option<PickingPolicy>,
    pub invoice_policy: Option<InvoicePolicy>,
}

impl OrderUpdate {
    /// Merge into `target`, skipping fields already set on `guard`.
    ///
    /// Returns the names of the fields written.
    pub fn merge_into(self, target: &mut SaleOrder, guard: &SaleOrder) -> Vec<&'static str> {
        merge_fields!(
            self,
            target,
            guard,
            [
                partner_invoice_id,
                partner_shipping_id,
                pricelist_id,
                payment_term_id,
                fiscal_position_id,
                picking_policy,
                invoice_policy,
            ]
        )
    }
}

/// Values derived on an order line from its product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineUpdate {
    pub name: String,
    pub uom_id: Option<UomId>,
    pub price_unit: Option<i64>,
    pub tax_ids: Vec<TaxId>,
    pub weight: Option<u64>,
}

impl LineUpdate {
    /// Merge into `target`, skipping fields already set on `guard`.
    pub fn merge_into(self, target: &mut SaleOrderLine, guard: &SaleOrderLine) -> Vec<&'static str> {
        merge_fields!(self, target, guard, [name, uom_id, price_unit, tax_ids, weight])
    }
}
