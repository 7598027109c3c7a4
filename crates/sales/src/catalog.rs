//! Master data read by the onchange rules and the line builders.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use connector_core::{
    DomainError, DomainResult, FiscalPositionId, PartnerId, PaymentMethodId, PaymentTermId,
    PricelistId, ProductId, TaxId, UomId, WorkflowProcessId,
};

use crate::order::{InvoicePolicy, PickingPolicy};

/// Role of a partner record within its commercial entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartnerKind {
    Contact,
    Invoice,
    Delivery,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub id: PartnerId,
    pub name: String,
    pub kind: PartnerKind,
    /// Commercial parent; addresses inherit its sales properties.
    pub parent_id: Option<PartnerId>,
    pub pricelist_id: Option<PricelistId>,
    pub payment_term_id: Option<PaymentTermId>,
    pub fiscal_position_id: Option<FiscalPositionId>,
}

impl Partner {
    pub fn new(id: PartnerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: PartnerKind::Contact,
            parent_id: None,
            pricelist_id: None,
            payment_term_id: None,
            fiscal_position_id: None,
        }
    }

    /// An address of kind `kind` under `parent_id`.
    pub fn address(
        id: PartnerId,
        name: impl Into<String>,
        kind: PartnerKind,
        parent_id: PartnerId,
    ) -> Self {
        Self {
            kind,
            parent_id: Some(parent_id),
            ..Self::new(id, name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Internal reference (SKU).
    pub default_code: Option<String>,
    pub uom_id: UomId,
    /// Price in smallest currency unit (e.g., cents).
    pub list_price: i64,
    /// Weight of one unit in grams.
    pub weight: u64,
    pub tax_ids: Vec<TaxId>,
}

impl Product {
    /// Description used on order lines: `[CODE] Name`, or the bare name.
    pub fn display_name(&self) -> String {
        match &self.default_code {
            Some(code) => format!("[{code}] {}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Pricelist applying a flat discount on list prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricelist {
    pub id: PricelistId,
    pub name: String,
    /// 0..=100.
    pub discount_percent: u8,
}

impl Pricelist {
    /// Discounted list price; fails if the intermediate amount overflows.
    pub fn price_for(&self, product: &Product) -> DomainResult<i64> {
        let discount = i64::from(self.discount_percent.min(100));
        product
            .list_price
            .checked_mul(100 - discount)
            .map(|amount| amount / 100)
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "price of product {} overflows under pricelist {}",
                    product.id, self.name
                ))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub name: String,
    pub payment_term_id: Option<PaymentTermId>,
}

/// Preset of order policies applied when a workflow process is selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowProcess {
    pub id: WorkflowProcessId,
    pub name: String,
    pub picking_policy: Option<PickingPolicy>,
    pub invoice_policy: Option<InvoicePolicy>,
}

/// Tax substitutions for a customer category (e.g. intra-EU B2B).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalPosition {
    pub id: FiscalPositionId,
    pub name: String,
    /// Source tax → replacement; `None` drops the tax.
    pub tax_map: Vec<(TaxId, Option<TaxId>)>,
}

impl FiscalPosition {
    pub fn map_taxes(&self, taxes: &[TaxId]) -> Vec<TaxId> {
        let mut mapped = Vec::with_capacity(taxes.len());
        for tax in taxes {
            match self.tax_map.iter().find(|(src, _)| src == tax) {
                Some((_, Some(dest))) => mapped.push(*dest),
                Some((_, None)) => {}
                None => mapped.push(*tax),
            }
        }
        mapped.dedup();
        mapped
    }
}

/// External key of a record, `module.name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductRef {
    pub module: String,
    pub name: String,
}

impl ProductRef {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }
}

impl core::fmt::Display for ProductRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}

impl core::str::FromStr for ProductRef {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((module, name)) if !module.is_empty() && !name.is_empty() => {
                Ok(Self::new(module, name))
            }
            _ => Err(DomainError::invalid_id(format!(
                "ProductRef: expected 'module.name', got '{s}'"
            ))),
        }
    }
}

/// Product lookups used by the line builders.
pub trait ProductCatalog: Send + Sync {
    fn product(&self, id: ProductId) -> Option<Product>;
    fn product_by_ref(&self, product_ref: &ProductRef) -> Option<Product>;
}

impl<C> ProductCatalog for Arc<C>
where
    C: ProductCatalog + ?Sized,
{
    fn product(&self, id: ProductId) -> Option<Product> {
        (**self).product(id)
    }

    fn product_by_ref(&self, product_ref: &ProductRef) -> Option<Product> {
        (**self).product_by_ref(product_ref)
    }
}

#[derive(Debug, Default)]
struct CatalogData {
    // Insertion order matters: the first matching address wins.
    partners: Vec<Partner>,
    products: HashMap<ProductId, Product>,
    product_refs: HashMap<ProductRef, ProductId>,
    pricelists: HashMap<PricelistId, Pricelist>,
    default_pricelist: Option<PricelistId>,
    payment_methods: HashMap<PaymentMethodId, PaymentMethod>,
    workflow_processes: HashMap<WorkflowProcessId, WorkflowProcess>,
    fiscal_positions: HashMap<FiscalPositionId, FiscalPosition>,
}

/// In-memory master data for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    inner: RwLock<CatalogData>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_data<R>(&self, f: impl FnOnce(&CatalogData) -> R) -> Option<R> {
        self.inner.read().ok().map(|data| f(&*data))
    }

    fn update(&self, f: impl FnOnce(&mut CatalogData)) {
        if let Ok(mut data) = self.inner.write() {
            f(&mut data);
        }
    }

    pub fn add_partner(&self, partner: Partner) {
        self.update(|d| {
            d.partners.retain(|p| p.id != partner.id);
            d.partners.push(partner);
        });
    }

    pub fn add_product(&self, product: Product) {
        self.update(|d| {
            d.products.insert(product.id, product);
        });
    }

    /// Register `product_ref` as an external key of `product_id`.
    pub fn register_ref(&self, product_ref: ProductRef, product_id: ProductId) {
        self.update(|d| {
            d.product_refs.insert(product_ref, product_id);
        });
    }

    pub fn add_pricelist(&self, pricelist: Pricelist) {
        self.update(|d| {
            d.pricelists.insert(pricelist.id, pricelist);
        });
    }

    /// Pricelist used for partners without one.
    pub fn set_default_pricelist(&self, id: PricelistId) {
        self.update(|d| d.default_pricelist = Some(id));
    }

    pub fn add_payment_method(&self, method: PaymentMethod) {
        self.update(|d| {
            d.payment_methods.insert(method.id, method);
        });
    }

    pub fn add_workflow_process(&self, process: WorkflowProcess) {
        self.update(|d| {
            d.workflow_processes.insert(process.id, process);
        });
    }

    pub fn add_fiscal_position(&self, position: FiscalPosition) {
        self.update(|d| {
            d.fiscal_positions.insert(position.id, position);
        });
    }

    pub fn partner(&self, id: PartnerId) -> Option<Partner> {
        self.with_data(|d| d.partners.iter().find(|p| p.id == id).cloned())
            .flatten()
    }

    /// First address of `kind` directly under `parent_id`.
    pub fn child_address(&self, parent_id: PartnerId, kind: PartnerKind) -> Option<Partner> {
        self.with_data(|d| {
            d.partners
                .iter()
                .find(|p| p.parent_id == Some(parent_id) && p.kind == kind)
                .cloned()
        })
        .flatten()
    }

    pub fn pricelist(&self, id: PricelistId) -> Option<Pricelist> {
        self.with_data(|d| d.pricelists.get(&id).cloned()).flatten()
    }

    pub fn default_pricelist(&self) -> Option<PricelistId> {
        self.with_data(|d| d.default_pricelist).flatten()
    }

    pub fn payment_method(&self, id: PaymentMethodId) -> Option<PaymentMethod> {
        self.with_data(|d| d.payment_methods.get(&id).cloned())
            .flatten()
    }

    pub fn workflow_process(&self, id: WorkflowProcessId) -> Option<WorkflowProcess> {
        self.with_data(|d| d.workflow_processes.get(&id).cloned())
            .flatten()
    }

    pub fn fiscal_position(&self, id: FiscalPositionId) -> Option<FiscalPosition> {
        self.with_data(|d| d.fiscal_positions.get(&id).cloned())
            .flatten()
    }
}

impl ProductCatalog for InMemoryCatalog {
    fn product(&self, id: ProductId) -> Option<Product> {
        self.with_data(|d| d.products.get(&id).cloned()).flatten()
    }

    fn product_by_ref(&self, product_ref: &ProductRef) -> Option<Product> {
        self.with_data(|d| {
            d.product_refs
                .get(product_ref)
                .and_then(|id| d.products.get(id))
                .cloned()
        })
        .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_product(list_price: i64) -> Product {
        Product {
            id: ProductId::new(),
            name: "My Product".to_string(),
            default_code: Some("MyCode".to_string()),
            uom_id: UomId::new(),
            list_price,
            weight: 15,
            tax_ids: vec![],
        }
    }

    #[test]
    fn display_name_prefixes_code() {
        let mut product = test_product(100);
        assert_eq!(product.display_name(), "[MyCode] My Product");
        product.default_code = None;
        assert_eq!(product.display_name(), "My Product");
    }

    #[test]
    fn pricelist_applies_discount() {
        let pricelist = Pricelist {
            id: PricelistId::new(),
            name: "Resellers".to_string(),
            discount_percent: 25,
        };
        assert_eq!(pricelist.price_for(&test_product(2000)).unwrap(), 1500);
    }

    #[test]
    fn pricelist_rejects_overflowing_prices() {
        let pricelist = Pricelist {
            id: PricelistId::new(),
            name: "Resellers".to_string(),
            discount_percent: 10,
        };
        assert!(matches!(
            pricelist.price_for(&test_product(i64::MAX / 2)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn fiscal_position_maps_and_drops_taxes() {
        let (vat, vat_export, eco) = (TaxId::new(), TaxId::new(), TaxId::new());
        let keep = TaxId::new();
        let position = FiscalPosition {
            id: FiscalPositionId::new(),
            name: "Export".to_string(),
            tax_map: vec![(vat, Some(vat_export)), (eco, None)],
        };
        assert_eq!(position.map_taxes(&[vat, eco, keep]), vec![vat_export, keep]);
    }

    #[test]
    fn product_ref_parses_module_and_name() {
        let parsed: ProductRef = "connector_ecommerce.product_product_gift".parse().unwrap();
        assert_eq!(parsed.module, "connector_ecommerce");
        assert_eq!(parsed.name, "product_product_gift");
        assert_eq!(parsed.to_string(), "connector_ecommerce.product_product_gift");
        assert!("no_dot".parse::<ProductRef>().is_err());
    }

    #[test]
    fn lookup_by_ref_resolves_registered_products() {
        let catalog = InMemoryCatalog::new();
        let product = test_product(500);
        let key = ProductRef::new("connector_ecommerce", "product_product_shipping");
        catalog.add_product(product.clone());
        catalog.register_ref(key.clone(), product.id);

        assert_eq!(catalog.product_by_ref(&key), Some(product));
        assert_eq!(
            catalog.product_by_ref(&ProductRef::new("connector_ecommerce", "missing")),
            None
        );
    }

    #[test]
    fn child_address_returns_first_of_kind() {
        let catalog = InMemoryCatalog::new();
        let parent = Partner::new(PartnerId::new(), "seb");
        let billing = Partner::address(PartnerId::new(), "Guewen", PartnerKind::Invoice, parent.id);
        let second = Partner::address(PartnerId::new(), "Other", PartnerKind::Invoice, parent.id);
        catalog.add_partner(parent.clone());
        catalog.add_partner(billing.clone());
        catalog.add_partner(second);

        assert_eq!(
            catalog.child_address(parent.id, PartnerKind::Invoice),
            Some(billing)
        );
        assert_eq!(catalog.child_address(parent.id, PartnerKind::Delivery), None);
    }
}
