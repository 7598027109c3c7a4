//! Builders for the extra lines a connector adds to imported orders.
//!
//! Backends report shipping fees, cash-on-delivery fees and gift coupons as
//! amounts, not as order lines. A builder turns such an amount into a line on
//! a dedicated product:
//!
//! ```ignore
//! let line = SpecialLineBuilder::shipping(&config)
//!     .with_price_unit(100)
//!     .line(&catalog)?;
//! ```

use serde::{Deserialize, Serialize};

use connector_core::{DomainError, DomainResult, ProductId, UomId};

use crate::catalog::{ProductCatalog, ProductRef};
use crate::config::{ConnectorConfig, DEFAULT_SPECIAL_LINE_SEQUENCE};
use crate::order::SaleOrderLine;

pub const DATA_MODULE: &str = "connector_ecommerce";
pub const SHIPPING_PRODUCT: &str = "product_product_shipping";
pub const CASH_ON_DELIVERY_PRODUCT: &str = "product_product_cash_on_delivery";
pub const GIFT_PRODUCT: &str = "product_product_gift";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpecialLineKind {
    Generic,
    Shipping,
    CashOnDelivery,
    Gift,
}

/// Line-creation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialLine {
    pub product_id: ProductId,
    pub name: String,
    pub uom_id: UomId,
    pub quantity: i64,
    /// Signed price in smallest currency unit.
    pub price_unit: i64,
    pub sequence: u32,
}

impl SpecialLine {
    /// The payload as an order line, ready for the onchange replay.
    pub fn into_order_line(self) -> SaleOrderLine {
        SaleOrderLine {
            sequence: self.sequence,
            product_id: Some(self.product_id),
            name: self.name,
            quantity: self.quantity,
            uom_id: Some(self.uom_id),
            price_unit: Some(self.price_unit),
            ..SaleOrderLine::default()
        }
    }
}

/// Builds one special line from a product and an amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialLineBuilder {
    kind: SpecialLineKind,
    /// Takes precedence over `product_ref`.
    product: Option<ProductId>,
    product_ref: Option<ProductRef>,
    price_unit: Option<i64>,
    quantity: i64,
    sign: i64,
    sequence: u32,
    gift_code: Option<String>,
}

impl SpecialLineBuilder {
    /// A builder without default product; one must be provided.
    pub fn generic() -> Self {
        Self {
            kind: SpecialLineKind::Generic,
            product: None,
            product_ref: None,
            price_unit: None,
            quantity: 1,
            sign: 1,
            sequence: DEFAULT_SPECIAL_LINE_SEQUENCE,
            gift_code: None,
        }
    }

    pub fn shipping(config: &ConnectorConfig) -> Self {
        Self {
            kind: SpecialLineKind::Shipping,
            product_ref: Some(ProductRef::new(DATA_MODULE, SHIPPING_PRODUCT)),
            sequence: config.shipping_sequence,
            ..Self::generic()
        }
    }

    pub fn cash_on_delivery(config: &ConnectorConfig) -> Self {
        Self {
            kind: SpecialLineKind::CashOnDelivery,
            product_ref: Some(ProductRef::new(DATA_MODULE, CASH_ON_DELIVERY_PRODUCT)),
            sequence: config.cash_on_delivery_sequence,
            ..Self::generic()
        }
    }

    /// Gift coupons are deductions: the price is negated by default.
    pub fn gift(config: &ConnectorConfig) -> Self {
        Self {
            kind: SpecialLineKind::Gift,
            product_ref: Some(ProductRef::new(DATA_MODULE, GIFT_PRODUCT)),
            sign: -1,
            sequence: config.gift_sequence,
            ..Self::generic()
        }
    }

    pub fn with_product(mut self, product: ProductId) -> Self {
        self.product = Some(product);
        self
    }

    pub fn with_product_ref(mut self, product_ref: ProductRef) -> Self {
        self.product_ref = Some(product_ref);
        self
    }

    pub fn with_price_unit(mut self, price_unit: i64) -> Self {
        self.price_unit = Some(price_unit);
        self
    }

    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_sign(mut self, sign: i64) -> Self {
        self.sign = sign;
        self
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Coupon code appended to the description of gift lines.
    pub fn with_gift_code(mut self, code: impl Into<String>) -> Self {
        self.gift_code = Some(code.into());
        self
    }

    /// Build the payload, resolving the product through `catalog`.
    pub fn line<C: ProductCatalog + ?Sized>(&self, catalog: &C) -> DomainResult<SpecialLine> {
        let price_unit = self
            .price_unit
            .ok_or_else(|| DomainError::precondition("special line requires a unit price"))?;

        let product = match (&self.product, &self.product_ref) {
            (Some(id), _) => catalog
                .product(*id)
                .ok_or_else(|| DomainError::not_found(format!("product {id}")))?,
            (None, Some(product_ref)) => catalog
                .product_by_ref(product_ref)
                .ok_or_else(|| DomainError::not_found(format!("product {product_ref}")))?,
            (None, None) => {
                return Err(DomainError::precondition(
                    "special line requires a product or a product reference",
                ));
            }
        };

        let mut name = product.name;
        if self.kind == SpecialLineKind::Gift {
            if let Some(code) = self.gift_code.as_deref().filter(|c| !c.is_empty()) {
                name = format!("{name} [{code}]");
            }
        }

        let price_unit = price_unit.checked_mul(self.sign).ok_or_else(|| {
            DomainError::validation(format!(
                "special line price {price_unit} overflows with sign {}",
                self.sign
            ))
        })?;

        Ok(SpecialLine {
            product_id: product.id,
            name,
            uom_id: product.uom_id,
            quantity: self.quantity,
            price_unit,
            sequence: self.sequence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, Product};

    fn test_product(name: &str) -> Product {
        Product {
            id: ProductId::new(),
            name: name.to_string(),
            default_code: None,
            uom_id: UomId::new(),
            list_price: 0,
            weight: 0,
            tax_ids: vec![],
        }
    }

    fn catalog_with_special_products() -> (InMemoryCatalog, Product, Product, Product) {
        let catalog = InMemoryCatalog::new();
        let shipping = test_product("Shipping costs");
        let cod = test_product("Cash on delivery");
        let gift = test_product("Gift");
        for (product, key) in [
            (&shipping, SHIPPING_PRODUCT),
            (&cod, CASH_ON_DELIVERY_PRODUCT),
            (&gift, GIFT_PRODUCT),
        ] {
            catalog.add_product(product.clone());
            catalog.register_ref(ProductRef::new(DATA_MODULE, key), product.id);
        }
        (catalog, shipping, cod, gift)
    }

    #[test]
    fn shipping_line_uses_shipping_product_and_sequence() {
        let (catalog, shipping, _, _) = catalog_with_special_products();
        let line = SpecialLineBuilder::shipping(&ConnectorConfig::default())
            .with_price_unit(100)
            .line(&catalog)
            .unwrap();

        assert_eq!(line.product_id, shipping.id);
        assert_eq!(line.name, "Shipping costs");
        assert_eq!(line.uom_id, shipping.uom_id);
        assert_eq!(line.price_unit, 100);
        assert_eq!(line.quantity, 1);
        assert_eq!(line.sequence, 999);
    }

    #[test]
    fn cash_on_delivery_line_sorts_before_shipping() {
        let (catalog, _, cod, _) = catalog_with_special_products();
        let line = SpecialLineBuilder::cash_on_delivery(&ConnectorConfig::default())
            .with_price_unit(5)
            .line(&catalog)
            .unwrap();
        assert_eq!(line.product_id, cod.id);
        assert_eq!(line.sequence, 995);
    }

    #[test]
    fn gift_line_negates_price_and_appends_code() {
        let (catalog, _, _, gift) = catalog_with_special_products();
        let builder = SpecialLineBuilder::gift(&ConnectorConfig::default()).with_price_unit(50);

        let plain = builder.line(&catalog).unwrap();
        assert_eq!(plain.product_id, gift.id);
        assert_eq!(plain.price_unit, -50);
        assert_eq!(plain.name, "Gift");
        assert_eq!(plain.sequence, 990);

        let coded = builder.with_gift_code("XMAS20").line(&catalog).unwrap();
        assert_eq!(coded.name, "Gift [XMAS20]");
    }

    #[test]
    fn explicit_product_wins_over_reference() {
        let (catalog, _, _, _) = catalog_with_special_products();
        let custom = test_product("Express shipping");
        catalog.add_product(custom.clone());

        let line = SpecialLineBuilder::shipping(&ConnectorConfig::default())
            .with_product(custom.id)
            .with_price_unit(1500)
            .with_quantity(2)
            .line(&catalog)
            .unwrap();

        assert_eq!(line.product_id, custom.id);
        assert_eq!(line.quantity, 2);
    }

    #[test]
    fn generic_builder_requires_a_product() {
        let catalog = InMemoryCatalog::new();
        let err = SpecialLineBuilder::generic()
            .with_price_unit(10)
            .line(&catalog)
            .unwrap_err();
        assert!(matches!(err, DomainError::Precondition(_)));
    }

    #[test]
    fn missing_price_is_a_precondition_failure() {
        let (catalog, _, _, _) = catalog_with_special_products();
        let err = SpecialLineBuilder::shipping(&ConnectorConfig::default())
            .line(&catalog)
            .unwrap_err();
        assert!(matches!(err, DomainError::Precondition(_)));
    }

    #[test]
    fn overflowing_signed_price_is_rejected() {
        let (catalog, _, _, _) = catalog_with_special_products();
        let err = SpecialLineBuilder::gift(&ConnectorConfig::default())
            .with_price_unit(i64::MIN)
            .line(&catalog)
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn unregistered_reference_is_not_found() {
        let catalog = InMemoryCatalog::new();
        let err = SpecialLineBuilder::gift(&ConnectorConfig::default())
            .with_price_unit(10)
            .line(&catalog)
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn payload_converts_to_order_line() {
        let (catalog, shipping, _, _) = catalog_with_special_products();
        let line = SpecialLineBuilder::shipping(&ConnectorConfig::default())
            .with_price_unit(100)
            .line(&catalog)
            .unwrap()
            .into_order_line();

        assert_eq!(line.product_id, Some(shipping.id));
        assert_eq!(line.price_unit, Some(100));
        assert_eq!(line.sequence, 999);
        assert!(line.tax_ids.is_empty());
    }
}
