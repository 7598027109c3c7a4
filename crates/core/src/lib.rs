//! `connector-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns)
//! shared by the connector crates.

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{
    FiscalPositionId, InvoiceId, OrderId, PartnerId, PaymentMethodId, PaymentTermId, PickingId,
    PricelistId, ProductId, TaxId, UomId, WorkflowProcessId,
};
