//! Sales order extensions for e-commerce connectors.
//!
//! - [`cancellation`]: orders cancelled on the backend, automatic
//!   cancellation and the parent-order cascade;
//! - [`onchange`]: replay of the form recomputations on imported orders;
//! - [`line_builder`]: shipping, cash-on-delivery and gift lines.
//!
//! The host system is reached through traits ([`SaleOrderStore`],
//! [`CancelTransitions`], [`MessageLog`], [`OnchangeRules`],
//! [`ProductCatalog`]), each with an in-memory implementation.

pub mod cancellation;
pub mod catalog;
pub mod chatter;
pub mod config;
pub mod line_builder;
pub mod onchange;
pub mod order;
pub mod parent;
pub mod rules;
pub mod store;
pub mod transitions;
pub mod update;

pub use cancellation::{AutoCancelOutcome, CancelError, CancellationResolver, OrderList, ParentView};
pub use catalog::{
    FiscalPosition, InMemoryCatalog, Partner, PartnerKind, PaymentMethod, Pricelist, Product,
    ProductCatalog, ProductRef, WorkflowProcess,
};
pub use chatter::{InMemoryMessageLog, Message, MessageLog, RecordRef};
pub use config::ConnectorConfig;
pub use line_builder::{SpecialLine, SpecialLineBuilder};
pub use onchange::{OnchangeRules, ProductChange, SaleOrderOnchange};
pub use order::{
    InvoicePolicy, PickingPolicy, SaleOrder, SaleOrderLine, SaleOrderState, SaleOrderWrite,
};
pub use parent::{NoParent, ParentMap, ParentResolver};
pub use rules::CatalogRules;
pub use store::{InMemorySaleOrderStore, SaleOrderStore};
pub use transitions::{CancelTransitions, StandardTransitions, TransitionError};
pub use update::{LineUpdate, OrderUpdate, Unset};
