//! Message logging scoped to a record (the order's discussion thread).

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use connector_core::{InvoiceId, OrderId, PickingId};

/// A record a message can be posted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "model", content = "id", rename_all = "snake_case")]
pub enum RecordRef {
    SaleOrder(OrderId),
    Picking(PickingId),
    Invoice(InvoiceId),
}

/// A message posted on a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub record: RecordRef,
    pub body: String,
    pub posted_at: DateTime<Utc>,
}

/// Append-only message sink.
pub trait MessageLog: Send + Sync {
    fn post(&self, record: RecordRef, body: &str);
}

impl<L> MessageLog for Arc<L>
where
    L: MessageLog + ?Sized,
{
    fn post(&self, record: RecordRef, body: &str) {
        (**self).post(record, body)
    }
}

/// In-memory message log for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryMessageLog {
    inner: RwLock<Vec<Message>>,
}

impl InMemoryMessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages posted on `record`, oldest first.
    pub fn messages_for(&self, record: RecordRef) -> Vec<Message> {
        match self.inner.read() {
            Ok(messages) => messages
                .iter()
                .filter(|m| m.record == record)
                .cloned()
                .collect(),
            Err(_) => vec![],
        }
    }

    pub fn all(&self) -> Vec<Message> {
        self.inner.read().map(|m| m.clone()).unwrap_or_default()
    }
}

impl MessageLog for InMemoryMessageLog {
    fn post(&self, record: RecordRef, body: &str) {
        if let Ok(mut messages) = self.inner.write() {
            messages.push(Message {
                record,
                body: body.to_string(),
                posted_at: Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_scoped_to_their_record() {
        let log = InMemoryMessageLog::new();
        let order = RecordRef::SaleOrder(OrderId::new());
        let picking = RecordRef::Picking(PickingId::new());

        log.post(order, "first");
        log.post(picking, "elsewhere");
        log.post(order, "second");

        let bodies: Vec<_> = log
            .messages_for(order)
            .into_iter()
            .map(|m| m.body)
            .collect();
        assert_eq!(bodies, vec!["first", "second"]);
        assert_eq!(log.all().len(), 3);
    }

    #[test]
    fn record_ref_serializes_with_model_tag() {
        let id = InvoiceId::new();
        let json = serde_json::to_value(RecordRef::Invoice(id)).unwrap();
        assert_eq!(json["model"], "invoice");
        assert_eq!(json["id"], id.to_string());
    }
}
