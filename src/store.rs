use async_trait::async_trait;
use sms_core::{IncomingMessage, MessageStore, OutgoingMessage, SmsError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Process-local message store with a provider message id index.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMessageStore {
    inner: Arc<RwLock<StoreInner>>,
}

#[derive(Debug, Default)]
struct StoreInner {
    outgoing: Table<OutgoingMessage>,
    incoming: Table<IncomingMessage>,
}

#[derive(Debug)]
struct Table<T> {
    rows: HashMap<u64, T>,
    by_vendor_id: HashMap<String, u64>,
    next_id: u64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
            by_vendor_id: HashMap::new(),
            next_id: 1,
        }
    }
}

impl<T: Clone> Table<T> {
    fn upsert(&mut self, id: Option<u64>, vendor_ids: Vec<String>, row: impl FnOnce(u64) -> T) -> T {
        let id = match id {
            Some(id) => {
                self.next_id = self.next_id.max(id.saturating_add(1));
                id
            }
            None => {
                let id = self.next_id;
                self.next_id = self.next_id.saturating_add(1);
                id
            }
        };

        // An id moves to the most recently saved record that carries it.
        self.by_vendor_id.retain(|_, row_id| *row_id != id);
        for vendor_id in vendor_ids {
            self.by_vendor_id.insert(vendor_id, id);
        }

        let row = row(id);
        self.rows.insert(id, row.clone());
        row
    }

    fn by_vendor_id(&self, vendor_id: &str) -> Option<T> {
        self.by_vendor_id
            .get(vendor_id)
            .and_then(|id| self.rows.get(id))
            .cloned()
    }
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn outgoing(&self) -> Vec<OutgoingMessage> {
        let inner = self.inner.read().await;
        let mut rows: Vec<_> = inner.outgoing.rows.values().cloned().collect();
        rows.sort_by_key(|m| m.id);
        rows
    }

    pub async fn incoming(&self) -> Vec<IncomingMessage> {
        let inner = self.inner.read().await;
        let mut rows: Vec<_> = inner.incoming.rows.values().cloned().collect();
        rows.sort_by_key(|m| m.id);
        rows
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn save_outgoing(&self, message: OutgoingMessage) -> Result<OutgoingMessage, SmsError> {
        let vendor_ids = message.metadata()?.vendor_message_ids();
        let mut inner = self.inner.write().await;
        let saved = inner.outgoing.upsert(message.id, vendor_ids, |id| OutgoingMessage {
            id: Some(id),
            ..message
        });
        debug!(record = ?saved.id, "outgoing message saved");
        Ok(saved)
    }

    async fn save_incoming(&self, message: IncomingMessage) -> Result<IncomingMessage, SmsError> {
        let vendor_ids = message.metadata()?.vendor_message_ids();
        let mut inner = self.inner.write().await;
        let saved = inner.incoming.upsert(message.id, vendor_ids, |id| IncomingMessage {
            id: Some(id),
            ..message
        });
        debug!(record = ?saved.id, "incoming message saved");
        Ok(saved)
    }

    async fn find_outgoing_by_vendor_id(
        &self,
        vendor_message_id: &str,
    ) -> Result<Option<OutgoingMessage>, SmsError> {
        Ok(self.inner.read().await.outgoing.by_vendor_id(vendor_message_id))
    }

    async fn find_incoming_by_vendor_id(
        &self,
        vendor_message_id: &str,
    ) -> Result<Option<IncomingMessage>, SmsError> {
        Ok(self.inner.read().await.incoming.by_vendor_id(vendor_message_id))
    }
}
