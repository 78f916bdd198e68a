use async_trait::async_trait;

use crate::{IncomingMessage, OutgoingMessage, SmsError};

/// Persistence for outbound and inbound message records.
///
/// Implementations keep an index from provider message id to record so
/// delivery reports can be matched without scanning metadata text. The ids
/// come from [`TransmissionMetadata::vendor_message_ids`](crate::TransmissionMetadata::vendor_message_ids)
/// and are refreshed on every save.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert or update an outgoing record, assigning an id on first save.
    async fn save_outgoing(&self, message: OutgoingMessage) -> Result<OutgoingMessage, SmsError>;

    /// Insert or update an incoming record, assigning an id on first save.
    async fn save_incoming(&self, message: IncomingMessage) -> Result<IncomingMessage, SmsError>;

    async fn find_outgoing_by_vendor_id(
        &self,
        vendor_message_id: &str,
    ) -> Result<Option<OutgoingMessage>, SmsError>;

    async fn find_incoming_by_vendor_id(
        &self,
        vendor_message_id: &str,
    ) -> Result<Option<IncomingMessage>, SmsError>;
}
