//! Event Grid event types published by Azure Communication Services.

use serde_json::Value;
use sms_core::{Event, SmsError};
use tracing::warn;

pub const SMS_RECEIVED: &str = "Microsoft.Communication.SMSReceived";
pub const SMS_DELIVERY_REPORT_RECEIVED: &str = "Microsoft.Communication.SMSDeliveryReportReceived";
pub const SUBSCRIPTION_VALIDATION: &str = "Microsoft.EventGrid.SubscriptionValidationEvent";

/// `deliveryStatus` of a successful delivery report.
pub const DELIVERED: &str = "Delivered";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    SmsReceived,
    DeliveryReport,
    SubscriptionValidation,
    Unknown,
}

impl EventKind {
    /// Accepts both the fully qualified and the short event type names.
    pub fn classify(event_type: &str) -> Self {
        let short = event_type.rsplit('.').next().unwrap_or(event_type);
        match short {
            "SMSReceived" => EventKind::SmsReceived,
            "SMSDeliveryReportReceived" => EventKind::DeliveryReport,
            "SubscriptionValidationEvent" => EventKind::SubscriptionValidation,
            _ => EventKind::Unknown,
        }
    }
}

/// A decoded webhook body.
#[derive(Debug, Default)]
pub struct Batch {
    pub events: Vec<Event>,
    /// Elements that could not be read as an event and were dropped.
    pub malformed: usize,
}

/// Decode a webhook body. Event Grid posts a JSON array; a lone object is
/// accepted as a batch of one. Each element is decoded on its own so a bad
/// element does not cost the rest of the batch.
pub fn parse_batch(body: &[u8]) -> Result<Batch, SmsError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| SmsError::Invalid(format!("webhook body is not JSON: {}", e)))?;
    let items = match value {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        other => {
            return Err(SmsError::Invalid(format!(
                "webhook body must be an array of events, got {}",
                other
            )))
        }
    };

    let mut batch = Batch::default();
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<Event>(item) {
            Ok(event) => batch.events.push(event),
            Err(e) => {
                warn!(index, error = %e, "malformed event skipped");
                batch.malformed += 1;
            }
        }
    }
    Ok(batch)
}
