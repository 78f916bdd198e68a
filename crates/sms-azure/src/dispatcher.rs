//! Inbound Event Grid dispatcher.
//!
//! Each webhook batch is processed event by event: `SMSReceived` events are
//! stored as incoming messages (subject to the registered hooks), delivery
//! reports are attached to the records they refer to, and the subscription
//! validation handshake is echoed back.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sms_core::message::VENDOR_MESSAGE_ID;
use sms_core::{
    DispatchOutcome, Event, FieldCipher, Headers, HookRegistry, InboundWebhook, IncomingMessage,
    MessageStore, RecordPolicy, SmsError,
};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::events::{parse_batch, EventKind, DELIVERED};
use crate::PROVIDER;

/// Metadata key under which a delivery report payload is attached.
pub const DELIVERY_REPORT_KEY: &str = "azure_delivery_report";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    pub record_policy: RecordPolicy,
    /// Also encrypt the recipient of incoming messages when a cipher is set.
    pub encrypt_recipient: bool,
}

#[derive(Clone)]
pub struct AzureEventDispatcher {
    store: Arc<dyn MessageStore>,
    hooks: HookRegistry,
    cipher: Option<Arc<dyn FieldCipher>>,
    options: DispatchOptions,
    http: reqwest::Client,
}

impl AzureEventDispatcher {
    /// `timeout` bounds the validation URL request.
    pub fn new(store: Arc<dyn MessageStore>, timeout: Duration) -> Result<Self, SmsError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SmsError::Http(e.to_string()))?;
        Ok(Self {
            store,
            hooks: HookRegistry::new(),
            cipher: None,
            options: DispatchOptions::default(),
            http,
        })
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_cipher(mut self, cipher: Option<Arc<dyn FieldCipher>>) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Process every event of the batch in order.
    pub async fn dispatch(&self, events: Vec<Event>) -> Result<DispatchOutcome, SmsError> {
        let mut outcome = DispatchOutcome::default();

        for event in &events {
            if let Some(code) = event.data_str("validationCode") {
                if outcome.validation_response.is_none() {
                    outcome.validation_response = Some(code.to_string());
                }
            }
            if let Some(url) = event.data_str("validationUrl") {
                self.echo_validation_url(url);
            }

            match EventKind::classify(&event.event_type) {
                EventKind::SmsReceived => self.record(event, &mut outcome).await?,
                EventKind::DeliveryReport => self.reconcile(event, &mut outcome).await?,
                EventKind::SubscriptionValidation => {
                    debug!("subscription validation event");
                }
                EventKind::Unknown if event.data.contains_key("validationCode") => {
                    debug!("untyped validation event");
                }
                EventKind::Unknown => {
                    info!(event_type = %event.event_type, "ignoring unsupported event type");
                    outcome.skipped += 1;
                }
            }
        }

        if !outcome.hook_replies.is_empty() {
            debug!(
                replies = outcome.hook_replies.len(),
                "hook replies collected, not sent to provider"
            );
        }
        Ok(outcome)
    }

    async fn record(&self, event: &Event, outcome: &mut DispatchOutcome) -> Result<(), SmsError> {
        let message_id = event.data_str("messageId");

        if let Some(id) = message_id {
            if self.store.find_incoming_by_vendor_id(id).await?.is_some() {
                debug!(message_id = id, "incoming message already recorded");
                outcome.duplicates += 1;
                return Ok(());
            }
        }

        outcome.hook_replies.extend(self.hooks.responses(event));

        if !self.hooks.should_record(event, self.options.record_policy) {
            debug!(message_id, "hooks declined recording");
            outcome.declined += 1;
            return Ok(());
        }

        let (Some(sender), Some(recipient)) = (event.data_str("from"), event.data_str("to")) else {
            warn!(message_id, "SMSReceived event without from/to, skipped");
            outcome.skipped += 1;
            return Ok(());
        };

        let mut metadata: Map<String, Value> = match event.to_value() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Some(id) = message_id {
            metadata.insert(VENDOR_MESSAGE_ID.to_string(), Value::String(id.to_string()));
        }
        if let (Some(cipher), Some(Value::Object(data))) = (&self.cipher, metadata.get_mut("data")) {
            let keys: &[&str] = if self.options.encrypt_recipient {
                &["from", "to"]
            } else {
                &["from"]
            };
            encrypt_numbers(cipher.as_ref(), data, keys)?;
        }

        let mut incoming = IncomingMessage {
            id: None,
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            receive_date: OffsetDateTime::now_utc(),
            message: event.data_str("message").unwrap_or_default().trim().to_string(),
            transmission_metadata: None,
        };
        incoming.set_metadata(&metadata.into())?;

        if let Some(cipher) = &self.cipher {
            incoming.encrypt_sender(cipher.as_ref())?;
            if self.options.encrypt_recipient {
                incoming.encrypt_recipient(cipher.as_ref())?;
            }
        }

        let incoming = self.store.save_incoming(incoming).await?;
        info!(record = ?incoming.id, message_id, "incoming SMS recorded");
        outcome.recorded += 1;

        self.hooks.notify_incoming(&incoming).await;
        Ok(())
    }

    async fn reconcile(&self, event: &Event, outcome: &mut DispatchOutcome) -> Result<(), SmsError> {
        let Some(message_id) = event.data_str("messageId") else {
            debug!("delivery report without messageId, skipped");
            outcome.skipped += 1;
            return Ok(());
        };

        let report = self.delivery_payload(event)?;
        let delivered = event.data_str("deliveryStatus") == Some(DELIVERED);
        let mut matched = false;

        if let Some(mut outgoing) = self.store.find_outgoing_by_vendor_id(message_id).await? {
            let mut metadata = outgoing.metadata().map_err(stored)?;
            metadata.insert(DELIVERY_REPORT_KEY, report.clone());
            outgoing.set_metadata(&metadata)?;
            outgoing.errored = !delivered;
            let outgoing = self.store.save_outgoing(outgoing).await?;
            info!(
                record = ?outgoing.id,
                message_id,
                status = event.data_str("deliveryStatus"),
                "delivery report applied to outgoing message"
            );
            matched = true;
        }

        if let Some(mut incoming) = self.store.find_incoming_by_vendor_id(message_id).await? {
            let mut metadata = incoming.metadata().map_err(stored)?;
            metadata.insert(DELIVERY_REPORT_KEY, report);
            incoming.set_metadata(&metadata)?;
            self.store.save_incoming(incoming).await?;
            matched = true;
        }

        if matched {
            outcome.reconciled += 1;
        } else {
            debug!(message_id, "no record for delivery report");
        }
        Ok(())
    }

    fn delivery_payload(&self, event: &Event) -> Result<Value, SmsError> {
        let mut payload = event.data.clone();
        if let Some(cipher) = &self.cipher {
            encrypt_numbers(cipher.as_ref(), &mut payload, &["to", "from"])?;
        }
        Ok(Value::Object(payload))
    }

    fn echo_validation_url(&self, url: &str) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime, validation URL not called");
            return;
        };
        let http = self.http.clone();
        let url = url.to_string();
        handle.spawn(async move {
            match http.get(&url).send().await {
                Ok(res) => debug!(status = %res.status(), "validation URL called"),
                Err(e) => warn!(error = %e, "validation URL request failed"),
            }
        });
    }
}

fn encrypt_numbers(
    cipher: &dyn FieldCipher,
    data: &mut Map<String, Value>,
    keys: &[&str],
) -> Result<(), SmsError> {
    for key in keys {
        if let Some(Value::String(number)) = data.get_mut(*key) {
            if !cipher.is_encrypted(number) {
                *number = cipher.encrypt(number)?;
            }
        }
    }
    Ok(())
}

/// A record that no longer parses is a storage fault, not a bad request.
fn stored(err: SmsError) -> SmsError {
    match err {
        SmsError::Invalid(msg) => SmsError::Store(format!("stored record: {}", msg)),
        other => other,
    }
}

#[async_trait]
impl InboundWebhook for AzureEventDispatcher {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn handle(&self, _headers: &Headers, body: &[u8]) -> Result<DispatchOutcome, SmsError> {
        let batch = parse_batch(body)?;
        debug!(
            events = batch.events.len(),
            malformed = batch.malformed,
            "Azure webhook batch received"
        );
        let mut outcome = self.dispatch(batch.events).await?;
        outcome.skipped += batch.malformed;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use sms_core::{MessageHook, OutgoingMessage, TransmissionMetadata};
    use std::sync::Mutex;

    /// Linear-scan store; enough to drive the dispatcher.
    #[derive(Default)]
    struct VecStore {
        outgoing: Mutex<Vec<OutgoingMessage>>,
        incoming: Mutex<Vec<IncomingMessage>>,
    }

    fn has_id(metadata: Option<&str>, id: &str) -> bool {
        TransmissionMetadata::parse(metadata)
            .map(|m| m.vendor_message_ids().iter().any(|known| known == id))
            .unwrap_or(false)
    }

    #[async_trait]
    impl MessageStore for VecStore {
        async fn save_outgoing(&self, mut m: OutgoingMessage) -> Result<OutgoingMessage, SmsError> {
            let mut rows = self.outgoing.lock().unwrap();
            match m.id {
                Some(id) => rows[id as usize] = m.clone(),
                None => {
                    m.id = Some(rows.len() as u64);
                    rows.push(m.clone());
                }
            }
            Ok(m)
        }

        async fn save_incoming(&self, mut m: IncomingMessage) -> Result<IncomingMessage, SmsError> {
            let mut rows = self.incoming.lock().unwrap();
            match m.id {
                Some(id) => rows[id as usize] = m.clone(),
                None => {
                    m.id = Some(rows.len() as u64);
                    rows.push(m.clone());
                }
            }
            Ok(m)
        }

        async fn find_outgoing_by_vendor_id(
            &self,
            id: &str,
        ) -> Result<Option<OutgoingMessage>, SmsError> {
            let rows = self.outgoing.lock().unwrap();
            Ok(rows
                .iter()
                .find(|m| has_id(m.transmission_metadata.as_deref(), id))
                .cloned())
        }

        async fn find_incoming_by_vendor_id(
            &self,
            id: &str,
        ) -> Result<Option<IncomingMessage>, SmsError> {
            let rows = self.incoming.lock().unwrap();
            Ok(rows
                .iter()
                .find(|m| has_id(m.transmission_metadata.as_deref(), id))
                .cloned())
        }
    }

    struct Prefix;

    impl FieldCipher for Prefix {
        fn encrypt(&self, plaintext: &str) -> Result<String, SmsError> {
            Ok(format!("enc:{}", plaintext.chars().rev().collect::<String>()))
        }

        fn decrypt(&self, value: &str) -> Result<String, SmsError> {
            Ok(match value.strip_prefix("enc:") {
                Some(rest) => rest.chars().rev().collect(),
                None => value.to_string(),
            })
        }

        fn is_encrypted(&self, value: &str) -> bool {
            value.starts_with("enc:")
        }
    }

    struct Decline;

    #[async_trait]
    impl MessageHook for Decline {
        fn name(&self) -> &str {
            "decline"
        }

        fn record_response(&self, _event: &Event) -> Option<bool> {
            Some(false)
        }
    }

    fn dispatcher(store: &Arc<VecStore>) -> AzureEventDispatcher {
        AzureEventDispatcher::new(store.clone(), Duration::from_secs(5)).unwrap()
    }

    fn received(id: &str) -> Value {
        json!({
            "id": "evt-1",
            "eventType": "Microsoft.Communication.SMSReceived",
            "data": {
                "messageId": id,
                "from": "+1777",
                "to": "+1555",
                "message": " hi ",
                "receivedTimestamp": "2024-01-01T00:00:00Z"
            }
        })
    }

    fn report(id: &str, status: &str) -> Value {
        json!({
            "eventType": "Microsoft.Communication.SMSDeliveryReportReceived",
            "data": {
                "messageId": id,
                "from": "+1555",
                "to": "+1777",
                "deliveryStatus": status,
                "deliveryStatusDetails": "No error."
            }
        })
    }

    fn body(events: &[Value]) -> Vec<u8> {
        serde_json::to_vec(events).unwrap()
    }

    async fn seed_outgoing(store: &VecStore, vendor_id: &str) -> OutgoingMessage {
        let mut message = OutgoingMessage::new("+1777", "hello");
        let mut metadata = TransmissionMetadata::new();
        metadata.insert(VENDOR_MESSAGE_ID, json!(vendor_id));
        message.set_metadata(&metadata).unwrap();
        store.save_outgoing(message).await.unwrap()
    }

    #[tokio::test]
    async fn received_event_is_recorded_once() {
        let store = Arc::new(VecStore::default());
        let outcome = dispatcher(&store)
            .handle(&vec![], &body(&[received("in-1")]))
            .await
            .unwrap();

        assert_eq!(outcome.recorded, 1);
        let rows = store.incoming.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sender, "+1777");
        assert_eq!(rows[0].recipient, "+1555");
        assert_eq!(rows[0].message, "hi");
        let metadata = rows[0].metadata().unwrap();
        assert_eq!(metadata.get(VENDOR_MESSAGE_ID), Some(&json!("in-1")));
        assert_eq!(metadata.get("id"), Some(&json!("evt-1")));
    }

    #[tokio::test]
    async fn redelivered_event_is_not_recorded_twice() {
        let store = Arc::new(VecStore::default());
        let d = dispatcher(&store);
        d.handle(&vec![], &body(&[received("in-1")])).await.unwrap();
        let outcome = d.handle(&vec![], &body(&[received("in-1")])).await.unwrap();

        assert_eq!(outcome.recorded, 0);
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(store.incoming.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sender_is_encrypted_when_cipher_is_set() {
        let store = Arc::new(VecStore::default());
        let cipher: Arc<dyn FieldCipher> = Arc::new(Prefix);
        dispatcher(&store)
            .with_cipher(Some(cipher.clone()))
            .handle(&vec![], &body(&[received("in-1")]))
            .await
            .unwrap();

        let rows = store.incoming.lock().unwrap();
        assert_eq!(rows[0].sender, "enc:7771+");
        assert_eq!(rows[0].recipient, "+1555");
        assert_eq!(rows[0].current_sender(cipher.as_ref()).unwrap(), "+1777");
    }

    #[tokio::test]
    async fn recipient_encryption_is_opt_in() {
        let store = Arc::new(VecStore::default());
        dispatcher(&store)
            .with_cipher(Some(Arc::new(Prefix)))
            .with_options(DispatchOptions {
                encrypt_recipient: true,
                ..Default::default()
            })
            .handle(&vec![], &body(&[received("in-1")]))
            .await
            .unwrap();

        assert_eq!(store.incoming.lock().unwrap()[0].recipient, "enc:5551+");
    }

    #[tokio::test]
    async fn declining_hook_prevents_recording() {
        let store = Arc::new(VecStore::default());
        let outcome = dispatcher(&store)
            .with_hooks(HookRegistry::new().with(Arc::new(Decline)))
            .handle(&vec![], &body(&[received("in-1")]))
            .await
            .unwrap();

        assert_eq!(outcome.declined, 1);
        assert!(store.incoming.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delivery_report_sets_errored_from_status() {
        let store = Arc::new(VecStore::default());
        seed_outgoing(&store, "out-1").await;
        seed_outgoing(&store, "out-2").await;

        let outcome = dispatcher(&store)
            .handle(
                &vec![],
                &body(&[report("out-1", "Failed"), report("out-2", "Delivered")]),
            )
            .await
            .unwrap();

        assert_eq!(outcome.reconciled, 2);
        let rows = store.outgoing.lock().unwrap();
        assert!(rows[0].errored);
        assert!(!rows[1].errored);
        let metadata = rows[0].metadata().unwrap();
        assert_eq!(
            metadata.get(DELIVERY_REPORT_KEY).unwrap()["deliveryStatus"],
            "Failed"
        );
        assert_eq!(metadata.get(VENDOR_MESSAGE_ID), Some(&json!("out-1")));
    }

    #[tokio::test]
    async fn delivery_report_numbers_are_encrypted_with_cipher() {
        let store = Arc::new(VecStore::default());
        seed_outgoing(&store, "out-1").await;
        dispatcher(&store)
            .with_cipher(Some(Arc::new(Prefix)))
            .handle(&vec![], &body(&[report("out-1", "Delivered")]))
            .await
            .unwrap();

        let metadata = store.outgoing.lock().unwrap()[0].metadata().unwrap();
        let attached = metadata.get(DELIVERY_REPORT_KEY).unwrap();
        assert_eq!(attached["to"], "enc:7771+");
        assert_eq!(attached["from"], "enc:5551+");
    }

    #[tokio::test]
    async fn delivery_report_also_attaches_to_incoming_record() {
        let store = Arc::new(VecStore::default());
        let d = dispatcher(&store);
        d.handle(&vec![], &body(&[received("shared")])).await.unwrap();
        seed_outgoing(&store, "shared").await;

        d.handle(&vec![], &body(&[report("shared", "Failed")]))
            .await
            .unwrap();

        assert!(store.outgoing.lock().unwrap()[0].errored);
        let incoming = store.incoming.lock().unwrap()[0].metadata().unwrap();
        assert!(incoming.get(DELIVERY_REPORT_KEY).is_some());
    }

    #[tokio::test]
    async fn unmatched_report_and_unknown_event_are_inert() {
        let store = Arc::new(VecStore::default());
        seed_outgoing(&store, "out-1").await;
        let before = store.outgoing.lock().unwrap().clone();

        let outcome = dispatcher(&store)
            .handle(
                &vec![],
                &body(&[
                    report("missing", "Failed"),
                    json!({ "eventType": "Microsoft.Communication.ChatMessageReceived", "data": {} }),
                ]),
            )
            .await
            .unwrap();

        assert_eq!(outcome.reconciled, 0);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(*store.outgoing.lock().unwrap(), before);
        assert!(store.incoming.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn whole_batch_is_processed() {
        let store = Arc::new(VecStore::default());
        let outcome = dispatcher(&store)
            .handle(
                &vec![],
                &body(&[received("a"), received("b"), received("c")]),
            )
            .await
            .unwrap();
        assert_eq!(outcome.recorded, 3);
    }

    #[tokio::test]
    async fn validation_code_is_echoed() {
        let store = Arc::new(VecStore::default());
        let outcome = dispatcher(&store)
            .handle(&vec![], br#"[{"eventType":"Microsoft.EventGrid.SubscriptionValidationEvent","data":{"validationCode":"abc"}}]"#)
            .await
            .unwrap();
        assert_eq!(outcome.validation_response.as_deref(), Some("abc"));
        assert_eq!(outcome.skipped, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn validation_url_is_called_in_background() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/validate");
            then.status(200);
        });

        let store = Arc::new(VecStore::default());
        let event = json!({
            "eventType": "Microsoft.EventGrid.SubscriptionValidationEvent",
            "data": { "validationCode": "abc", "validationUrl": server.url("/validate") }
        });
        let outcome = dispatcher(&store)
            .handle(&vec![], &body(&[event]))
            .await
            .unwrap();
        assert_eq!(outcome.validation_response.as_deref(), Some("abc"));

        for _ in 0..50 {
            if mock.hits() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        mock.assert();
    }

    #[tokio::test]
    async fn untyped_validation_event_is_echoed() {
        let store = Arc::new(VecStore::default());
        let outcome = dispatcher(&store)
            .handle(&vec![], br#"[{"data":{"validationCode":"abc"}}]"#)
            .await
            .unwrap();
        assert_eq!(outcome.validation_response.as_deref(), Some("abc"));
        assert_eq!(outcome.skipped, 0);
    }

    #[tokio::test]
    async fn bad_event_does_not_cost_the_batch() {
        let store = Arc::new(VecStore::default());
        let outcome = dispatcher(&store)
            .handle(
                &vec![],
                &body(&[
                    received("in-1"),
                    json!({ "eventType": "X", "data": null }),
                    json!("not an event"),
                ]),
            )
            .await
            .unwrap();

        assert_eq!(outcome.recorded, 1);
        assert_eq!(outcome.skipped, 2);
        assert_eq!(store.incoming.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stored_metadata_keeps_numbers_encrypted() {
        let store = Arc::new(VecStore::default());
        dispatcher(&store)
            .with_cipher(Some(Arc::new(Prefix)))
            .handle(&vec![], &body(&[received("in-1")]))
            .await
            .unwrap();

        let rows = store.incoming.lock().unwrap();
        let text = rows[0].transmission_metadata.as_deref().unwrap();
        assert!(!text.contains("+1777"));
        let metadata = rows[0].metadata().unwrap();
        assert_eq!(metadata.get("data").unwrap()["from"], "enc:7771+");
        assert_eq!(metadata.get("data").unwrap()["to"], "+1555");
        assert_eq!(metadata.get(VENDOR_MESSAGE_ID), Some(&json!("in-1")));
    }

    #[tokio::test]
    async fn stored_metadata_encrypts_recipient_when_enabled() {
        let store = Arc::new(VecStore::default());
        dispatcher(&store)
            .with_cipher(Some(Arc::new(Prefix)))
            .with_options(DispatchOptions {
                encrypt_recipient: true,
                ..Default::default()
            })
            .handle(&vec![], &body(&[received("in-1")]))
            .await
            .unwrap();

        let text = store.incoming.lock().unwrap()[0]
            .transmission_metadata
            .clone()
            .unwrap();
        assert!(!text.contains("+1777"));
        assert!(!text.contains("+1555"));
    }

    #[tokio::test]
    async fn received_without_numbers_is_skipped() {
        let store = Arc::new(VecStore::default());
        let event = json!({
            "eventType": "Microsoft.Communication.SMSReceived",
            "data": { "messageId": "in-1", "to": "+1555", "message": "hi" }
        });
        let outcome = dispatcher(&store)
            .handle(&vec![], &body(&[event]))
            .await
            .unwrap();

        assert_eq!(outcome.recorded, 0);
        assert_eq!(outcome.skipped, 1);
        assert!(store.incoming.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn report_without_message_id_is_skipped() {
        let store = Arc::new(VecStore::default());
        seed_outgoing(&store, "out-1").await;
        let event = json!({
            "eventType": "Microsoft.Communication.SMSDeliveryReportReceived",
            "data": { "deliveryStatus": "Failed" }
        });
        let outcome = dispatcher(&store)
            .handle(&vec![], &body(&[event]))
            .await
            .unwrap();

        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.reconciled, 0);
        assert!(!store.outgoing.lock().unwrap()[0].errored);
    }

    #[tokio::test]
    async fn received_without_message_id_is_recorded_each_time() {
        let store = Arc::new(VecStore::default());
        let d = dispatcher(&store);
        let event = json!({
            "eventType": "Microsoft.Communication.SMSReceived",
            "data": { "from": "+1777", "to": "+1555", "message": "hi" }
        });

        for _ in 0..2 {
            let outcome = d.handle(&vec![], &body(&[event.clone()])).await.unwrap();
            assert_eq!(outcome.recorded, 1);
            assert_eq!(outcome.duplicates, 0);
        }
        let rows = store.incoming.lock().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].metadata().unwrap().get(VENDOR_MESSAGE_ID).is_none());
    }

    struct Silent;

    #[async_trait]
    impl MessageHook for Silent {
        fn name(&self) -> &str {
            "silent"
        }
    }

    #[tokio::test]
    async fn last_hook_wins_records_when_no_hook_answers() {
        let store = Arc::new(VecStore::default());
        let outcome = dispatcher(&store)
            .with_hooks(HookRegistry::new().with(Arc::new(Silent)))
            .with_options(DispatchOptions {
                record_policy: RecordPolicy::LastHookWins,
                ..Default::default()
            })
            .handle(&vec![], &body(&[received("in-1")]))
            .await
            .unwrap();

        assert_eq!(outcome.recorded, 1);
        assert_eq!(outcome.declined, 0);
    }

    /// Hands back a record whose metadata no longer parses.
    struct CorruptStore;

    #[async_trait]
    impl MessageStore for CorruptStore {
        async fn save_outgoing(&self, m: OutgoingMessage) -> Result<OutgoingMessage, SmsError> {
            Ok(m)
        }

        async fn save_incoming(&self, m: IncomingMessage) -> Result<IncomingMessage, SmsError> {
            Ok(m)
        }

        async fn find_outgoing_by_vendor_id(
            &self,
            _id: &str,
        ) -> Result<Option<OutgoingMessage>, SmsError> {
            let mut message = OutgoingMessage::new("+1777", "hello");
            message.id = Some(1);
            message.transmission_metadata = Some("{broken".into());
            Ok(Some(message))
        }

        async fn find_incoming_by_vendor_id(
            &self,
            _id: &str,
        ) -> Result<Option<IncomingMessage>, SmsError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn corrupt_stored_metadata_is_a_store_error() {
        let err = AzureEventDispatcher::new(Arc::new(CorruptStore), Duration::from_secs(5))
            .unwrap()
            .handle(&vec![], &body(&[report("out-1", "Failed")]))
            .await
            .unwrap_err();
        assert!(matches!(err, SmsError::Store(_)));
    }

    #[tokio::test]
    async fn malformed_body_is_invalid() {
        let store = Arc::new(VecStore::default());
        let err = dispatcher(&store)
            .handle(&vec![], b"{oops")
            .await
            .unwrap_err();
        assert!(matches!(err, SmsError::Invalid(_)));
    }
}
