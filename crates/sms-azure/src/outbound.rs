//! Outbound send adapter: resolves credentials for one message, sends it and
//! folds the per-recipient results into the message's transmission metadata.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sms_core::message::{RECIPIENTS, VENDOR_MESSAGE_ID};
use sms_core::{
    OutgoingMessage, RecipientResult, SendRequest, SmsClient, SmsError, TransmissionMetadata,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::client::AzureSmsClient;

/// Bodies with this prefix carry media, which this channel does not send.
pub const IMAGE_PREFIX: &str = "image:";

/// Channel settings. Used both for process-wide defaults and per-call overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendConfig {
    #[serde(default)]
    pub connection_string: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub enable_delivery_report: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSendConfig {
    pub connection_string: String,
    pub phone_number: String,
    pub enable_delivery_report: bool,
}

fn non_blank(value: Option<&String>) -> Option<&String> {
    value.filter(|v| !v.trim().is_empty())
}

impl SendConfig {
    /// Per-call value first, then the default. `None` when any key is unresolved.
    pub fn resolve(overrides: Option<&SendConfig>, defaults: &SendConfig) -> Option<ResolvedSendConfig> {
        let connection_string = overrides
            .and_then(|o| non_blank(o.connection_string.as_ref()))
            .or_else(|| non_blank(defaults.connection_string.as_ref()))?;
        let phone_number = overrides
            .and_then(|o| non_blank(o.phone_number.as_ref()))
            .or_else(|| non_blank(defaults.phone_number.as_ref()))?;
        let enable_delivery_report = overrides
            .and_then(|o| o.enable_delivery_report)
            .or(defaults.enable_delivery_report)?;

        Some(ResolvedSendConfig {
            connection_string: connection_string.clone(),
            phone_number: phone_number.clone(),
            enable_delivery_report,
        })
    }
}

/// Builds the vendor client for a resolved connection string.
pub trait ClientFactory: Send + Sync {
    fn connect(
        &self,
        connection_string: &str,
        timeout: Duration,
    ) -> Result<Arc<dyn SmsClient>, SmsError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AzureClientFactory;

impl ClientFactory for AzureClientFactory {
    fn connect(
        &self,
        connection_string: &str,
        timeout: Duration,
    ) -> Result<Arc<dyn SmsClient>, SmsError> {
        Ok(Arc::new(AzureSmsClient::from_connection_string(
            connection_string,
            timeout,
        )?))
    }
}

#[derive(Clone)]
pub struct AzureOutbound {
    defaults: SendConfig,
    timeout: Duration,
    factory: Arc<dyn ClientFactory>,
}

impl AzureOutbound {
    pub fn new(defaults: SendConfig, timeout: Duration) -> Self {
        Self {
            defaults,
            timeout,
            factory: Arc::new(AzureClientFactory),
        }
    }

    pub fn with_factory(mut self, factory: Arc<dyn ClientFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Send `message` and record the outcome in its transmission metadata.
    ///
    /// Returns `Ok(None)` when the channel is not configured, without any
    /// network call. Media bodies are skipped and return the metadata as it
    /// was. Transport and provider errors propagate; nothing is retried.
    pub async fn send(
        &self,
        message: &mut OutgoingMessage,
        overrides: Option<&SendConfig>,
    ) -> Result<Option<TransmissionMetadata>, SmsError> {
        let Some(config) = SendConfig::resolve(overrides, &self.defaults) else {
            debug!("Azure SMS channel not configured, skipping send");
            return Ok(None);
        };

        if message.message.is_empty() {
            return Err(SmsError::Invalid("message body is empty".into()));
        }
        if message.current_destination().trim().is_empty() {
            return Err(SmsError::Invalid("message has no destination".into()));
        }

        let mut metadata = message.metadata()?;

        if message.message.starts_with(IMAGE_PREFIX) {
            warn!(
                destination = message.current_destination(),
                "media messages are not supported on the Azure channel, not sent"
            );
            return Ok(Some(metadata));
        }

        let client = self.factory.connect(&config.connection_string, self.timeout)?;
        let response = client
            .send(SendRequest {
                to: message.current_destination(),
                from: &config.phone_number,
                text: &message.message,
                enable_delivery_report: config.enable_delivery_report,
            })
            .await?;

        if response.results.is_empty() {
            warn!("provider returned no per-recipient results");
        }
        fold_results(&mut metadata, &response.results);
        message.set_metadata(&metadata)?;

        info!(
            provider = response.provider,
            recipients = response.results.len(),
            "outbound message handed to provider"
        );
        Ok(Some(metadata))
    }
}

fn fold_results(metadata: &mut TransmissionMetadata, results: &[RecipientResult]) {
    for result in results {
        metadata.insert(VENDOR_MESSAGE_ID, json!(result.message_id));
        metadata.insert("successful", json!(result.successful));
        metadata.insert("error_message", json!(result.error_message));
    }

    if results.len() > 1 {
        let recipients: Vec<Value> = results
            .iter()
            .map(|r| {
                json!({
                    "to": r.to,
                    (VENDOR_MESSAGE_ID): r.message_id,
                    "successful": r.successful,
                    "error_message": r.error_message,
                })
            })
            .collect();
        metadata.insert(RECIPIENTS, Value::Array(recipients));
    }
}
