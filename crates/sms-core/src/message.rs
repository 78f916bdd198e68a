//! Message entities owned by the surrounding messaging framework.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::{FieldCipher, SmsError};

/// Metadata key holding the provider's message id.
pub const VENDOR_MESSAGE_ID: &str = "vendor_message_id";
/// Metadata key holding every per-recipient result of a multi-recipient send.
pub const RECIPIENTS: &str = "azure_recipients";

/// Opaque key-value mapping attached to a message, persisted as JSON text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransmissionMetadata(Map<String, Value>);

impl TransmissionMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse stored text. `None` or blank text yields an empty mapping.
    pub fn parse(text: Option<&str>) -> Result<Self, SmsError> {
        match text.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => Ok(Self(map)),
                Ok(other) => Err(SmsError::Invalid(format!(
                    "transmission metadata is not an object: {}",
                    other
                ))),
                Err(e) => Err(SmsError::Invalid(format!("transmission metadata: {}", e))),
            },
        }
    }

    /// Serialize with two-space indentation.
    pub fn to_text(&self) -> Result<String, SmsError> {
        serde_json::to_string_pretty(&self.0)
            .map_err(|e| SmsError::Unexpected(format!("metadata serialization: {}", e)))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Every provider message id this record is known under.
    pub fn vendor_message_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        if let Some(id) = self.0.get(VENDOR_MESSAGE_ID).and_then(Value::as_str) {
            ids.push(id.to_string());
        }
        if let Some(recipients) = self.0.get(RECIPIENTS).and_then(Value::as_array) {
            for id in recipients
                .iter()
                .filter_map(|r| r.get(VENDOR_MESSAGE_ID).and_then(Value::as_str))
            {
                if !ids.iter().any(|known| known == id) {
                    ids.push(id.to_string());
                }
            }
        }
        ids
    }
}

impl From<Map<String, Value>> for TransmissionMetadata {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A message queued for delivery to a phone number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub id: Option<u64>,
    pub message: String,
    pub destination: String,
    pub transmission_metadata: Option<String>,
    #[serde(default)]
    pub errored: bool,
}

impl OutgoingMessage {
    pub fn new(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: None,
            message: message.into(),
            destination: destination.into(),
            transmission_metadata: None,
            errored: false,
        }
    }

    pub fn current_destination(&self) -> &str {
        &self.destination
    }

    pub fn metadata(&self) -> Result<TransmissionMetadata, SmsError> {
        TransmissionMetadata::parse(self.transmission_metadata.as_deref())
    }

    pub fn set_metadata(&mut self, metadata: &TransmissionMetadata) -> Result<(), SmsError> {
        self.transmission_metadata = Some(metadata.to_text()?);
        Ok(())
    }
}

/// A message received from a phone number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub id: Option<u64>,
    pub sender: String,
    pub recipient: String,
    #[serde(with = "time::serde::rfc3339")]
    pub receive_date: OffsetDateTime,
    pub message: String,
    pub transmission_metadata: Option<String>,
}

impl IncomingMessage {
    pub fn metadata(&self) -> Result<TransmissionMetadata, SmsError> {
        TransmissionMetadata::parse(self.transmission_metadata.as_deref())
    }

    pub fn set_metadata(&mut self, metadata: &TransmissionMetadata) -> Result<(), SmsError> {
        self.transmission_metadata = Some(metadata.to_text()?);
        Ok(())
    }

    pub fn encrypt_sender(&mut self, cipher: &dyn FieldCipher) -> Result<(), SmsError> {
        if !cipher.is_encrypted(&self.sender) {
            self.sender = cipher.encrypt(&self.sender)?;
        }
        Ok(())
    }

    pub fn encrypt_recipient(&mut self, cipher: &dyn FieldCipher) -> Result<(), SmsError> {
        if !cipher.is_encrypted(&self.recipient) {
            self.recipient = cipher.encrypt(&self.recipient)?;
        }
        Ok(())
    }

    pub fn current_sender(&self, cipher: &dyn FieldCipher) -> Result<String, SmsError> {
        cipher.decrypt(&self.sender)
    }
}
