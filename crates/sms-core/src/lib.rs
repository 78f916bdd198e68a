//! # SMS Core
//!
//! Core traits and types for the Azure Communication Services SMS bridge.
//!
//! This crate provides the fundamental building blocks shared by the
//! provider and web crates:
//! - [`SmsClient`] trait for sending SMS messages
//! - [`InboundWebhook`] trait for processing incoming webhook batches
//! - [`MessageHook`] and [`HookRegistry`] for extension modules
//! - [`MessageStore`] and [`FieldCipher`] collaborators
//! - Message entities, metadata and error types
//!
//! ## Example
//!
//! ```rust,ignore
//! use sms_core::{SendRequest, SmsClient};
//!
//! let response = client.send(SendRequest {
//!     to: "+1234567890",
//!     from: "+0987654321",
//!     text: "Hello world!",
//!     enable_delivery_report: true,
//! }).await?;
//! ```

pub mod cipher;
pub mod event;
pub mod hooks;
pub mod message;
pub mod store;

pub use cipher::FieldCipher;
pub use event::Event;
pub use hooks::{HookRegistry, MessageHook, RecordPolicy};
pub use message::{IncomingMessage, OutgoingMessage, TransmissionMetadata};
pub use store::MessageStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Errors that can occur during SMS operations
#[derive(Debug, thiserror::Error)]
pub enum SmsError {
    /// HTTP communication error
    #[error("http error: {0}")]
    Http(String),
    /// Authentication/authorization error
    #[error("authentication error: {0}")]
    Auth(String),
    /// Invalid request parameters or payload
    #[error("invalid request: {0}")]
    Invalid(String),
    /// SMS provider returned an error
    #[error("provider error: {0}")]
    Provider(String),
    /// Malformed or incomplete configuration
    #[error("configuration error: {0}")]
    Config(String),
    /// Field encryption or decryption failed
    #[error("crypto error: {0}")]
    Crypto(String),
    /// Backing record store failed
    #[error("store error: {0}")]
    Store(String),
    /// Unexpected error occurred
    #[error("unexpected: {0}")]
    Unexpected(String),
}

/// Web-specific error types for webhook processing
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("provider not found: {0}")]
    ProviderNotFound(String),
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),
    #[error("parsing failed: {0}")]
    ParseError(String),
    #[error("SMS processing error: {0}")]
    SmsError(#[from] SmsError),
}

/// HTTP status code for web responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    Ok = 200,
    BadRequest = 400,
    Unauthorized = 401,
    NotFound = 404,
    InternalServerError = 500,
}

impl HttpStatus {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest<'a> {
    pub to: &'a str,
    pub from: &'a str,
    pub text: &'a str,
    pub enable_delivery_report: bool,
}

/// Outcome of a send for a single recipient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipientResult {
    pub to: String,
    pub message_id: String,
    pub successful: bool,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResponse {
    /// One entry per recipient, in the order the provider returned them.
    pub results: Vec<RecipientResult>,
    /// Name of the backend/provider that produced the response, e.g. "azure".
    pub provider: &'static str,
    /// Raw provider payload for debugging / audit.
    pub raw: serde_json::Value,
}

/// Summary of one processed webhook batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Echo for the subscription validation handshake.
    pub validation_response: Option<String>,
    /// Replies collected from hooks. Not sent back to the provider.
    pub hook_replies: Vec<String>,
    pub recorded: usize,
    pub declined: usize,
    pub duplicates: usize,
    pub reconciled: usize,
    pub skipped: usize,
}

/// Generic webhook response that can be converted to any framework's response type
#[derive(Debug, Clone)]
pub struct WebhookResponse {
    pub status: HttpStatus,
    pub body: String,
    pub content_type: String,
}

impl WebhookResponse {
    pub fn success(outcome: &DispatchOutcome) -> Self {
        let body = match &outcome.validation_response {
            Some(code) => serde_json::json!({ "validationResponse": code }),
            None => serde_json::json!({}),
        };
        Self {
            status: HttpStatus::Ok,
            body: body.to_string(),
            content_type: "application/json".to_string(),
        }
    }

    pub fn error(status: HttpStatus, message: &str) -> Self {
        Self {
            status,
            body: serde_json::json!({ "error": message }).to_string(),
            content_type: "application/json".to_string(),
        }
    }
}

#[async_trait]
pub trait SmsClient: Send + Sync {
    /// Send a single text SMS.
    async fn send(&self, req: SendRequest<'_>) -> Result<SendResponse, SmsError>;
}

/// Utility to create a pseudo id if a provider doesn't return one.
pub fn fallback_id() -> String {
    Uuid::new_v4().to_string()
}

/// Lightweight header representation to avoid tying the core to any HTTP framework.
pub type Headers = Vec<(String, String)>;

/// Provider-specific inbound webhook interface.
#[async_trait]
pub trait InboundWebhook: Send + Sync {
    /// Stable provider key, e.g., "azure".
    fn provider(&self) -> &'static str;

    /// Process a raw webhook batch (headers + body) to completion.
    async fn handle(&self, headers: &Headers, body: &[u8]) -> Result<DispatchOutcome, SmsError>;

    /// Optional signature verification (no-op by default).
    fn verify(&self, _headers: &Headers, _body: &[u8]) -> Result<(), SmsError> {
        Ok(())
    }
}

/// Runtime registry mapping provider keys to their webhook handlers.
#[derive(Default, Clone)]
pub struct InboundRegistry {
    map: Arc<HashMap<&'static str, Arc<dyn InboundWebhook>>>,
}

impl InboundRegistry {
    pub fn new() -> Self {
        Self {
            map: Arc::new(HashMap::new()),
        }
    }

    pub fn with(mut self, hook: Arc<dyn InboundWebhook>) -> Self {
        let mut m = (*self.map).clone();
        m.insert(hook.provider(), hook);
        self.map = Arc::new(m);
        self
    }

    pub fn get(&self, provider: &str) -> Option<Arc<dyn InboundWebhook>> {
        self.map.get(provider).cloned()
    }
}
