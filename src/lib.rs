//! # ACS SMS Bridge
//!
//! Connects a messaging framework to the Azure Communication Services SMS
//! API.
//!
//! ## Features
//!
//! - **Outbound**: send through ACS with per-call or process-wide channel
//!   settings; vendor ids and results land in the message metadata
//! - **Inbound**: Event Grid webhook dispatch for received messages,
//!   delivery reports and the subscription validation handshake
//! - **Hooks**: extension modules decide whether inbound messages are
//!   recorded and react once they are
//! - **Field encryption**: optional AES-GCM encryption of phone numbers
//! - **Configuration**: layered files and environment variables
//! - **Observability**: structured logging through `tracing`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use acs_sms_bridge::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     init_tracing(&config.logging)?;
//!
//!     let store = Arc::new(InMemoryMessageStore::new());
//!     let bridge = SmsBridge::from_config(&config, store, HookRegistry::new())?;
//!
//!     let mut message = OutgoingMessage::new("+15550002222", "Hello from ACS!");
//!     if let Some(metadata) = bridge.send(&mut message, None).await? {
//!         println!("sent: {:?}", metadata.vendor_message_ids());
//!     }
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, bridge.router()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Settings come from `config/default`, `config/{RUN_MODE}`, `config/local`
//! and `ACS_SMS__*` environment variables:
//!
//! ```text
//! ACS_SMS__AZURE__CONNECTION_STRING="endpoint=https://...;accesskey=..."
//! ACS_SMS__AZURE__PHONE_NUMBER="+18005550100"
//! ACS_SMS__AZURE__ENABLE_DELIVERY_REPORT=true
//! ACS_SMS__SECURITY__SECRET_KEY="..."
//! ```

pub mod bridge;
pub mod config;
pub mod crypto;
pub mod store;
pub mod telemetry;

pub use bridge::SmsBridge;
pub use crate::config::*;
pub use crypto::AesGcmFieldCipher;
pub use store::InMemoryMessageStore;
pub use telemetry::init_tracing;

/// Common imports for bridge usage
pub mod prelude {
    pub use crate::bridge::SmsBridge;
    pub use crate::config::{
        AppConfig, AzureSettings, DispatchConfig, LoggingConfig, SecurityConfig, ServerConfig,
    };
    pub use crate::crypto::AesGcmFieldCipher;
    pub use crate::store::InMemoryMessageStore;
    pub use crate::telemetry::init_tracing;
    pub use sms_azure::{AzureEventDispatcher, AzureOutbound, SendConfig};
    pub use sms_core::*;
    pub use std::sync::Arc;
}
