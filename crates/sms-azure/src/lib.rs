//! # Azure Communication Services SMS
//!
//! Azure backend for the SMS bridge.
//!
//! - [`AzureSmsClient`]: signed REST client for the ACS SMS endpoint
//! - [`AzureOutbound`]: resolves channel settings and records send results
//!   in a message's transmission metadata
//! - [`AzureEventDispatcher`]: handles Event Grid webhook batches (inbound
//!   SMS, delivery reports, subscription validation)
//!
//! ## Example
//!
//! ```rust,ignore
//! use sms_azure::{AzureOutbound, SendConfig};
//!
//! let outbound = AzureOutbound::new(SendConfig {
//!     connection_string: Some("endpoint=https://...;accesskey=...".into()),
//!     phone_number: Some("+18005550100".into()),
//!     enable_delivery_report: Some(true),
//! }, Duration::from_secs(120));
//!
//! let mut message = OutgoingMessage::new("+15550002222", "Hello!");
//! let metadata = outbound.send(&mut message, None).await?;
//! ```

pub mod client;
pub mod dispatcher;
pub mod events;
pub mod outbound;

pub use client::{AzureSmsClient, ConnectionString};
pub use dispatcher::{AzureEventDispatcher, DispatchOptions, DELIVERY_REPORT_KEY};
pub use events::EventKind;
pub use outbound::{AzureClientFactory, AzureOutbound, ClientFactory, SendConfig};

const PROVIDER: &str = "azure";
