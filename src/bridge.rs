use sms_azure::{AzureEventDispatcher, AzureOutbound, ClientFactory, SendConfig};
use sms_core::{
    FieldCipher, HookRegistry, InboundRegistry, MessageStore, OutgoingMessage, SmsError,
    TransmissionMetadata,
};
use sms_web_axum::AppState;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use crate::config::AppConfig;
use crate::crypto::AesGcmFieldCipher;

/// Outbound adapter, inbound dispatcher and record store wired from one
/// [`AppConfig`].
#[derive(Clone)]
pub struct SmsBridge {
    outbound: AzureOutbound,
    dispatcher: Arc<AzureEventDispatcher>,
    store: Arc<dyn MessageStore>,
    max_body_size: usize,
    request_timeout: Duration,
}

impl SmsBridge {
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn MessageStore>,
        hooks: HookRegistry,
    ) -> Result<Self, SmsError> {
        let cipher: Option<Arc<dyn FieldCipher>> = match &config.security.secret_key {
            Some(secret) => Some(Arc::new(AesGcmFieldCipher::new(secret)?)),
            None => None,
        };

        let timeout = config.azure.http_timeout();
        let outbound = AzureOutbound::new(config.azure.send_config(), timeout);
        let dispatcher = AzureEventDispatcher::new(store.clone(), timeout)?
            .with_hooks(hooks)
            .with_cipher(cipher)
            .with_options(config.dispatch_options());

        info!(
            channel_configured = SendConfig::resolve(None, &config.azure.send_config()).is_some(),
            encryption = config.security.secret_key.is_some(),
            "SMS bridge ready"
        );

        Ok(Self {
            outbound,
            dispatcher: Arc::new(dispatcher),
            store,
            max_body_size: config.security.max_body_size,
            request_timeout: config.server.request_timeout(),
        })
    }

    pub fn with_client_factory(mut self, factory: Arc<dyn ClientFactory>) -> Self {
        self.outbound = self.outbound.with_factory(factory);
        self
    }

    /// Send `message` and persist it with its updated metadata so later
    /// delivery reports can find it. Nothing is stored when the channel is
    /// not configured.
    pub async fn send(
        &self,
        message: &mut OutgoingMessage,
        overrides: Option<&SendConfig>,
    ) -> Result<Option<TransmissionMetadata>, SmsError> {
        let metadata = self.outbound.send(message, overrides).await?;
        if metadata.is_some() {
            let saved = self.store.save_outgoing(message.clone()).await?;
            message.id = saved.id;
        }
        Ok(metadata)
    }

    pub fn dispatcher(&self) -> &AzureEventDispatcher {
        &self.dispatcher
    }

    pub fn registry(&self) -> InboundRegistry {
        InboundRegistry::new().with(self.dispatcher.clone())
    }

    /// Webhook routes bounded by the configured body size and request timeout.
    pub fn router(&self) -> axum::Router {
        sms_web_axum::router(
            AppState {
                registry: self.registry(),
            },
            self.max_body_size,
        )
        .layer(TimeoutLayer::new(self.request_timeout))
    }
}
