use sms_core::{
    DispatchOutcome, Headers, HttpStatus, InboundRegistry, SmsError, WebhookError,
    WebhookResponse,
};
use tracing::{debug, error, warn};

/// Framework-agnostic webhook processor that handles the core SMS logic
#[derive(Clone)]
pub struct WebhookProcessor {
    registry: InboundRegistry,
}

impl WebhookProcessor {
    pub fn new(registry: InboundRegistry) -> Self {
        Self { registry }
    }

    /// Process an incoming webhook request and return a framework-agnostic response
    pub async fn process_webhook(
        &self,
        provider: &str,
        headers: Headers,
        body: &[u8],
    ) -> WebhookResponse {
        match self.process_webhook_internal(provider, headers, body).await {
            Ok(outcome) => {
                debug!(
                    provider,
                    recorded = outcome.recorded,
                    reconciled = outcome.reconciled,
                    "webhook processed"
                );
                WebhookResponse::success(&outcome)
            }
            Err(e) => self.error_to_response(e),
        }
    }

    async fn process_webhook_internal(
        &self,
        provider: &str,
        headers: Headers,
        body: &[u8],
    ) -> Result<DispatchOutcome, WebhookError> {
        let hook = self
            .registry
            .get(provider)
            .ok_or_else(|| WebhookError::ProviderNotFound(provider.to_string()))?;

        hook.verify(&headers, body)
            .map_err(|e| WebhookError::VerificationFailed(e.to_string()))?;

        hook.handle(&headers, body).await.map_err(|e| match e {
            SmsError::Invalid(msg) => WebhookError::ParseError(msg),
            other => WebhookError::SmsError(other),
        })
    }

    fn error_to_response(&self, error: WebhookError) -> WebhookResponse {
        match error {
            WebhookError::ProviderNotFound(_) => {
                WebhookResponse::error(HttpStatus::NotFound, "unknown provider")
            }
            WebhookError::VerificationFailed(msg) => {
                warn!("webhook verification failed: {}", msg);
                WebhookResponse::error(
                    HttpStatus::Unauthorized,
                    &format!("verification failed: {}", msg),
                )
            }
            WebhookError::ParseError(msg) => {
                warn!("webhook payload rejected: {}", msg);
                WebhookResponse::error(HttpStatus::BadRequest, &format!("parse error: {}", msg))
            }
            WebhookError::SmsError(e) => {
                error!("webhook processing failed: {}", e);
                WebhookResponse::error(
                    HttpStatus::InternalServerError,
                    &format!("SMS error: {}", e),
                )
            }
        }
    }
}

/// Helper trait for framework adapters to convert headers
pub trait HeaderConverter {
    type HeaderType;

    fn to_generic_headers(headers: &Self::HeaderType) -> Headers;
}

/// Helper trait for framework adapters to convert responses
pub trait ResponseConverter {
    type ResponseType;

    fn from_webhook_response(response: WebhookResponse) -> Self::ResponseType;
}
