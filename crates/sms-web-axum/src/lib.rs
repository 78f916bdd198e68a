use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    routing::post,
    Router,
};
use bytes::Bytes;
use sms_core::{Headers, InboundRegistry};
use sms_web_generic::{HeaderConverter, ResponseConverter, WebhookProcessor};

#[derive(Clone)]
pub struct AppState {
    pub registry: InboundRegistry,
}

/// Axum-specific header converter
pub struct AxumHeaderConverter;

impl HeaderConverter for AxumHeaderConverter {
    type HeaderType = HeaderMap;

    fn to_generic_headers(headers: &Self::HeaderType) -> Headers {
        headers
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    v.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect()
    }
}

/// Axum-specific response converter
pub struct AxumResponseConverter;

impl ResponseConverter for AxumResponseConverter {
    type ResponseType = axum::response::Response;

    fn from_webhook_response(response: sms_core::WebhookResponse) -> Self::ResponseType {
        let status = axum::http::StatusCode::from_u16(response.status.as_u16())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        let content_type = HeaderValue::from_str(&response.content_type)
            .unwrap_or(HeaderValue::from_static("application/json"));

        (status, [(header::CONTENT_TYPE, content_type)], response.body).into_response()
    }
}

/// Unified handler: POST /webhooks/{provider}
pub async fn unified_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let processor = WebhookProcessor::new(state.registry);
    let generic_headers = AxumHeaderConverter::to_generic_headers(&headers);
    let response = processor
        .process_webhook(&provider, generic_headers, &body)
        .await;
    AxumResponseConverter::from_webhook_response(response)
}

/// Router exposing [`unified_webhook`], rejecting bodies above `max_body_size` bytes.
pub fn router(state: AppState, max_body_size: usize) -> Router {
    Router::new()
        .route("/webhooks/{provider}", post(unified_webhook))
        .layer(DefaultBodyLimit::max(max_body_size))
        .with_state(state)
}
