use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sms_core::{RecipientResult, SendRequest, SendResponse, SmsClient, SmsError};
use std::str::FromStr;
use std::time::Duration;
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, error, info};
use url::{Position, Url};

use crate::PROVIDER;

const API_VERSION: &str = "2021-03-07";
const HTTP_DATE_FORMAT: &str =
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT";

/// Parsed ACS connection string, `endpoint=https://...;accesskey=<base64>`.
#[derive(Clone)]
pub struct ConnectionString {
    pub endpoint: Url,
    access_key: Vec<u8>,
}

impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("endpoint", &self.endpoint.as_str())
            .field("access_key", &"<redacted>")
            .finish()
    }
}

impl FromStr for ConnectionString {
    type Err = SmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut endpoint = None;
        let mut access_key = None;

        for part in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| SmsError::Config(format!("malformed connection string segment: {}", part)))?;
            match key.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value.trim()),
                "accesskey" => access_key = Some(value.trim()),
                _ => {}
            }
        }

        let endpoint = endpoint
            .ok_or_else(|| SmsError::Config("connection string has no endpoint".into()))?;
        let endpoint = Url::parse(endpoint)
            .map_err(|e| SmsError::Config(format!("connection string endpoint: {}", e)))?;
        if endpoint.host_str().is_none() {
            return Err(SmsError::Config("connection string endpoint has no host".into()));
        }

        let access_key = access_key
            .ok_or_else(|| SmsError::Config("connection string has no accesskey".into()))?;
        let access_key = BASE64_STANDARD
            .decode(access_key)
            .map_err(|_| SmsError::Config("connection string accesskey is not base64".into()))?;

        Ok(Self {
            endpoint,
            access_key,
        })
    }
}

/// Headers that authenticate one request with the HMAC-SHA256 scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub date: String,
    pub content_hash: String,
    pub authorization: String,
}

impl ConnectionString {
    pub fn sign(
        &self,
        method: &str,
        url: &Url,
        body: &[u8],
        at: OffsetDateTime,
    ) -> Result<SignedHeaders, SmsError> {
        let format = time::format_description::parse(HTTP_DATE_FORMAT)
            .map_err(|e| SmsError::Unexpected(format!("date format: {}", e)))?;
        let date = at
            .to_offset(UtcOffset::UTC)
            .format(&format)
            .map_err(|e| SmsError::Unexpected(format!("date format: {}", e)))?;

        let content_hash = BASE64_STANDARD.encode(Sha256::digest(body));
        let host = &url[Position::BeforeHost..Position::AfterPort];
        let path_and_query = &url[Position::BeforePath..Position::AfterQuery];
        let string_to_sign = format!(
            "{}\n{}\n{};{};{}",
            method, path_and_query, date, host, content_hash
        );

        let mut mac = Hmac::<Sha256>::new_from_slice(&self.access_key)
            .map_err(|_| SmsError::Auth("access key has invalid length".into()))?;
        mac.update(string_to_sign.as_bytes());
        let signature = BASE64_STANDARD.encode(mac.finalize().into_bytes());

        Ok(SignedHeaders {
            date,
            content_hash,
            authorization: format!(
                "HMAC-SHA256 SignedHeaders=x-ms-date;host;x-ms-content-sha256&Signature={}",
                signature
            ),
        })
    }
}

/// Azure Communication Services SMS REST client.
#[derive(Clone, Debug)]
pub struct AzureSmsClient {
    connection: ConnectionString,
    http: reqwest::Client,
}

impl AzureSmsClient {
    pub fn new(connection: ConnectionString, timeout: Duration) -> Result<Self, SmsError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SmsError::Http(e.to_string()))?;
        Ok(Self { connection, http })
    }

    pub fn from_connection_string(s: &str, timeout: Duration) -> Result<Self, SmsError> {
        Self::new(s.parse()?, timeout)
    }

    pub fn endpoint(&self) -> &Url {
        &self.connection.endpoint
    }

    fn send_url(&self) -> Result<Url, SmsError> {
        let mut url = self
            .connection
            .endpoint
            .join("sms")
            .map_err(|e| SmsError::Config(format!("endpoint: {}", e)))?;
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        Ok(url)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AcsSendRequest<'a> {
    from: &'a str,
    sms_recipients: Vec<AcsRecipient<'a>>,
    message: &'a str,
    sms_send_options: AcsSendOptions,
}

#[derive(Debug, Serialize)]
struct AcsRecipient<'a> {
    to: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AcsSendOptions {
    enable_delivery_report: bool,
}

#[derive(Debug, Deserialize)]
struct AcsSendResponse {
    value: Vec<AcsSendResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcsSendResult {
    to: String,
    message_id: Option<String>,
    successful: bool,
    error_message: Option<String>,
}

impl From<AcsSendResult> for RecipientResult {
    fn from(r: AcsSendResult) -> Self {
        RecipientResult {
            to: r.to,
            message_id: r.message_id.unwrap_or_else(sms_core::fallback_id),
            successful: r.successful,
            error_message: r.error_message,
        }
    }
}

#[async_trait]
impl SmsClient for AzureSmsClient {
    async fn send(&self, req: SendRequest<'_>) -> Result<SendResponse, SmsError> {
        let url = self.send_url()?;
        let payload = AcsSendRequest {
            from: req.from,
            sms_recipients: vec![AcsRecipient { to: req.to }],
            message: req.text,
            sms_send_options: AcsSendOptions {
                enable_delivery_report: req.enable_delivery_report,
            },
        };
        let body = serde_json::to_vec(&payload)
            .map_err(|e| SmsError::Unexpected(format!("request serialization: {}", e)))?;
        let signed = self
            .connection
            .sign("POST", &url, &body, OffsetDateTime::now_utc())?;

        info!("Sending SMS via Azure Communication Services");

        let res = self
            .http
            .post(url)
            .header("content-type", "application/json")
            .header("x-ms-date", &signed.date)
            .header("x-ms-content-sha256", &signed.content_hash)
            .header("authorization", &signed.authorization)
            .body(body)
            .send()
            .await
            .map_err(|e| SmsError::Http(e.to_string()))?;

        let status = res.status();
        let raw_text = res
            .text()
            .await
            .map_err(|e| SmsError::Http(e.to_string()))?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            error!("ACS rejected credentials: HTTP {}", status);
            return Err(SmsError::Auth(format!("HTTP {}: {}", status, raw_text)));
        }
        if !status.is_success() {
            error!("ACS send failed: HTTP {}", status);
            return Err(SmsError::Provider(format!("HTTP {}: {}", status, raw_text)));
        }

        let raw: serde_json::Value = serde_json::from_str(&raw_text)
            .unwrap_or_else(|_| serde_json::json!({ "raw": raw_text }));
        let parsed: AcsSendResponse = serde_json::from_value(raw.clone())
            .map_err(|e| SmsError::Provider(format!("unexpected send response: {}", e)))?;

        let results: Vec<RecipientResult> = parsed.value.into_iter().map(Into::into).collect();
        debug!(recipients = results.len(), "ACS send accepted");

        Ok(SendResponse {
            results,
            provider: PROVIDER,
            raw,
        })
    }
}
