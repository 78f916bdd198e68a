use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use sms_azure::{DispatchOptions, SendConfig};
use sms_core::RecordPolicy;
use std::env;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Azure Communication Services channel configuration
    pub azure: AzureSettings,
    /// Security configuration
    pub security: SecurityConfig,
    /// Inbound dispatch configuration
    pub dispatch: DispatchConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Server host (default: 0.0.0.0)
    pub host: String,
    /// Server port (default: 3000)
    pub port: u16,
    /// Request timeout in seconds (default: 30)
    pub timeout_seconds: u64,
}

/// Azure Communication Services channel configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AzureSettings {
    /// `endpoint=...;accesskey=...`
    pub connection_string: Option<String>,
    /// Sender phone number in E.164 form
    pub phone_number: Option<String>,
    /// Ask ACS for delivery reports
    pub enable_delivery_report: Option<bool>,
    /// Timeout for every outbound HTTP call in seconds (default: 120)
    pub http_timeout_seconds: u64,
}

/// Security configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SecurityConfig {
    /// Secret for field-level encryption of phone numbers; unset disables it
    pub secret_key: Option<String>,
    /// Encrypt the recipient of incoming messages too (default: false)
    pub encrypt_recipient: bool,
    /// Maximum request body size in bytes (default: 1MB)
    pub max_body_size: usize,
}

/// Inbound dispatch configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct DispatchConfig {
    /// How hook answers combine (default: all_must_accept)
    pub record_policy: RecordPolicy,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: json or pretty (default: json)
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            timeout_seconds: 30,
        }
    }
}

impl Default for AzureSettings {
    fn default() -> Self {
        Self {
            connection_string: None,
            phone_number: None,
            enable_delivery_report: None,
            http_timeout_seconds: 120,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            encrypt_recipient: false,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl ServerConfig {
    /// Upper bound on handling one inbound request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl AzureSettings {
    pub fn send_config(&self) -> SendConfig {
        SendConfig {
            connection_string: self.connection_string.clone(),
            phone_number: self.phone_number.clone(),
            enable_delivery_report: self.enable_delivery_report,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        Self::builder(&run_mode)?.build()?.try_deserialize()
    }

    fn builder(
        run_mode: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Ok(Config::builder()
            // Start with default configuration
            .add_source(Config::try_from(&AppConfig::default())?)
            // Add configuration file based on environment
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local configuration file (gitignored)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (prefixed with ACS_SMS_)
            .add_source(Environment::with_prefix("ACS_SMS").separator("__")))
    }

    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            record_policy: self.dispatch.record_policy,
            encrypt_recipient: self.security.encrypt_recipient,
        }
    }
}
