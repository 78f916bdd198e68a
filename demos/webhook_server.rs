//! Run the Event Grid webhook endpoint for Azure Communication Services.
//!
//! Point the Event Grid subscription at `http://<host>:<port>/webhooks/azure`.

use acs_sms_bridge::prelude::*;

struct LogReplies;

#[async_trait::async_trait]
impl MessageHook for LogReplies {
    fn name(&self) -> &str {
        "log-replies"
    }

    async fn process_incoming_message(
        &self,
        record: &IncomingMessage,
    ) -> Option<Result<(), SmsError>> {
        tracing::info!(record = ?record.id, "inbound SMS stored");
        Some(Ok(()))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.logging)?;

    let store = Arc::new(InMemoryMessageStore::new());
    let hooks = HookRegistry::new().with(Arc::new(LogReplies));
    let bridge = SmsBridge::from_config(&config, store, hooks)?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);
    axum::serve(listener, bridge.router()).await?;
    Ok(())
}
