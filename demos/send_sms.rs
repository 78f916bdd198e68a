//! Send one SMS through Azure Communication Services.
use acs_sms_bridge::prelude::*;

use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load()?;
    init_tracing(&config.logging)?;

    if let Some(cs) = arg("--connection-string") {
        config.azure.connection_string = Some(cs);
    }
    if let Some(from) = arg("--from") {
        config.azure.phone_number = Some(from);
    }
    config.azure.enable_delivery_report.get_or_insert(true);

    let to = arg("--to").ok_or("missing --to")?;
    let text = arg("--text").ok_or("missing --text")?;

    let store = Arc::new(InMemoryMessageStore::new());
    let bridge = SmsBridge::from_config(&config, store, HookRegistry::new())?;

    let mut message = OutgoingMessage::new(to, text);
    match bridge.send(&mut message, None).await? {
        Some(metadata) => println!("Sent\n{}", metadata.to_text()?),
        None => println!("Azure channel not configured (connection string / phone number)"),
    }
    Ok(())
}

fn arg(flag: &str) -> Option<String> {
    let args: Vec<String> = env::args().collect();
    args.iter()
        .position(|a| a == flag)
        .and_then(|idx| args.get(idx + 1).cloned())
}
