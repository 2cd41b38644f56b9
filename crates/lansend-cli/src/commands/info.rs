//! Info command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};

use lansend_core::identity::DeviceIdentity;
use lansend_core::protocol::ProtocolType;
use lansend_core::sender::Sender;

use super::InfoArgs;

/// Run the info command.
pub async fn run(args: InfoArgs) -> Result<()> {
    let mut config = super::load_config();
    if args.https {
        config.sender.scheme = ProtocolType::Https;
    }
    let port = args.port.unwrap_or(config.network.port);

    let identity = Arc::new(DeviceIdentity::from_config(&config));
    let sender = Sender::new(identity, &config.sender).context("Failed to create HTTP client")?;

    let info = sender
        .fetch_info(&args.target, port)
        .await
        .with_context(|| format!("Failed to query {}:{}", args.target, port))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let unknown = || "-".to_string();
    println!();
    println!("  Alias:       {}", info.alias);
    println!("  Version:     {}", info.version.clone().unwrap_or_else(unknown));
    println!("  Model:       {}", info.device_model.clone().unwrap_or_else(unknown));
    println!(
        "  Type:        {}",
        info.device_type.map_or_else(unknown, |t| t.to_string())
    );
    println!("  Fingerprint: {}", info.fingerprint.clone().unwrap_or_else(unknown));
    println!("  Download:    {}", if info.download { "yes" } else { "no" });
    println!();

    Ok(())
}
