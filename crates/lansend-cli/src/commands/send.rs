//! Send command implementation.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};

use lansend_core::file::format_size;
use lansend_core::identity::DeviceIdentity;
use lansend_core::protocol::ProtocolType;
use lansend_core::sender::Sender;
use lansend_core::Error;

use super::SendArgs;

/// Run the send command.
pub async fn run(args: SendArgs) -> Result<()> {
    let mut config = super::load_config();

    if let Some(alias) = args.alias {
        config.device.alias = alias;
    }
    if args.https {
        config.sender.scheme = ProtocolType::Https;
    }
    if args.hash {
        config.sender.hash_files = true;
    }
    let port = args.port.unwrap_or(config.network.port);

    let identity = Arc::new(DeviceIdentity::from_config(&config));
    let sender =
        Sender::new(identity, &config.sender).context("Failed to create HTTP client")?;

    if !args.json {
        println!();
        println!("  Sending {} to {}:{}...", args.file.display(), args.target, port);
    }

    let started = Instant::now();
    let report = match sender.send_file(&args.target, port, &args.file).await {
        Ok(report) => report,
        Err(Error::Rejected { status, body }) => {
            anyhow::bail!("{} rejected the transfer ({}): {}", args.target, status, body)
        }
        Err(e) => return Err(e).context("Transfer failed"),
    };
    let elapsed = started.elapsed();

    if args.json {
        let output = serde_json::json!({
            "status": "sent",
            "target": format!("{}:{}", args.target, port),
            "session_id": report.session_id,
            "file_id": report.file_id,
            "file_name": report.file_name,
            "bytes": report.bytes,
            "elapsed_ms": elapsed.as_millis(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!(
            "  Sent {} ({}) in {:.1}s",
            report.file_name,
            format_size(report.bytes),
            elapsed.as_secs_f64()
        );
        println!();
    }

    Ok(())
}
