//! Scan command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};

use lansend_core::discovery::{DiscoveredPeer, MulticastService, PeerRegistry};
use lansend_core::identity::DeviceIdentity;

use super::ScanArgs;
use crate::ui::{parse_duration, truncate_string};

/// Run the scan command.
pub async fn run(args: ScanArgs) -> Result<()> {
    let config = super::load_config();

    let duration = parse_duration(&args.duration)
        .context("Invalid duration format. Use formats like '5s', '10s', '30s'")?;

    if !args.json {
        println!();
        println!("Scanning for devices ({})...", args.duration);
        println!();
    }

    let identity = Arc::new(DeviceIdentity::from_config(&config));
    let registry = Arc::new(PeerRegistry::new());
    let discovery = Arc::new(
        MulticastService::new(identity, &config.network, Arc::clone(&registry))
            .await
            .context("Failed to create discovery socket")?,
    );

    let listen_task = discovery.spawn_listener();
    // Peers that already announced only reply to an announcing packet.
    if let Err(e) = discovery.send_announcement().await {
        tracing::warn!("Failed to announce: {}", e);
    }

    tokio::time::sleep(duration).await;
    listen_task.abort();

    let peers = registry.peers().await;
    if args.json {
        output_json_peers(&peers)?;
    } else {
        display_peers(&peers);
    }

    Ok(())
}

/// Output peers as JSON.
fn output_json_peers(peers: &[DiscoveredPeer]) -> Result<()> {
    let output = serde_json::json!({
        "devices": peers.iter().map(|p| serde_json::json!({
            "alias": p.alias,
            "fingerprint": p.fingerprint,
            "address": p.address.to_string(),
            "port": p.port,
            "protocol": p.protocol.map(|proto| proto.to_string()),
            "device_type": p.device_type.map(|t| t.to_string()),
            "device_model": p.device_model,
            "version": p.version,
            "last_seen": p.last_seen.to_rfc3339(),
        })).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Display peers as text table.
fn display_peers(peers: &[DiscoveredPeer]) {
    if peers.is_empty() {
        println!("No devices found.");
        println!();
        return;
    }

    println!("Devices on Network:");
    println!("{}", "─".repeat(75));
    println!("  {:20}  {:10}  {:21}  {:16}", "Alias", "Type", "Address", "Model");
    println!("{}", "─".repeat(75));

    for peer in peers {
        let device_type = peer.device_type.map_or_else(|| "-".to_string(), |t| t.to_string());
        println!(
            "  {:20}  {:10}  {:21}  {:16}",
            truncate_string(&peer.alias, 20),
            device_type,
            format!("{}:{}", peer.address, peer.port.unwrap_or(lansend_core::DEFAULT_PORT)),
            truncate_string(peer.device_model.as_deref().unwrap_or("-"), 16),
        );
    }

    println!("{}", "─".repeat(75));
    println!("  {} device(s) found", peers.len());
    println!();
}
