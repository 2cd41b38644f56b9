//! Serve command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};

use lansend_core::discovery::{MulticastService, PeerEvent, PeerRegistry};
use lansend_core::file::DownloadStore;
use lansend_core::identity::DeviceIdentity;
use lansend_core::server::{self, AppState};
use lansend_core::session::SessionManager;

use super::ServeArgs;
use crate::ui::{parse_duration, print_header};

/// Run the serve command.
pub async fn run(args: ServeArgs) -> Result<()> {
    let mut config = super::load_config();

    if let Some(port) = args.port {
        config.network.port = port;
    }
    if let Some(alias) = args.alias {
        config.device.alias = alias;
    }
    if let Some(dir) = args.dir {
        config.receiver.download_dir = dir;
    }
    if let Some(interval) = args.interval.as_deref() {
        config.network.announce_interval = parse_duration(interval)
            .context("Invalid interval format. Use formats like '2s', '10s', '1m'")?;
    }
    config.validate()?;

    let identity = Arc::new(DeviceIdentity::from_config(&config));
    let registry = Arc::new(PeerRegistry::new());
    let sessions = Arc::new(SessionManager::with_ttl(config.receiver.session_ttl()));
    let sweeper = sessions.spawn_sweeper();

    let state = AppState {
        identity: Arc::clone(&identity),
        sessions,
        store: Arc::new(DownloadStore::new(config.receiver.download_dir.clone())),
        peers: Arc::clone(&registry),
        upload_timeout: config.receiver.upload_timeout,
    };

    let listener = server::bind(config.network.port)
        .await
        .with_context(|| format!("Failed to bind HTTP port {}", config.network.port))?;

    let discovery = Arc::new(
        MulticastService::new(Arc::clone(&identity), &config.network, Arc::clone(&registry))
            .await
            .context("Failed to create discovery socket")?,
    );
    let listen_task = discovery.spawn_listener();
    if args.quiet_discovery {
        discovery.send_announcement().await?;
    } else {
        discovery
            .start_announcing(config.network.announce_interval)
            .await?;
    }

    print_header();
    println!();
    println!("  Alias:       {}", identity.alias);
    println!("  Fingerprint: {}", identity.fingerprint);
    println!("  Port:        {}", identity.port);
    println!("  Saving to:   {}", config.receiver.download_dir.display());
    println!();
    println!("  Waiting for files. Press Ctrl+C to stop.");
    println!();

    let mut events = registry.subscribe();
    let peer_log = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let PeerEvent::Discovered(peer) = event {
                println!("  Found {} ({})", peer.alias, peer.address);
            }
        }
    });

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    let result = server::serve(listener, state, shutdown).await;

    discovery.stop().await;
    listen_task.abort();
    peer_log.abort();
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }

    println!();
    println!("  Stopped.");

    result.context("Receiver stopped with an error")
}
