//! Discovery tests driving the datagram path of two services directly.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use lansend_core::config::NetworkConfig;
use lansend_core::discovery::{DatagramOutcome, MulticastService, PeerEvent, PeerRegistry};
use lansend_core::identity::DeviceIdentity;

struct Device {
    identity: Arc<DeviceIdentity>,
    service: MulticastService,
    addr: SocketAddr,
}

async fn device(alias: &str, last_octet: u8) -> Device {
    let identity = Arc::new(DeviceIdentity::new(alias, "test", 53317));
    let config = NetworkConfig {
        reply_cooldown: Duration::ZERO,
        ..NetworkConfig::default()
    };
    let service = MulticastService::new(Arc::clone(&identity), &config, Arc::new(PeerRegistry::new()))
        .await
        .expect("Failed to create multicast service");
    Device {
        identity,
        service,
        addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, last_octet)), 53317),
    }
}

fn announcement(device: &Device, announce: bool) -> Vec<u8> {
    serde_json::to_vec(&device.identity.to_announcement(announce)).expect("serialize")
}

#[tokio::test]
async fn test_two_devices_learn_each_other() {
    let a = device("A", 1).await;
    let b = device("B", 2).await;

    // A comes online and announces; B records A and answers.
    let outcome = b.service.handle_datagram(&announcement(&a, true), a.addr).await;
    assert_eq!(outcome, DatagramOutcome::Recorded { is_new: true, replied: true });

    // B's answer reaches A.
    let outcome = a.service.handle_datagram(&announcement(&b, true), b.addr).await;
    assert!(matches!(outcome, DatagramOutcome::Recorded { is_new: true, .. }));

    // Both also hear their own packets looped back.
    assert_eq!(
        a.service.handle_datagram(&announcement(&a, true), a.addr).await,
        DatagramOutcome::SelfSuppressed
    );
    assert_eq!(
        b.service.handle_datagram(&announcement(&b, true), b.addr).await,
        DatagramOutcome::SelfSuppressed
    );

    let a_peers = a.service.registry().peers().await;
    let b_peers = b.service.registry().peers().await;
    assert_eq!(a_peers.len(), 1);
    assert_eq!(b_peers.len(), 1);
    assert_eq!(a_peers[0].fingerprint, b.identity.fingerprint);
    assert_eq!(b_peers[0].fingerprint, a.identity.fingerprint);
    assert_eq!(a_peers[0].address, b.addr.ip());
}

#[tokio::test]
async fn test_repeated_announcements_do_not_duplicate() {
    let a = device("A", 1).await;
    let b = device("B", 2).await;
    let mut events = b.service.registry().subscribe();

    for _ in 0..10 {
        b.service.handle_datagram(&announcement(&a, false), a.addr).await;
    }

    assert_eq!(b.service.registry().len().await, 1);
    assert!(matches!(events.recv().await, Ok(PeerEvent::Discovered(_))));
    for _ in 0..9 {
        assert!(matches!(events.recv().await, Ok(PeerEvent::Updated(_))));
    }
}

#[tokio::test]
async fn test_non_announcing_packet_gets_no_reply() {
    let a = device("A", 1).await;
    let b = device("B", 2).await;

    let outcome = b.service.handle_datagram(&announcement(&a, false), a.addr).await;
    assert_eq!(outcome, DatagramOutcome::Recorded { is_new: true, replied: false });
}

#[tokio::test]
async fn test_legacy_flag_triggers_reply() {
    let a = device("A", 1).await;
    let packet = r#"{"alias":"Old","fingerprint":"legacy-fp","port":53317,"announcement":true}"#;

    let outcome = a
        .service
        .handle_datagram(packet.as_bytes(), SocketAddr::from(([10, 0, 0, 9], 53317)))
        .await;
    assert_eq!(outcome, DatagramOutcome::Recorded { is_new: true, replied: true });
}
