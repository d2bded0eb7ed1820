//! Integration tests running real nodes over loopback TCP:
//! broadcast → frame → listener → gossip service → consensus stand-in,
//! with relays suppressed by the dedup cache on every hop.

use std::time::Duration;

use quorum_messages::{HeaderMsg, Message};
use quorum_network::{BroadcastOutcome, GossipConfig, GossipStat};
use quorum_node::{GossipNode, NodeConfig};
use tokio::net::TcpListener;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Bind `n` loopback listeners and build one started node per listener,
/// each knowing the others as committee members.
async fn cluster(n: usize, enable_metrics: bool) -> Vec<GossipNode> {
    quorum_utils::init_tracing();

    let mut listeners = Vec::new();
    for _ in 0..n {
        listeners.push(TcpListener::bind("127.0.0.1:0").await.expect("bind"));
    }
    let addresses: Vec<String> = listeners
        .iter()
        .map(|l| l.local_addr().expect("local addr").to_string())
        .collect();

    let mut nodes = Vec::new();
    for (i, listener) in listeners.into_iter().enumerate() {
        let config = NodeConfig {
            listen_address: addresses[i].clone(),
            self_address: addresses[i].clone(),
            committee: addresses.clone(),
            gossip: GossipConfig {
                heartbeat_timeout_ms: 500,
                heartbeat_scan_interval_ms: 50,
                ..GossipConfig::default()
            },
            enable_metrics,
            metrics_interval_ms: 20,
            connect_timeout_ms: 1_000,
            ..NodeConfig::default()
        };
        let mut node = GossipNode::new(config).expect("node");
        node.start_with_listener(listener).expect("start");
        nodes.push(node);
    }
    nodes
}

async fn wait_for(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

fn header(n: u64) -> Message {
    Message::Header(HeaderMsg {
        block_number: n,
        payload: b"tcp".to_vec(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_reaches_every_member_exactly_once() {
    let mut nodes = cluster(3, false).await;

    // 3 * 40 / 100 + 1 = 2 targets: both other members.
    let outcome = nodes[0].broadcast(header(1)).expect("broadcast");
    assert!(matches!(outcome, BroadcastOutcome::Sent { ref targets } if targets.len() == 2));

    assert!(wait_for(|| nodes[1..].iter().all(|n| n.consensus.delivered() == 1)).await);

    // Relays from the receivers come back as duplicates, never redelivered.
    let relayed = wait_for(|| {
        nodes
            .iter()
            .map(|n| n.service.stat(GossipStat::Duplicate))
            .sum::<u64>()
            >= 2
    })
    .await;
    assert!(relayed);
    assert_eq!(nodes[0].consensus.delivered(), 0);
    assert!(nodes[1..].iter().all(|n| n.consensus.delivered() == 1));

    for node in &mut nodes {
        node.stop().await.expect("stop");
    }
}

#[tokio::test]
async fn heartbeats_keep_members_alive() {
    let mut nodes = cluster(2, true).await;
    let peer = quorum_types::PeerAddress::from(nodes[1].config.self_address.as_str());

    assert!(wait_for(|| nodes[0].service.liveness().last_ack(&peer).is_some()).await);
    assert!(wait_for(|| nodes[1].service.stat(GossipStat::HeartbeatAck) > 0).await);

    let metrics = nodes[0].metrics.clone().expect("metrics enabled");
    assert!(wait_for(|| metrics.committee_size.get() == 2).await);
    assert!(metrics.encode_text().expect("encode").contains("quorum_gossip_events"));

    for node in &mut nodes {
        node.stop().await.expect("stop");
    }
}

#[tokio::test]
async fn committed_progress_makes_old_gossip_stale() {
    let mut nodes = cluster(2, false).await;
    for node in &nodes {
        node.on_block_committed(10, 0);
    }
    assert_eq!(
        nodes[0].broadcast(header(9)).expect("broadcast"),
        BroadcastOutcome::Stale
    );
    nodes[0].broadcast(header(10)).expect("broadcast");
    assert!(wait_for(|| nodes[1].consensus.delivered() == 1).await);

    for node in &mut nodes {
        node.stop().await.expect("stop");
    }
}

#[tokio::test]
async fn reconfigure_drops_departed_members() {
    let mut nodes = cluster(3, false).await;
    nodes[0].broadcast(header(1)).expect("broadcast");
    assert!(wait_for(|| nodes[0].service.active_workers() == 2).await);

    let keep = vec![nodes[1].config.self_address.clone()];
    assert_eq!(nodes[0].reconfigure(&keep), 1);
    assert!(wait_for(|| nodes[0].service.active_workers() == 1).await);

    for node in &mut nodes {
        node.stop().await.expect("stop");
    }
}
