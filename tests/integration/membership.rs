//! Membership changes on a live cluster.

use std::collections::HashMap;

use ringway_integration_tests::{TestCluster, read_req, write_req};
use ringway_router::MembershipEvent;

const KEYS: usize = 300;

async fn owners(cluster: &TestCluster) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for i in 0..KEYS {
        let key = format!("user-{i}");
        let owner = cluster.router.locate(&key).await.unwrap();
        out.insert(key, owner);
    }
    out
}

#[tokio::test]
async fn test_remove_node_moves_only_its_keys() {
    let cluster = TestCluster::new(3).await;
    for i in 0..KEYS {
        cluster
            .router
            .write(&write_req(&format!("user-{i}"), &[("f", "v")]))
            .await
            .unwrap();
    }

    let before = owners(&cluster).await;
    let removed = cluster.nodes[1].addr.clone();
    let mut events = cluster.router.subscribe();

    assert!(cluster.router.remove_node(&removed).await);
    assert_eq!(
        events.recv().await.unwrap(),
        MembershipEvent::NodeRemoved(removed.clone())
    );
    assert_eq!(cluster.router.nodes().await.len(), 2);

    let after = owners(&cluster).await;
    for (key, old) in &before {
        let new = &after[key];
        if old == &removed {
            assert_ne!(new, &removed);
        } else {
            assert_eq!(new, old, "{key} moved although its owner stayed");
            // Unmoved keys still read their data.
            let resp = cluster.router.read(&read_req(key, "")).await.unwrap();
            assert_eq!(resp.fields["f"], b"v");
        }
    }

    // Nothing migrates: a moved key reads empty from its new owner.
    if let Some((key, _)) = before.iter().find(|(_, owner)| **owner == removed) {
        let resp = cluster.router.read(&read_req(key, "")).await.unwrap();
        assert!(resp.fields.is_empty());
    }
}

#[tokio::test]
async fn test_add_node_takes_over_some_keys() {
    let mut cluster = TestCluster::new(2).await;
    let before = owners(&cluster).await;

    let idx = cluster.spawn_node().await;
    let added = cluster.nodes[idx].addr.clone();
    let mut events = cluster.router.subscribe();

    cluster.router.add_node(&added).await.unwrap();
    assert_eq!(
        events.recv().await.unwrap(),
        MembershipEvent::NodeAdded(added.clone())
    );

    let after = owners(&cluster).await;
    for (key, old) in &before {
        let new = &after[key];
        assert!(new == old || new == &added, "{key} moved between old nodes");
    }

    // Writes for keys the new node owns reach it.
    if let Some((key, _)) = after.iter().find(|(_, owner)| **owner == added) {
        cluster
            .router
            .write(&write_req(key, &[("f", "v")]))
            .await
            .unwrap();
        assert!(cluster.nodes[idx].holds(key).await);
    }
}

#[tokio::test]
async fn test_routing_continues_during_churn() {
    let mut cluster = TestCluster::new(3).await;
    let idx = cluster.spawn_node().await;
    let extra = cluster.nodes[idx].addr.clone();
    let router = cluster.router.clone();

    let writer = tokio::spawn(async move {
        for i in 0..200 {
            router
                .write(&write_req(&format!("churn-{i}"), &[("f", "v")]))
                .await
                .unwrap();
        }
    });

    for _ in 0..10 {
        cluster.router.add_node(&extra).await.unwrap();
        tokio::task::yield_now().await;
        assert!(cluster.router.remove_node(&extra).await);
    }

    writer.await.unwrap();
}
