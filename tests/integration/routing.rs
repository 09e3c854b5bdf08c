//! Routing over real TCP: ownership, read-your-writes, error surfacing.

use ringway_integration_tests::{TestCluster, dead_addr, read_req, router_for, write_req};
use ringway_net::{Backend, NetError};
use ringway_router::RouterError;
use ringway_types::StatusCode;

#[tokio::test]
async fn test_user_42_write_then_read() {
    let cluster = TestCluster::new(3).await;
    let router = &cluster.router;

    let owner = router.locate("user-42").await.unwrap();

    router
        .write(&write_req("user-42", &[("age", "42"), ("country", "ES")]))
        .await
        .unwrap();
    let resp = router
        .read(&read_req("user-42", "demographics"))
        .await
        .unwrap();

    assert_eq!(resp.routing_key, "user-42");
    assert_eq!(resp.group_label, "demographics");
    assert_eq!(resp.fields["age"], b"42");
    assert_eq!(resp.fields["country"], b"ES");

    // Exactly the owning node holds the data.
    let holders = cluster.holders("user-42").await;
    assert_eq!(holders.len(), 1);
    assert_eq!(cluster.nodes[holders[0]].addr, owner);
}

#[tokio::test]
async fn test_repeated_writes_land_on_one_node() {
    let cluster = TestCluster::new(3).await;

    for i in 0..20 {
        let value = i.to_string();
        cluster
            .router
            .write(&write_req("user-42", &[("clicks", &value)]))
            .await
            .unwrap();
    }

    let owner = cluster.router.locate("user-42").await.unwrap();
    assert_eq!(cluster.node(&owner).store.len(), 1);
    assert_eq!(cluster.holders("user-42").await.len(), 1);

    let resp = cluster.router.read(&read_req("user-42", "")).await.unwrap();
    assert_eq!(resp.fields["clicks"], b"19", "last write wins");
}

#[tokio::test]
async fn test_every_key_lives_on_its_owner() {
    let cluster = TestCluster::new(4).await;

    for i in 0..200 {
        let key = format!("entity-{i}");
        cluster
            .router
            .write(&write_req(&key, &[("f", "v")]))
            .await
            .unwrap();
    }

    let mut used = 0;
    for node in &cluster.nodes {
        if !node.store.is_empty() {
            used += 1;
        }
    }
    assert!(used >= 2, "200 keys should spread over several nodes");

    for i in 0..200 {
        let key = format!("entity-{i}");
        let owner = cluster.router.locate(&key).await.unwrap();
        assert!(cluster.node(&owner).holds(&key).await, "{key} not on {owner}");
        assert_eq!(cluster.holders(&key).await.len(), 1);
    }
}

#[tokio::test]
async fn test_unknown_key_reads_empty() {
    let cluster = TestCluster::new(2).await;
    let resp = cluster
        .router
        .read(&read_req("never-written", "g"))
        .await
        .unwrap();
    assert!(resp.fields.is_empty());
    assert_eq!(resp.routing_key, "never-written");
}

#[tokio::test]
async fn test_empty_router_has_no_node() {
    let router = router_for(&[], None);
    match router.read(&read_req("user-42", "")).await {
        Err(e @ RouterError::NoNodeAvailable { .. }) => {
            let status = e.to_status();
            assert_eq!(status.code, StatusCode::Unavailable);
            assert_eq!(status.message, "no node found for routing key: user-42");
        }
        other => panic!("expected NoNodeAvailable, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_owner_is_attributed() {
    let addr = dead_addr().await;
    let router = router_for(std::slice::from_ref(&addr), None);

    match router.write(&write_req("user-42", &[("f", "v")])).await {
        Err(e @ RouterError::Backend { .. }) => {
            if let RouterError::Backend { node, source } = &e {
                assert_eq!(node, &addr);
                assert!(matches!(source, NetError::Connect(_)), "{source:?}");
            }
            let status = e.to_status();
            assert_eq!(status.code, StatusCode::Unavailable);
            assert!(status.message.contains(&addr));
        }
        other => panic!("expected Backend error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_ping_all_reports_each_node() {
    let cluster = TestCluster::new(3).await;
    let results = cluster.router.ping_all().await;
    assert_eq!(results.len(), 3);
    for (node, outcome) in results {
        assert!(outcome.is_ok(), "{node}: {outcome:?}");
    }
}

#[tokio::test]
async fn test_cluster_secret_end_to_end() {
    let cluster = TestCluster::with_secret(2, "s3cret").await;
    cluster
        .router
        .write(&write_req("user-42", &[("age", "42")]))
        .await
        .unwrap();

    // A router with the wrong secret is refused by every node.
    let addrs: Vec<String> = cluster.nodes.iter().map(|n| n.addr.clone()).collect();
    let intruder = router_for(&addrs, Some("wrong"));
    match intruder.read(&read_req("user-42", "")).await {
        Err(RouterError::Backend {
            source: NetError::Handshake(_),
            ..
        }) => {}
        other => panic!("expected handshake failure, got {other:?}"),
    }

    // And one without any secret gets UNAUTHENTICATED from the node.
    let anonymous = router_for(&addrs, None);
    match anonymous.read(&read_req("user-42", "")).await {
        Err(e) => assert_eq!(e.to_status().code, StatusCode::Unauthenticated),
        Ok(resp) => panic!("expected refusal, got {resp:?}"),
    }
}

#[tokio::test]
async fn test_client_through_router_service() {
    let cluster = TestCluster::new(3).await;
    let (client, _stop) = cluster.serve_router().await;

    client
        .put_features(&write_req("user-42", &[("age", "42"), ("country", "ES")]))
        .await
        .unwrap();
    let resp = client
        .get_features(&read_req("user-42", "demographics"))
        .await
        .unwrap();
    assert_eq!(resp.group_label, "demographics");
    assert_eq!(resp.fields["country"], b"ES");

    let owner = cluster.router.locate("user-42").await.unwrap();
    assert!(cluster.node(&owner).holds("user-42").await);
    client.ping().await.unwrap();
}

#[tokio::test]
async fn test_router_service_reports_unreachable_owner() {
    let cluster = TestCluster::new(1).await;
    let dead = dead_addr().await;
    assert!(cluster.router.remove_node(&cluster.nodes[0].addr).await);
    cluster.router.add_node(&dead).await.unwrap();

    let (client, _stop) = cluster.serve_router().await;
    match client.get_features(&read_req("user-42", "")).await {
        Err(NetError::Remote(status)) => {
            assert_eq!(status.code, StatusCode::Unavailable);
            assert!(status.message.contains(&dead), "{}", status.message);
        }
        other => panic!("expected UNAVAILABLE, got {other:?}"),
    }
}
