//! Routing and status tests against a running pool.

use std::collections::HashSet;
use std::sync::Arc;

use relay_pool::pool::partition_slot;
use relay_pool::{
    ConnectionContainer, ConnectionError, ConnectionKind, ConnectionStatus, FixedRestart, PoolError,
    RetireOnExit, ServiceConnection, ServiceMessage,
};

mod common;

use common::{wait_until, TestPool};

#[tokio::test(start_paused = true)]
async fn test_start_connects_every_slot() {
    for size in [1, 3, 5] {
        let mut pool = TestPool::build(size, ConnectionKind::Default, FixedRestart, &[]);
        assert!(pool.endpoint.container().is_none());
        assert_eq!(pool.endpoint.status(), ConnectionStatus::Disconnected);

        pool.start().await;
        let container = pool.container.clone();
        wait_until(|| container.connected_slots() == size).await;

        assert_eq!(container.status(), ConnectionStatus::Connected);
        assert_eq!(pool.endpoint.status(), ConnectionStatus::Connected);
        assert!(pool.endpoint.is_online());
        assert_eq!(pool.factory.created_count(), size);

        let ids: HashSet<_> = (0..size).map(|slot| pool.slot(slot).id()).collect();
        assert_eq!(ids.len(), size);

        pool.stop().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_one_live_slot_keeps_pool_connected() {
    let mut pool = TestPool::build(3, ConnectionKind::Default, RetireOnExit, &[false, false, true]);
    pool.start().await;

    let container = pool.container.clone();
    wait_until(|| {
        let snapshot = container.snapshot();
        snapshot.connected == 1 && snapshot.slots.iter().filter(|s| s.connection_id.is_some()).count() == 1
    })
    .await;

    assert_eq!(container.status(), ConnectionStatus::Connected);
    assert_eq!(pool.endpoint.status(), ConnectionStatus::Connected);
    assert!(container.connection(0).is_none());
    assert!(container.connection(1).is_none());

    let live = pool.slot(2).id();
    for i in 0..10 {
        container.write(&ServiceMessage::new(format!("m{}", i))).await.unwrap();
    }
    let delivered = pool.drain();
    assert_eq!(delivered.len(), 10);
    assert!(delivered.iter().all(|d| d.connection_id == live));

    pool.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_unkeyed_writes_spread_across_slots() {
    let mut pool = TestPool::connected(3, FixedRestart).await;

    for i in 0..300 {
        pool.container
            .write(&ServiceMessage::new(format!("m{}", i)))
            .await
            .unwrap();
    }

    let delivered = pool.drain();
    assert_eq!(delivered.len(), 300);
    for slot in 0..3 {
        let id = pool.slot(slot).id();
        assert!(
            delivered.iter().any(|d| d.connection_id == id),
            "slot {} received nothing",
            slot
        );
    }

    pool.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_keyed_writes_are_sticky() {
    let mut pool = TestPool::connected(4, FixedRestart).await;
    let expected = pool.slot(partition_slot("abc", 4)).id();

    for i in 0..20 {
        pool.container
            .write_partitioned("abc", &ServiceMessage::new(format!("m{}", i)))
            .await
            .unwrap();
    }

    let delivered = pool.drain();
    assert_eq!(delivered.len(), 20);
    assert!(delivered.iter().all(|d| d.connection_id == expected));

    pool.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_keyed_write_fails_over_and_returns() {
    let mut pool = TestPool::connected(4, FixedRestart).await;
    let home = partition_slot("abc", 4);
    let sticky = pool.slot(home);
    let message = ServiceMessage::new("payload");

    sticky.force_status(ConnectionStatus::Disconnected);
    pool.container.write_partitioned("abc", &message).await.unwrap();
    let moved = pool.drain();
    assert_eq!(moved.len(), 1);
    assert_ne!(moved[0].connection_id, sticky.id());
    // Skipped without a write attempt.
    assert_eq!(sticky.write_attempts(), 0);

    sticky.force_status(ConnectionStatus::Connected);
    pool.container.write_partitioned("abc", &message).await.unwrap();
    let back = pool.drain();
    assert_eq!(back[0].connection_id, sticky.id());

    pool.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_write_fails_over_to_healthy_slot() {
    let mut pool = TestPool::connected(3, FixedRestart).await;
    pool.slot(0).force_status(ConnectionStatus::Disconnected);
    pool.slot(1).reject_writes(true);
    let healthy = pool.slot(2).id();

    for i in 0..50 {
        pool.container
            .write(&ServiceMessage::new(format!("m{}", i)))
            .await
            .unwrap();
    }

    let delivered = pool.drain();
    assert_eq!(delivered.len(), 50);
    assert!(delivered.iter().all(|d| d.connection_id == healthy));
    assert_eq!(pool.slot(0).write_attempts(), 0);

    pool.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_all_disconnected_reports_unavailable() {
    let mut pool = TestPool::connected(5, FixedRestart).await;
    let connections: Vec<_> = (0..5).map(|slot| pool.slot(slot)).collect();
    for conn in &connections {
        conn.force_status(ConnectionStatus::Disconnected);
        conn.reset_counters();
    }

    let err = pool
        .container
        .write(&ServiceMessage::new("lost"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PoolError::Unavailable {
            endpoint: "test-endpoint".to_string(),
            size: 5,
        }
    );

    for conn in &connections {
        assert_eq!(conn.status_reads(), 1);
        assert_eq!(conn.write_attempts(), 0);
    }
    assert!(pool.drain().is_empty());
    assert_eq!(pool.container.status(), ConnectionStatus::Disconnected);

    pool.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_rejection_on_last_slot_is_returned() {
    let mut pool = TestPool::connected(3, FixedRestart).await;
    let connections: Vec<_> = (0..3).map(|slot| pool.slot(slot)).collect();
    for conn in &connections {
        conn.reject_writes(true);
        conn.reset_counters();
    }

    let err = pool
        .container
        .write_partitioned("abc", &ServiceMessage::new("m"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PoolError::Connection(ConnectionError::NotActive(_))
    ));
    for conn in &connections {
        assert_eq!(conn.write_attempts(), 1);
    }
    assert!(pool.drain().is_empty());

    pool.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_empty_partition_key_writes_nothing() {
    let mut pool = TestPool::connected(2, FixedRestart).await;

    let err = pool
        .container
        .write_partitioned("", &ServiceMessage::new("m"))
        .await
        .unwrap_err();
    assert_eq!(err, PoolError::EmptyPartitionKey);
    assert!(pool.drain().is_empty());

    pool.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_routes_by_embedded_key() {
    let mut pool = TestPool::connected(4, FixedRestart).await;
    let expected = pool.slot(partition_slot("tenant-7", 4)).id();

    for i in 0..10 {
        let message = ServiceMessage::new(format!("m{}", i)).with_partition_key("tenant-7");
        pool.container.dispatch(&message).await.unwrap();
    }
    // An empty embedded key falls back to unkeyed routing.
    pool.container
        .dispatch(&ServiceMessage::new("loose").with_partition_key(""))
        .await
        .unwrap();

    let delivered = pool.drain();
    assert_eq!(delivered.len(), 11);
    assert!(delivered[..10].iter().all(|d| d.connection_id == expected));

    pool.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_container_behind_trait_object() {
    let mut pool = TestPool::connected(2, FixedRestart).await;
    let container: Arc<dyn ConnectionContainer> = pool.container.clone();

    container.write(&ServiceMessage::new("a")).await.unwrap();
    container
        .write_partitioned("key", &ServiceMessage::new("b"))
        .await
        .unwrap();
    assert_eq!(container.status(), ConnectionStatus::Connected);
    assert_eq!(pool.drain().len(), 2);

    let published = pool.endpoint.container().unwrap();
    assert_eq!(published.status(), ConnectionStatus::Connected);

    pool.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_writes() {
    let mut pool = TestPool::connected(3, FixedRestart).await;

    let mut handles = Vec::new();
    for i in 0..50 {
        let container = pool.container.clone();
        handles.push(tokio::spawn(async move {
            let message = ServiceMessage::new(format!("m{}", i));
            if i % 2 == 0 {
                container.write_partitioned(&format!("k{}", i % 5), &message).await
            } else {
                container.write(&message).await
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(pool.drain().len(), 50);
    pool.stop().await;
}
