use std::{sync::Arc, time::Duration};

use sluice_protocol::StreamId;

mod common;

use common::{CollectingDestination, create_gateway, payload, record_line, state_line, test_options};

#[tokio::test]
async fn test_single_stream_single_state() {
    let destination = Arc::new(CollectingDestination::new(1024 * 1024));
    let (mut gateway, emitter) = create_gateway(destination.clone(), test_options());
    gateway.start().await.expect("start");

    let users = StreamId::qualified("public", "users");
    for i in 0..100 {
        gateway
            .accept(&record_line(&users, i), 0)
            .await
            .expect("accept");
    }
    gateway.accept(&state_line(1), 0).await.expect("accept");

    gateway.close().await.expect("close");

    let expected = (0..100).map(payload).collect::<Vec<_>>();
    assert_eq!(destination.flushed(&users), expected);

    let released = emitter.released();
    assert_eq!(released.len(), 1);
    assert_eq!(released[0].message.serialized, state_line(1));
    assert_eq!(released[0].record_count, 100);
}

#[tokio::test]
async fn test_coalesced_states_emit_latest() {
    let destination = Arc::new(CollectingDestination::new(1024 * 1024));
    let (mut gateway, emitter) = create_gateway(destination.clone(), test_options());
    gateway.start().await.expect("start");

    let users = StreamId::qualified("public", "users");
    for i in 0..50 {
        gateway
            .accept(&record_line(&users, i), 0)
            .await
            .expect("accept");
    }
    gateway.accept(&state_line(1), 0).await.expect("accept");
    for i in 50..100 {
        gateway
            .accept(&record_line(&users, i), 0)
            .await
            .expect("accept");
    }
    gateway.accept(&state_line(2), 0).await.expect("accept");

    gateway.close().await.expect("close");

    assert_eq!(destination.flushed(&users).len(), 100);
    assert_eq!(emitter.released_payloads(), vec![state_line(2)]);
    assert_eq!(emitter.released()[0].record_count, 100);
}

#[tokio::test]
async fn test_no_state_emits_nothing() {
    let destination = Arc::new(CollectingDestination::new(1024 * 1024));
    let (mut gateway, emitter) = create_gateway(destination.clone(), test_options());
    gateway.start().await.expect("start");

    let users = StreamId::qualified("public", "users");
    for i in 0..10 {
        gateway
            .accept(&record_line(&users, i), 0)
            .await
            .expect("accept");
    }

    gateway.close().await.expect("close");

    assert_eq!(destination.flushed(&users).len(), 10);
    assert!(emitter.released().is_empty());
}

#[tokio::test]
async fn test_state_without_records() {
    let destination = Arc::new(CollectingDestination::new(1024));
    let (mut gateway, emitter) = create_gateway(destination.clone(), test_options());
    gateway.start().await.expect("start");

    gateway.accept(&state_line(7), 0).await.expect("accept");
    gateway.close().await.expect("close");

    assert_eq!(destination.flush_count(), 0);
    assert_eq!(emitter.released_payloads(), vec![state_line(7)]);
    assert_eq!(emitter.released()[0].record_count, 0);
}

#[tokio::test]
async fn test_state_released_after_prior_records_flushed() {
    // Small batches and a short staleness window flush everything without closing.
    let destination = Arc::new(
        CollectingDestination::new(16).with_flush_delay(Duration::from_millis(2)),
    );
    let options = test_options().with_staleness_window(Duration::from_millis(20));
    let (mut gateway, emitter) = create_gateway(destination.clone(), options);
    gateway.start().await.expect("start");

    let users = StreamId::qualified("public", "users");
    for i in 0..20 {
        gateway
            .accept(&record_line(&users, i), 0)
            .await
            .expect("accept");
    }
    gateway.accept(&state_line(1), 0).await.expect("accept");

    tokio::time::timeout(Duration::from_secs(5), async {
        while emitter.released().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("state released");

    assert_eq!(destination.flushed(&users).len(), 20);
    assert_eq!(emitter.released_payloads(), vec![state_line(1)]);

    gateway.close().await.expect("close");
    assert_eq!(emitter.released().len(), 1);
}

#[tokio::test]
async fn test_states_between_flushes_are_ordered() {
    let destination = Arc::new(CollectingDestination::new(1024 * 1024));
    let options = test_options().with_staleness_window(Duration::from_millis(10));
    let (mut gateway, emitter) = create_gateway(destination.clone(), options);
    gateway.start().await.expect("start");

    let users = StreamId::qualified("public", "users");
    for round in 0..3 {
        gateway
            .accept(&record_line(&users, round), 0)
            .await
            .expect("accept");
        gateway.accept(&state_line(round), 0).await.expect("accept");

        tokio::time::timeout(Duration::from_secs(5), async {
            while emitter.released().len() <= round {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("state released");
    }

    gateway.close().await.expect("close");

    assert_eq!(
        emitter.released_payloads(),
        vec![state_line(0), state_line(1), state_line(2)]
    );
}
