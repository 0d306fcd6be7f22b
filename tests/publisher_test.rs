mod common;

use std::time::Duration;

use bytes::Bytes;
use common::{spawn_nsqd, spawn_nsqd_with_heartbeat, FakeNsqd, NsqdReply, Published};
use env_gateway::publisher::{NsqProducer, ProducerConfig, PublishError, Publisher};

fn config() -> ProducerConfig {
    ProducerConfig {
        dial_timeout: Duration::from_secs(1),
        read_timeout: Duration::from_secs(2),
        write_timeout: Duration::from_secs(1),
    }
}

#[tokio::test]
async fn test_publish_to_nsqd() {
    let FakeNsqd { addr, mut published, .. } = spawn_nsqd(NsqdReply::Ok).await;
    let producer = NsqProducer::new(addr.to_string(), config());

    producer.publish("events", Bytes::from("first")).await.unwrap();
    producer.publish("events", Bytes::from("second")).await.unwrap();

    assert_eq!(
        published.recv().await.unwrap(),
        Published { topic: "events".to_string(), body: b"first".to_vec() }
    );
    assert_eq!(
        published.recv().await.unwrap(),
        Published { topic: "events".to_string(), body: b"second".to_vec() }
    );

    producer.stop().await;
}

#[tokio::test]
async fn test_publish_answers_heartbeat() {
    let FakeNsqd { addr, mut published, .. } = spawn_nsqd(NsqdReply::HeartbeatThenOk).await;
    let producer = NsqProducer::new(addr.to_string(), config());

    producer.publish("events", Bytes::from("body")).await.unwrap();
    assert_eq!(published.recv().await.unwrap().body, b"body".to_vec());
}

#[tokio::test]
async fn test_idle_connection_answers_heartbeats() {
    let nsqd = spawn_nsqd_with_heartbeat(NsqdReply::Ok, Some(Duration::from_millis(200))).await;
    let producer = NsqProducer::new(nsqd.addr.to_string(), config());

    producer.publish("events", Bytes::from("before")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    producer.publish("events", Bytes::from("after")).await.unwrap();

    assert_eq!(nsqd.stats.dropped(), 0);
    assert_eq!(nsqd.stats.connections(), 1);
    assert!(nsqd.stats.nops() >= 2, "nops = {}", nsqd.stats.nops());
}

#[tokio::test]
async fn test_frame_split_across_reads() {
    let nsqd = spawn_nsqd(NsqdReply::OkWithSplitHeartbeat).await;
    let producer = NsqProducer::new(nsqd.addr.to_string(), config());

    // 첫 읽기에 OK와 하트비트 프레임 앞부분이 함께 도착함
    producer.publish("events", Bytes::from("first")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(nsqd.stats.nops(), 1);

    producer.publish("events", Bytes::from("second")).await.unwrap();
    assert_eq!(nsqd.stats.connections(), 1);
}

#[tokio::test]
async fn test_reconnects_after_broker_closes_idle_connection() {
    let mut nsqd = spawn_nsqd(NsqdReply::OkThenClose).await;
    let producer = NsqProducer::new(nsqd.addr.to_string(), config());

    producer.publish("events", Bytes::from("first")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    producer.publish("events", Bytes::from("second")).await.unwrap();

    assert_eq!(nsqd.stats.connections(), 2);
    assert_eq!(nsqd.published.recv().await.unwrap().body, b"first".to_vec());
    assert_eq!(nsqd.published.recv().await.unwrap().body, b"second".to_vec());
}

#[tokio::test]
async fn test_publish_error_frame() {
    let FakeNsqd { addr, published: _published, .. } = spawn_nsqd(NsqdReply::Error).await;
    let producer = NsqProducer::new(addr.to_string(), config());

    let result = producer.publish("events", Bytes::from("body")).await;
    match result {
        Err(PublishError::Rejected(reason)) => assert!(reason.starts_with("E_BAD_MESSAGE")),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_publish_connection_refused() {
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let producer = NsqProducer::new(addr.to_string(), config());

    assert!(producer.publish("events", Bytes::from("body")).await.is_err());
}

#[tokio::test]
async fn test_concurrent_publishes_share_connection() {
    let FakeNsqd { addr, mut published, .. } = spawn_nsqd(NsqdReply::Ok).await;
    let producer = std::sync::Arc::new(NsqProducer::new(addr.to_string(), config()));

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let producer = producer.clone();
            tokio::spawn(async move {
                producer
                    .publish("events", Bytes::from(format!("message-{}", i)))
                    .await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let mut bodies = Vec::new();
    for _ in 0..8 {
        bodies.push(String::from_utf8(published.recv().await.unwrap().body).unwrap());
    }
    bodies.sort();
    let mut expected: Vec<String> = (0..8).map(|i| format!("message-{}", i)).collect();
    expected.sort();
    assert_eq!(bodies, expected);
}

#[tokio::test]
async fn test_publish_after_stop() {
    let FakeNsqd { addr, published: _published, .. } = spawn_nsqd(NsqdReply::Ok).await;
    let producer = NsqProducer::new(addr.to_string(), config());

    producer.publish("events", Bytes::from("body")).await.unwrap();
    producer.stop().await;

    assert!(matches!(
        producer.publish("events", Bytes::from("late")).await,
        Err(PublishError::Stopped)
    ));
}
