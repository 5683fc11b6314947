use std::thread;
use std::time::Duration;

use chrono::Utc;

use super::{BrokerClient, BrokerError, InMemoryBroker, OutboundMessage, ReceiptHandle};

#[test]
fn test_publish_and_consume() {
    let broker = InMemoryBroker::new();
    let producer = broker.producer("inst", "emails");
    let handle = producer.publish(OutboundMessage::new("hello")).unwrap();
    assert_eq!(handle.topic, "emails");
    assert!(!handle.message_id.is_empty());

    let consumer = broker.consumer("inst", "emails", "GID_test", None);
    let messages = consumer.consume(1, 0).unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, handle.message_id);
    assert_eq!(messages[0].body, "hello");
    assert_eq!(messages[0].consumed_times, 1);
}

#[test]
fn test_consume_empty_topic_reports_message_not_exist() {
    let broker = InMemoryBroker::new();
    let consumer = broker.consumer("inst", "nothing_here", "GID_test", None);
    let err = consumer.consume(1, 0).unwrap_err();
    assert!(err.is_message_not_exist());
}

#[test]
fn test_consume_respects_max_count() {
    let broker = InMemoryBroker::new();
    let producer = broker.producer("inst", "batch");
    for i in 0..3 {
        producer
            .publish(OutboundMessage::new(format!("msg{i}")))
            .unwrap();
    }

    let consumer = broker.consumer("inst", "batch", "GID_test", None);
    let first = consumer.consume(2, 0).unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].body, "msg0");
    assert_eq!(first[1].body, "msg1");

    let second = consumer.consume(2, 0).unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].body, "msg2");
}

#[test]
fn test_tag_filtering() {
    let broker = InMemoryBroker::new();
    let producer = broker.producer("inst", "shared");
    producer
        .publish(OutboundMessage::new("mail").with_tag("emails"))
        .unwrap();
    producer
        .publish(OutboundMessage::new("sms").with_tag("texts"))
        .unwrap();

    let texts = broker.consumer("inst", "shared", "GID_test", Some("texts"));
    let messages = texts.consume(10, 0).unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].body, "sms");
    assert_eq!(messages[0].tag.as_deref(), Some("texts"));
}

#[test]
fn test_delayed_message_is_held_back() {
    let broker = InMemoryBroker::new();
    let producer = broker.producer("inst", "later");
    producer
        .publish(OutboundMessage::new("wait").deliver_at(Utc::now() + chrono::Duration::seconds(300)))
        .unwrap();

    let consumer = broker.consumer("inst", "later", "GID_test", None);
    assert!(consumer.consume(1, 0).unwrap_err().is_message_not_exist());
    assert_eq!(broker.pending("later", "GID_test"), 1);
}

#[test]
fn test_unacked_message_is_redelivered_with_incremented_count() {
    let broker = InMemoryBroker::with_visibility_timeout(Duration::ZERO);
    broker
        .producer("inst", "retry")
        .publish(OutboundMessage::new("again"))
        .unwrap();

    let consumer = broker.consumer("inst", "retry", "GID_test", None);
    let first = consumer.consume(1, 0).unwrap();
    let second = consumer.consume(1, 0).unwrap();
    let third = consumer.consume(1, 0).unwrap();

    assert_eq!(first[0].consumed_times, 1);
    assert_eq!(second[0].consumed_times, 2);
    assert_eq!(third[0].consumed_times, 3);
    assert_ne!(first[0].receipt_handle, third[0].receipt_handle);
}

#[test]
fn test_leased_message_is_invisible_until_timeout() {
    let broker = InMemoryBroker::new();
    broker
        .producer("inst", "lease")
        .publish(OutboundMessage::new("mine"))
        .unwrap();

    let consumer = broker.consumer("inst", "lease", "GID_test", None);
    assert_eq!(consumer.consume(1, 0).unwrap().len(), 1);
    assert!(consumer.consume(1, 0).unwrap_err().is_message_not_exist());
}

#[test]
fn test_ack_retires_message() {
    let broker = InMemoryBroker::with_visibility_timeout(Duration::ZERO);
    broker
        .producer("inst", "acks")
        .publish(OutboundMessage::new("done"))
        .unwrap();

    let consumer = broker.consumer("inst", "acks", "GID_test", None);
    let messages = consumer.consume(1, 0).unwrap();
    consumer.ack(&[messages[0].receipt_handle.clone()]).unwrap();

    assert_eq!(broker.pending("acks", "GID_test"), 0);
    assert!(consumer.consume(1, 0).unwrap_err().is_message_not_exist());
}

#[test]
fn test_stale_receipt_is_rejected() {
    let broker = InMemoryBroker::with_visibility_timeout(Duration::ZERO);
    broker
        .producer("inst", "stale")
        .publish(OutboundMessage::new("x"))
        .unwrap();

    let consumer = broker.consumer("inst", "stale", "GID_test", None);
    let first = consumer.consume(1, 0).unwrap();
    let _second = consumer.consume(1, 0).unwrap();

    let err = consumer
        .ack(&[first[0].receipt_handle.clone()])
        .unwrap_err();
    assert!(matches!(err, BrokerError::InvalidReceipt { .. }));
}

#[test]
fn test_unknown_receipt_is_rejected() {
    let broker = InMemoryBroker::new();
    let consumer = broker.consumer("inst", "acks", "GID_test", None);
    let err = consumer.ack(&[ReceiptHandle::new("bogus")]).unwrap_err();
    assert!(matches!(err, BrokerError::InvalidReceipt { .. }));
}

#[test]
fn test_batch_ack_with_invalid_handle_retires_nothing() {
    let broker = InMemoryBroker::new();
    let producer = broker.producer("inst", "batch_ack");
    for body in ["a", "b"] {
        producer.publish(OutboundMessage::new(body)).unwrap();
    }

    let consumer = broker.consumer("inst", "batch_ack", "GID_test", None);
    let messages = consumer.consume(2, 0).unwrap();
    let handles = vec![
        messages[0].receipt_handle.clone(),
        ReceiptHandle::new("bogus"),
        messages[1].receipt_handle.clone(),
    ];

    let err = consumer.ack(&handles).unwrap_err();
    assert!(matches!(err, BrokerError::InvalidReceipt { ref handle } if handle == "bogus"));
    assert_eq!(broker.pending("batch_ack", "GID_test"), 2);

    consumer
        .ack(&[
            messages[0].receipt_handle.clone(),
            messages[1].receipt_handle.clone(),
        ])
        .unwrap();
    assert_eq!(broker.pending("batch_ack", "GID_test"), 0);
}

#[test]
fn test_groups_track_deliveries_independently() {
    let broker = InMemoryBroker::new();
    broker
        .producer("inst", "fanout")
        .publish(OutboundMessage::new("both"))
        .unwrap();

    let a = broker.consumer("inst", "fanout", "GID_a", None);
    let b = broker.consumer("inst", "fanout", "GID_b", None);
    assert_eq!(a.consume(1, 0).unwrap()[0].body, "both");
    assert_eq!(b.consume(1, 0).unwrap()[0].body, "both");
}

#[test]
fn test_long_poll_wakes_on_publish() {
    let broker = InMemoryBroker::new();
    let consumer = broker.consumer("inst", "wakeup", "GID_test", None);

    let publisher = broker.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        publisher
            .producer("inst", "wakeup")
            .publish(OutboundMessage::new("late"))
            .unwrap();
    });

    let messages = consumer.consume(1, 5).unwrap();
    assert_eq!(messages[0].body, "late");
    handle.join().unwrap();
}

#[test]
fn test_fault_injection_fires_once() {
    let broker = InMemoryBroker::new();
    let producer = broker.producer("inst", "faulty");

    broker.fail_next_publish(BrokerError::rejected("message too large"));
    assert!(matches!(
        producer.publish(OutboundMessage::new("x")),
        Err(BrokerError::Rejected { .. })
    ));
    assert!(producer.publish(OutboundMessage::new("x")).is_ok());

    broker.fail_next_consume(BrokerError::transport("connection reset"));
    let consumer = broker.consumer("inst", "faulty", "GID_test", None);
    assert!(matches!(
        consumer.consume(1, 0),
        Err(BrokerError::Transport { .. })
    ));
    assert_eq!(consumer.consume(1, 0).unwrap().len(), 1);
}

#[test]
fn test_credentials_debug_redacts_key() {
    let credentials = super::Credentials {
        endpoint: "http://localhost".to_string(),
        access_id: "id".to_string(),
        access_key: "super-secret".to_string(),
    };
    let debug = format!("{credentials:?}");
    assert!(!debug.contains("super-secret"));
    assert!(debug.contains("<redacted>"));
}
