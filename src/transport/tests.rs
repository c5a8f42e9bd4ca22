//! Unit tests for dispatch ordering, receive handling and sink failures.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use chrono::{TimeDelta, Utc};
use mockall::{Sequence, predicate::function};
use rstest::{fixture, rstest};
use tokio::sync::mpsc;

use super::Transport;
use crate::{
    carrier::{Carrier, MockCarrier},
    config::{ConfigError, TransportConfig},
    error::{BoxError, TransportError},
    latency::LatencySink,
    segment::{MessageId, Segment, SequenceNumber},
    sink::{ChannelSink, Delivery},
    store::{ReassemblyError, UnknownMessagePolicy},
};

#[derive(Default)]
struct Captured(Mutex<Vec<f64>>);

impl LatencySink for Captured {
    fn publish(&self, seconds: f64) {
        self.0.lock().expect("latency lock poisoned").push(seconds);
    }
}

/// Carrier that queues segments for the test to replay later.
struct Outbox(mpsc::UnboundedSender<Segment>);

#[async_trait::async_trait]
impl Carrier for Outbox {
    async fn send(&self, segment: Segment) -> Result<(), BoxError> {
        self.0.send(segment).map_err(|_| "outbox closed".into())
    }
}

#[fixture]
fn config() -> TransportConfig {
    TransportConfig {
        segment_size: 4,
        ..TransportConfig::default()
    }
}

fn loopback(
    config: TransportConfig,
) -> (
    Transport<Outbox, ChannelSink>,
    mpsc::UnboundedReceiver<Segment>,
    mpsc::Receiver<Delivery>,
) {
    let (tx, outbox) = mpsc::unbounded_channel();
    let (sink, deliveries) = ChannelSink::new(8);
    let transport = Transport::new(config, Outbox(tx), sink).expect("valid config");
    (transport, outbox, deliveries)
}

fn drain(outbox: &mut mpsc::UnboundedReceiver<Segment>) -> Vec<Segment> {
    let mut segments = Vec::new();
    while let Ok(segment) = outbox.try_recv() {
        segments.push(segment);
    }
    segments
}

#[rstest]
fn invalid_config_is_rejected_at_construction() {
    let config = TransportConfig {
        segment_size: 0,
        ..TransportConfig::default()
    };
    let (sink, _rx) = ChannelSink::new(1);
    let err = Transport::new(config, MockCarrier::new(), sink).expect_err("zero size");
    assert_eq!(err, ConfigError::ZeroSegmentSize);
}

#[rstest]
#[tokio::test]
async fn segments_are_dispatched_in_sequence_order(config: TransportConfig) {
    let mut carrier = MockCarrier::new();
    let mut seq = Sequence::new();
    for expected in 1..=3u32 {
        carrier
            .expect_send()
            .with(function(move |segment: &Segment| {
                segment.sequence_number().get() == expected && segment.total_segments() == 3
            }))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
    }
    let (sink, _rx) = ChannelSink::new(1);
    let transport = Transport::new(config, carrier, sink).expect("valid config");

    let id = transport
        .send_message("alice", Bytes::from_static(b"0123456789"), Utc::now())
        .await
        .expect("send");

    let summary = transport.store().summary(&id).expect("registered eagerly");
    assert_eq!(summary.total_segments, 3);
    assert_eq!(summary.remaining, 3);
}

#[rstest]
#[tokio::test]
async fn dispatch_failure_stops_remaining_segments(config: TransportConfig) {
    let mut carrier = MockCarrier::new();
    let mut seq = Sequence::new();
    carrier
        .expect_send()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    carrier
        .expect_send()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Err("carrier down".into()));
    let (sink, _rx) = ChannelSink::new(1);
    let transport = Transport::new(config, carrier, sink).expect("valid config");

    let err = transport
        .send_message("alice", Bytes::from_static(b"0123456789"), Utc::now())
        .await
        .expect_err("second segment fails");

    match err {
        TransportError::Dispatch {
            username, sequence, ..
        } => {
            assert_eq!(username, "alice");
            assert_eq!(sequence.get(), 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[rstest]
#[tokio::test]
async fn empty_payload_dispatches_nothing(config: TransportConfig) {
    let mut carrier = MockCarrier::new();
    carrier.expect_send().never();
    let (sink, _rx) = ChannelSink::new(1);
    let transport = Transport::new(config, carrier, sink).expect("valid config");

    let err = transport
        .send_message("alice", Bytes::new(), Utc::now())
        .await
        .expect_err("empty payload");
    assert!(matches!(err, TransportError::EmptyPayload { ref username } if username == "alice"));
    assert!(transport.store().is_empty());
}

#[rstest]
#[tokio::test]
async fn receiver_only_policy_skips_registration(config: TransportConfig) {
    let config = TransportConfig {
        unknown_message_policy: UnknownMessagePolicy::CreateOnFirstSegment,
        ..config
    };
    let (transport, mut outbox, _deliveries) = loopback(config);

    transport
        .send_message("bob", Bytes::from_static(b"hello world"), Utc::now())
        .await
        .expect("send");

    assert!(transport.store().is_empty());
    assert_eq!(drain(&mut outbox).len(), 3);
}

#[rstest]
#[tokio::test]
async fn reversed_segments_deliver_one_message(config: TransportConfig) {
    let (transport, mut outbox, mut deliveries) = loopback(config);
    let latency = Arc::new(Captured::default());
    let transport = transport.with_latency_sink(latency.clone());

    let id = transport
        .send_message("carol", Bytes::from_static(b"out of order!"), Utc::now())
        .await
        .expect("send");
    let mut segments = drain(&mut outbox);
    segments.reverse();
    for segment in segments {
        transport.receive_segment(segment).await.expect("receive");
    }

    match deliveries.try_recv().expect("one delivery") {
        Delivery::Message(message) => {
            assert_eq!(message.message_id(), id);
            assert_eq!(message.payload().as_ref(), b"out of order!");
        }
        Delivery::Lost(notification) => panic!("unexpected loss: {notification:?}"),
    }
    assert!(deliveries.try_recv().is_err());
    assert!(transport.store().is_empty());

    let published = latency.0.lock().expect("latency lock poisoned");
    assert_eq!(published.len(), 1);
    assert!(published[0] >= 0.0);
}

#[rstest]
#[tokio::test]
async fn unknown_segment_is_dropped_quietly(config: TransportConfig) {
    let (transport, _outbox, mut deliveries) = loopback(config);
    let stray = Segment::new(
        MessageId::generate(),
        "mallory",
        SequenceNumber::first(),
        2,
        Utc::now(),
        Bytes::from_static(b"??"),
    )
    .expect("valid position");

    transport.receive_segment(stray).await.expect("unknown is not an error");
    assert!(transport.store().is_empty());
    assert!(deliveries.try_recv().is_err());
}

#[rstest]
#[tokio::test]
async fn conflicting_total_is_a_reassembly_error(config: TransportConfig) {
    let (transport, mut outbox, _deliveries) = loopback(config);
    let id = transport
        .send_message("dave", Bytes::from_static(b"abcdefgh"), Utc::now())
        .await
        .expect("send");
    drain(&mut outbox);

    let forged = Segment::new(
        id,
        "dave",
        SequenceNumber::first(),
        7,
        Utc::now(),
        Bytes::from_static(b"abcd"),
    )
    .expect("valid position");
    let err = transport
        .receive_segment(forged)
        .await
        .expect_err("total mismatch");
    assert!(matches!(
        err,
        TransportError::Reassembly(ReassemblyError::TotalMismatch {
            expected: 2,
            found: 7,
            ..
        })
    ));
}

#[rstest]
#[tokio::test]
async fn sink_failure_is_reported_after_completion(config: TransportConfig) {
    let (transport, mut outbox, deliveries) = loopback(config);
    drop(deliveries);

    let id = transport
        .send_message("erin", Bytes::from_static(b"hi"), Utc::now())
        .await
        .expect("send");
    let segment = drain(&mut outbox).remove(0);

    let err = transport
        .receive_segment(segment)
        .await
        .expect_err("closed sink");
    assert!(matches!(err, TransportError::Sink { message_id, .. } if message_id == id));
    assert!(!transport.store().contains(&id));
}

#[rstest]
#[tokio::test]
async fn sweeper_reports_undelivered_messages(config: TransportConfig) {
    let (transport, mut outbox, mut deliveries) = loopback(config);
    let id = transport
        .send_message("frank", Bytes::from_static(b"never arrives"), Utc::now())
        .await
        .expect("send");
    drain(&mut outbox);

    let sweeper = transport.sweeper();
    assert_eq!(sweeper.stale_after(), transport.config().stale_after());
    let later = Utc::now() + TimeDelta::seconds(10);
    let lost = sweeper.sweep_at(later).await;

    assert_eq!(lost.len(), 1);
    let delivery = deliveries.try_recv().expect("loss delivered");
    assert!(delivery.is_lost());
    assert_eq!(delivery.message_id(), id);
}

#[rstest]
#[tokio::test]
async fn oversized_foreign_segment_is_dropped(config: TransportConfig) {
    let config = TransportConfig {
        unknown_message_policy: UnknownMessagePolicy::CreateOnFirstSegment,
        ..config
    };
    let (transport, _outbox, mut deliveries) = loopback(config);
    let forged = Segment::new(
        MessageId::generate(),
        "mallory",
        SequenceNumber::first(),
        u32::MAX,
        Utc::now(),
        Bytes::from_static(b"x"),
    )
    .expect("valid position");

    transport
        .receive_segment(forged)
        .await
        .expect("oversized segment is dropped, not an error");
    assert!(transport.store().is_empty());
    assert!(deliveries.try_recv().is_err());
}

#[rstest]
#[tokio::test]
async fn message_above_the_segment_limit_is_not_sent(config: TransportConfig) {
    let mut carrier = MockCarrier::new();
    carrier.expect_send().never();
    let (sink, _rx) = ChannelSink::new(1);
    let config = TransportConfig {
        max_segments: 2,
        ..config
    };
    let transport = Transport::new(config, carrier, sink).expect("valid config");

    let err = transport
        .send_message("alice", Bytes::from_static(b"0123456789"), Utc::now())
        .await
        .expect_err("three segments exceed the limit");
    assert!(matches!(
        err,
        TransportError::MessageTooLarge {
            segments: 3,
            limit: 2,
            ..
        }
    ));
    assert!(transport.store().is_empty());
}
