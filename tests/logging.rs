//! Log output for unknown segments and lost messages.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{TimeDelta, Utc};
use log::Level;
use rstest::rstest;
use segment_transport::{MessageId, Transport, TransportConfig};
use segment_transport_testing::{CapturingSink, LoggerHandle, RecordingCarrier, logger, segment};

#[rstest]
#[tokio::test]
async fn unknown_segment_is_logged_as_warning(mut logger: LoggerHandle) {
    let transport = Transport::new(
        TransportConfig::default(),
        RecordingCarrier::new(),
        CapturingSink::new(),
    )
    .expect("valid config");
    let id = MessageId::generate();

    transport
        .receive_segment(segment(id, "mallory", 1, 2, b"??"))
        .await
        .expect("unknown segment is not an error");

    let warnings = logger.take_matching(Level::Warn, "unknown message");
    assert_eq!(warnings.len(), 1, "expected one warning");
    assert!(warnings[0].contains(&format!("message_id={id}")));
    assert!(warnings[0].contains("username=mallory"));
}

#[rstest]
#[tokio::test]
async fn lost_message_is_logged_as_warning(mut logger: LoggerHandle) {
    let carrier = Arc::new(RecordingCarrier::new());
    let transport = Transport::new(
        TransportConfig::default(),
        Arc::clone(&carrier),
        CapturingSink::new(),
    )
    .expect("valid config");
    let id = transport
        .send_message("nina", Bytes::from_static(b"gone"), Utc::now())
        .await
        .expect("send");

    transport
        .sweeper()
        .sweep_at(Utc::now() + TimeDelta::seconds(30))
        .await;

    let warnings = logger.take_matching(Level::Warn, "message lost");
    assert_eq!(warnings.len(), 1, "expected one loss warning");
    assert!(warnings[0].contains(&format!("message_id={id}")));
}
