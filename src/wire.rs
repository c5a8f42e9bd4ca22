//! Self-describing encodings for values that cross a process boundary.
//!
//! Segments travel as JSON records. The payload is base64 encoded so byte
//! slices that split a multi-byte character survive unchanged, and the send
//! time keeps its full sub-second precision. Application deliveries use the
//! same JSON style with an optional `error` field set to `"lost"` for loss
//! reports.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    segment::{MessageId, Segment, SequenceNumber},
    sink::Delivery,
};

/// Errors raised while encoding or decoding wire records.
#[derive(Debug, Error)]
pub enum WireError {
    /// The record was not valid JSON or lacked a field.
    #[error("malformed record: {0}")]
    Json(#[from] serde_json::Error),
    /// The payload field was not valid base64.
    #[error("malformed payload encoding: {0}")]
    Payload(#[from] base64::DecodeError),
    /// The segment position lies outside its message.
    #[error("segment number {segment_number} outside 1..={total_segments}")]
    InvalidPosition {
        segment_number: u32,
        total_segments: u32,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSegment {
    message_id: MessageId,
    username: String,
    send_time: DateTime<Utc>,
    segment_number: u32,
    total_segments: u32,
    payload: String,
}

/// Encode `segment` as a JSON record.
///
/// # Errors
///
/// Returns [`WireError::Json`] if serialization fails.
pub fn encode_segment(segment: &Segment) -> Result<Vec<u8>, WireError> {
    let record = WireSegment {
        message_id: segment.message_id(),
        username: segment.username().to_owned(),
        send_time: segment.sent_at(),
        segment_number: segment.sequence_number().get(),
        total_segments: segment.total_segments(),
        payload: STANDARD.encode(segment.payload()),
    };
    Ok(serde_json::to_vec(&record)?)
}

/// Decode a JSON segment record.
///
/// # Errors
///
/// Returns [`WireError`] when the record is malformed or names a position
/// outside its message.
pub fn decode_segment(bytes: &[u8]) -> Result<Segment, WireError> {
    let record: WireSegment = serde_json::from_slice(bytes)?;
    let payload = Bytes::from(STANDARD.decode(record.payload)?);
    let invalid = WireError::InvalidPosition {
        segment_number: record.segment_number,
        total_segments: record.total_segments,
    };
    let Some(sequence) = SequenceNumber::new(record.segment_number) else {
        return Err(invalid);
    };
    Segment::new(
        record.message_id,
        record.username,
        sequence,
        record.total_segments,
        record.send_time,
        payload,
    )
    .ok_or(invalid)
}

/// JSON shape of a delivery handed to an application-layer service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationMessage {
    /// Identifier of the message.
    pub message_id: MessageId,
    /// Sender of the message.
    pub username: String,
    /// Reassembled text; empty for loss reports.
    pub message: String,
    /// Send timestamp of the message.
    pub send_time: DateTime<Utc>,
    /// `"lost"` for loss reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Delivery> for ApplicationMessage {
    fn from(delivery: &Delivery) -> Self {
        match delivery {
            Delivery::Message(message) => Self {
                message_id: message.message_id(),
                username: message.username().to_owned(),
                message: String::from_utf8_lossy(message.payload()).into_owned(),
                send_time: message.sent_at(),
                error: None,
            },
            Delivery::Lost(notification) => Self {
                message_id: notification.message_id,
                username: notification.username.clone(),
                message: String::new(),
                send_time: notification.sent_at,
                error: Some(notification.reason.to_string()),
            },
        }
    }
}

/// Encode `delivery` as an [`ApplicationMessage`] JSON record.
///
/// # Errors
///
/// Returns [`WireError::Json`] if serialization fails.
pub fn encode_delivery(delivery: &Delivery) -> Result<Vec<u8>, WireError> {
    Ok(serde_json::to_vec(&ApplicationMessage::from(delivery))?)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::Value;

    use super::*;
    use crate::store::{LossNotification, LossReason, ReassembledMessage};

    fn sample_segment(payload: &'static [u8]) -> Segment {
        let sent_at = Utc
            .timestamp_opt(1_714_564_800, 123_456_789)
            .single()
            .expect("valid timestamp");
        Segment::new(
            MessageId::generate(),
            "alice",
            SequenceNumber::new(2).expect("non-zero"),
            3,
            sent_at,
            Bytes::from_static(payload),
        )
        .expect("valid position")
    }

    #[test]
    fn segment_record_preserves_split_characters_and_nanoseconds() {
        // Second byte of "é" followed by an ASCII byte.
        let segment = sample_segment(&[0xA9, b'x']);
        assert!(std::str::from_utf8(segment.payload()).is_err());

        let decoded = decode_segment(&encode_segment(&segment).expect("encode"))
            .expect("decode");
        assert_eq!(decoded, segment);
        assert_eq!(decoded.sent_at().timestamp_subsec_nanos(), 123_456_789);
    }

    #[test]
    fn segment_record_uses_camel_case_fields() {
        let encoded = encode_segment(&sample_segment(b"hi")).expect("encode");
        let value: Value = serde_json::from_slice(&encoded).expect("json");
        for field in [
            "messageId",
            "username",
            "sendTime",
            "segmentNumber",
            "totalSegments",
            "payload",
        ] {
            assert!(value.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(value["payload"], "aGk=");
    }

    #[test]
    fn decoding_rejects_positions_outside_the_message() {
        let encoded = encode_segment(&sample_segment(b"hi")).expect("encode");
        let mut value: Value = serde_json::from_slice(&encoded).expect("json");
        value["segmentNumber"] = Value::from(4);
        let err = decode_segment(&serde_json::to_vec(&value).expect("json"))
            .expect_err("position 4 of 3 must be rejected");
        assert!(matches!(
            err,
            WireError::InvalidPosition {
                segment_number: 4,
                total_segments: 3
            }
        ));

        value["segmentNumber"] = Value::from(0);
        assert!(decode_segment(&serde_json::to_vec(&value).expect("json")).is_err());
    }

    #[test]
    fn decoding_rejects_garbage() {
        assert!(matches!(decode_segment(b"not json"), Err(WireError::Json(_))));
    }

    #[test]
    fn loss_delivery_carries_lost_error() {
        let delivery = Delivery::Lost(LossNotification {
            message_id: MessageId::generate(),
            username: "bob".to_owned(),
            sent_at: Utc::now(),
            reason: LossReason::Lost,
        });
        let message = ApplicationMessage::from(&delivery);
        assert_eq!(message.error.as_deref(), Some("lost"));
        assert!(message.message.is_empty());

        let reassembled = Delivery::Message(ReassembledMessage::new(
            MessageId::generate(),
            "bob",
            Bytes::from_static(b"hello"),
            Utc::now(),
        ));
        let encoded = encode_delivery(&reassembled).expect("encode");
        let value: Value = serde_json::from_slice(&encoded).expect("json");
        assert_eq!(value["message"], "hello");
        assert!(value.get("error").is_none());
    }
}
