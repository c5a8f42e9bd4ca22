//! Segment and timestamp builders.

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use segment_transport::{MessageId, Segment, SequenceNumber};

/// Fixed reference instant used by deterministic tests.
#[must_use]
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// [`epoch`] shifted by `millis` milliseconds.
#[must_use]
pub fn at_millis(millis: i64) -> DateTime<Utc> { epoch() + TimeDelta::milliseconds(millis) }

/// Build segment `sequence` of `total` for `message_id`.
///
/// # Panics
///
/// Panics if `sequence` is zero or exceeds `total`.
#[must_use]
pub fn segment(
    message_id: MessageId,
    username: &str,
    sequence: u32,
    total: u32,
    payload: &'static [u8],
) -> Segment {
    let sequence = SequenceNumber::new(sequence).expect("sequence numbers start at 1");
    Segment::new(
        message_id,
        username,
        sequence,
        total,
        epoch(),
        Bytes::from_static(payload),
    )
    .expect("sequence within total")
}
