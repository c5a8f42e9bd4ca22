use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::{MessageId, SequenceNumber};

/// One bounded-size chunk of a message payload, tagged with its position.
///
/// `Segment` owns its payload as [`Bytes`], so segments produced by the
/// [`Segmenter`](crate::segment::Segmenter) share the original allocation.
/// The position invariant `1 <= sequence_number <= total_segments` is checked
/// by the constructor, so every `Segment` addresses a valid slot.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use chrono::Utc;
/// use segment_transport::segment::{MessageId, Segment, SequenceNumber};
///
/// let segment = Segment::new(
///     MessageId::generate(),
///     "alice",
///     SequenceNumber::first(),
///     2,
///     Utc::now(),
///     Bytes::from_static(b"hi"),
/// )
/// .expect("first of two fits");
/// assert!(!segment.is_last());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    message_id: MessageId,
    username: String,
    sequence_number: SequenceNumber,
    total_segments: u32,
    sent_at: DateTime<Utc>,
    payload: Bytes,
}

impl Segment {
    /// Create a segment, returning `None` if `sequence_number` exceeds
    /// `total_segments`.
    #[must_use]
    pub fn new(
        message_id: MessageId,
        username: impl Into<String>,
        sequence_number: SequenceNumber,
        total_segments: u32,
        sent_at: DateTime<Utc>,
        payload: Bytes,
    ) -> Option<Self> {
        if !sequence_number.fits(total_segments) {
            return None;
        }
        Some(Self {
            message_id,
            username: username.into(),
            sequence_number,
            total_segments,
            sent_at,
            payload,
        })
    }

    /// Identifier shared by all segments of the message.
    #[must_use]
    pub const fn message_id(&self) -> MessageId { self.message_id }

    /// Sender of the message.
    #[must_use]
    pub fn username(&self) -> &str { &self.username }

    /// One-based position within the message.
    #[must_use]
    pub const fn sequence_number(&self) -> SequenceNumber { self.sequence_number }

    /// Number of segments the message was split into.
    #[must_use]
    pub const fn total_segments(&self) -> u32 { self.total_segments }

    /// Send timestamp of the message this segment belongs to.
    #[must_use]
    pub const fn sent_at(&self) -> DateTime<Utc> { self.sent_at }

    /// Borrow the payload bytes.
    #[must_use]
    pub fn payload(&self) -> &Bytes { &self.payload }

    /// Report whether this segment carries the final sequence number.
    #[must_use]
    pub const fn is_last(&self) -> bool { self.sequence_number.get() == self.total_segments }

    /// Consume the segment, returning its payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes { self.payload }
}
