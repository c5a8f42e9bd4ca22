//! Values handed out by the store when a record leaves it.

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use derive_more::Display;

use crate::segment::MessageId;

/// A fully reassembled message payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReassembledMessage {
    message_id: MessageId,
    username: String,
    payload: Bytes,
    sent_at: DateTime<Utc>,
}

impl ReassembledMessage {
    /// Construct a new [`ReassembledMessage`].
    #[must_use]
    pub fn new(
        message_id: MessageId,
        username: impl Into<String>,
        payload: Bytes,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            message_id,
            username: username.into(),
            payload,
            sent_at,
        }
    }

    /// Identifier shared by the segments that formed this message.
    #[must_use]
    pub const fn message_id(&self) -> MessageId { self.message_id }

    /// Sender of the message.
    #[must_use]
    pub fn username(&self) -> &str { &self.username }

    /// Borrow the reassembled payload.
    #[must_use]
    pub fn payload(&self) -> &Bytes { &self.payload }

    /// Send timestamp of the original message.
    #[must_use]
    pub const fn sent_at(&self) -> DateTime<Utc> { self.sent_at }

    /// Consume the message, returning the owned payload bytes.
    #[must_use]
    pub fn into_payload(self) -> Bytes { self.payload }
}

/// Result of the segment that completed a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedMessage {
    /// The reassembled message.
    pub message: ReassembledMessage,
    /// One transit-time sample per segment, in sequence order.
    pub latencies: Vec<TimeDelta>,
}

/// Why a message was abandoned.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum LossReason {
    /// Segments stopped arriving before the message was complete.
    #[display("lost")]
    Lost,
}

/// Signal sent upstream when a stale record is evicted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LossNotification {
    /// Identifier of the abandoned message.
    pub message_id: MessageId,
    /// Sender of the abandoned message.
    pub username: String,
    /// Send timestamp of the abandoned message.
    pub sent_at: DateTime<Utc>,
    /// Reason the message was abandoned.
    pub reason: LossReason,
}

/// A record removed by [`sweep_stale`](crate::store::ReassemblyStore::sweep_stale).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvictedRecord {
    /// Identifier of the evicted message.
    pub message_id: MessageId,
    /// Sender of the evicted message.
    pub username: String,
    /// Send timestamp recorded for the message.
    pub sent_at: DateTime<Utc>,
    /// Segments that arrived before eviction.
    pub received: u32,
    /// Segments the message was split into.
    pub total_segments: u32,
}

impl EvictedRecord {
    /// Build the loss notification reported for this record.
    #[must_use]
    pub fn into_notification(self) -> LossNotification {
        LossNotification {
            message_id: self.message_id,
            username: self.username,
            sent_at: self.sent_at,
            reason: LossReason::Lost,
        }
    }
}
