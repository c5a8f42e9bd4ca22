//! Per-message reassembly state owned by the store.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};

use super::{
    LatencyReference,
    message::{CompletedMessage, EvictedRecord, ReassembledMessage},
};
use crate::segment::{MessageId, Segment};

#[derive(Clone, Debug)]
struct Slot {
    payload: Bytes,
    received_at: DateTime<Utc>,
    sent_at: DateTime<Utc>,
}

/// Outcome of writing a segment into its slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Fill {
    /// The slot was empty.
    First,
    /// The slot already held a payload, which was overwritten.
    Duplicate,
}

/// Snapshot of a record's progress.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordSummary {
    /// Identifier of the tracked message.
    pub message_id: MessageId,
    /// Sender of the tracked message.
    pub username: String,
    /// Number of segments the message was split into.
    pub total_segments: u32,
    /// Slots still waiting for a segment.
    pub remaining: u32,
    /// Send timestamp recorded when the record was created.
    pub first_sent_at: DateTime<Utc>,
    /// Time the record last accepted a segment, or was created.
    pub last_received_at: DateTime<Utc>,
}

/// In-flight reassembly of one logical message.
///
/// `remaining` always equals the number of empty slots.
#[derive(Debug)]
pub(super) struct ReassemblyRecord {
    message_id: MessageId,
    username: String,
    remaining: u32,
    slots: Vec<Option<Slot>>,
    first_sent_at: DateTime<Utc>,
    last_received_at: DateTime<Utc>,
}

impl ReassemblyRecord {
    pub(super) fn new(
        message_id: MessageId,
        username: &str,
        total_segments: u32,
        sent_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            message_id,
            username: username.to_owned(),
            remaining: total_segments,
            slots: vec![None; total_segments as usize],
            first_sent_at: sent_at,
            last_received_at: now,
        }
    }

    pub(super) fn username(&self) -> &str { &self.username }

    pub(super) fn total_segments(&self) -> u32 {
        u32::try_from(self.slots.len()).unwrap_or(u32::MAX)
    }

    pub(super) fn is_complete(&self) -> bool { self.remaining == 0 }

    /// Store `segment` in its slot and refresh the staleness clock.
    ///
    /// The caller has already checked the segment's total against this
    /// record, so its sequence number addresses a valid slot.
    pub(super) fn fill(&mut self, segment: Segment, now: DateTime<Utc>) -> Fill {
        let offset = segment.sequence_number().slot();
        let sent_at = segment.sent_at();
        let slot = Slot {
            payload: segment.into_payload(),
            received_at: now,
            sent_at,
        };
        let fill = match self.slots[offset].replace(slot) {
            Some(_) => Fill::Duplicate,
            None => {
                self.remaining -= 1;
                Fill::First
            }
        };
        self.last_received_at = self.last_received_at.max(now);
        fill
    }

    pub(super) fn is_stale(&self, stale_after: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last_received_at)
            .to_std()
            .is_ok_and(|idle| idle >= stale_after)
    }

    pub(super) fn summary(&self) -> RecordSummary {
        RecordSummary {
            message_id: self.message_id,
            username: self.username.clone(),
            total_segments: self.total_segments(),
            remaining: self.remaining,
            first_sent_at: self.first_sent_at,
            last_received_at: self.last_received_at,
        }
    }

    /// Concatenate the slots in sequence order.
    ///
    /// Only called once `remaining` reached zero, so every slot is filled.
    pub(super) fn into_completed(self, reference: LatencyReference) -> CompletedMessage {
        debug_assert!(self.is_complete(), "record completed with empty slots");
        let slots: Vec<Slot> = self.slots.into_iter().flatten().collect();
        let mut payload = BytesMut::with_capacity(slots.iter().map(|s| s.payload.len()).sum());
        let mut latencies = Vec::with_capacity(slots.len());

        for slot in slots {
            let origin = match reference {
                LatencyReference::FirstSentAt => self.first_sent_at,
                LatencyReference::SegmentSentAt => slot.sent_at,
            };
            latencies.push(slot.received_at.signed_duration_since(origin));
            payload.extend_from_slice(&slot.payload);
        }

        CompletedMessage {
            message: ReassembledMessage::new(
                self.message_id,
                self.username,
                payload.freeze(),
                self.first_sent_at,
            ),
            latencies,
        }
    }

    pub(super) fn into_evicted(self) -> EvictedRecord {
        let total_segments = self.total_segments();
        EvictedRecord {
            message_id: self.message_id,
            username: self.username,
            sent_at: self.first_sent_at,
            received: total_segments - self.remaining,
            total_segments,
        }
    }
}
