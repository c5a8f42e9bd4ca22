//! Concurrent store of in-flight reassembly records.
//!
//! [`ReassemblyStore`] is the only owner of reassembly state. Ingress
//! callers fold segments in with [`accept_segment`](ReassemblyStore::accept_segment)
//! while the sweeper evicts stalled records with
//! [`sweep_stale`](ReassemblyStore::sweep_stale). Both paths mutate a record
//! only while holding the map shard lock for its key, so a record is either
//! completed or evicted, never both. No guard escapes the store, which keeps
//! collaborator I/O outside every lock.

mod error;
mod message;
mod policy;
mod record;

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use log::debug;

pub use self::{
    error::ReassemblyError,
    message::{CompletedMessage, EvictedRecord, LossNotification, LossReason, ReassembledMessage},
    policy::{LatencyReference, UnknownMessagePolicy},
    record::RecordSummary,
};
use self::record::{Fill, ReassemblyRecord};
use crate::segment::{MessageId, Segment};

/// Largest segment count a record may be created with unless configured
/// otherwise.
pub const DEFAULT_MAX_SEGMENTS: u32 = 1 << 16;

/// Concurrent map from message identity to its reassembly record.
#[derive(Debug)]
pub struct ReassemblyStore {
    records: DashMap<MessageId, ReassemblyRecord>,
    unknown_policy: UnknownMessagePolicy,
    latency_reference: LatencyReference,
    max_segments: u32,
}

impl Default for ReassemblyStore {
    fn default() -> Self { Self::new(UnknownMessagePolicy::default(), LatencyReference::default()) }
}

impl ReassemblyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(unknown_policy: UnknownMessagePolicy, latency_reference: LatencyReference) -> Self {
        Self {
            records: DashMap::new(),
            unknown_policy,
            latency_reference,
            max_segments: DEFAULT_MAX_SEGMENTS,
        }
    }

    /// Refuse records for messages of more than `limit` segments.
    ///
    /// Every record allocates one slot per segment up front, so the limit
    /// bounds the memory a single message id can claim.
    #[must_use]
    pub fn with_max_segments(mut self, limit: u32) -> Self {
        self.max_segments = limit;
        self
    }

    /// Largest segment count a record may be created with.
    #[must_use]
    pub const fn max_segments(&self) -> u32 { self.max_segments }

    /// Policy applied to segments of unregistered messages.
    #[must_use]
    pub const fn unknown_policy(&self) -> UnknownMessagePolicy { self.unknown_policy }

    /// Reference point used for latency samples.
    #[must_use]
    pub const fn latency_reference(&self) -> LatencyReference { self.latency_reference }

    /// Register a record for `message_id` unless one already exists.
    ///
    /// An existing record is returned unchanged, so repeated registration is
    /// harmless.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::ZeroSegments`] when `total_segments` is zero
    /// and [`ReassemblyError::SegmentLimitExceeded`] when it is above
    /// [`max_segments`](Self::max_segments).
    pub fn begin_or_touch(
        &self,
        message_id: MessageId,
        username: &str,
        total_segments: u32,
        sent_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<RecordSummary, ReassemblyError> {
        if total_segments == 0 {
            return Err(ReassemblyError::ZeroSegments {
                message_id,
                username: username.to_owned(),
            });
        }
        self.check_limit(message_id, username, total_segments)?;
        let record = self.records.entry(message_id).or_insert_with(|| {
            ReassemblyRecord::new(message_id, username, total_segments, sent_at, now)
        });
        Ok(record.summary())
    }

    /// Fold `segment` into its record using the current time.
    ///
    /// Returns `Ok(Some(_))` when the segment completes the message and
    /// `Ok(None)` while more segments are required.
    ///
    /// # Errors
    ///
    /// See [`accept_segment_at`](Self::accept_segment_at).
    pub fn accept_segment(
        &self,
        segment: Segment,
    ) -> Result<Option<CompletedMessage>, ReassemblyError> {
        self.accept_segment_at(segment, Utc::now())
    }

    /// Fold `segment` into its record using an explicit clock reading.
    ///
    /// Re-delivering a sequence number overwrites the stored payload without
    /// counting it twice. The segment that fills the last empty slot removes
    /// the record from the store in the same critical section.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::UnknownMessage`] when no record exists and
    /// the policy is [`UnknownMessagePolicy::Reject`], or
    /// [`ReassemblyError::TotalMismatch`] when the segment disagrees with the
    /// record about the segment count. A segment that would create a record
    /// above [`max_segments`](Self::max_segments) fails with
    /// [`ReassemblyError::SegmentLimitExceeded`] and allocates nothing.
    pub fn accept_segment_at(
        &self,
        segment: Segment,
        now: DateTime<Utc>,
    ) -> Result<Option<CompletedMessage>, ReassemblyError> {
        let message_id = segment.message_id();

        match self.records.entry(message_id) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                if record.total_segments() != segment.total_segments() {
                    return Err(ReassemblyError::TotalMismatch {
                        message_id,
                        username: record.username().to_owned(),
                        expected: record.total_segments(),
                        found: segment.total_segments(),
                    });
                }
                let sequence = segment.sequence_number();
                if record.fill(segment, now) == Fill::Duplicate {
                    debug!(
                        "duplicate segment overwritten: message_id={message_id}, \
                         sequence={sequence}"
                    );
                    crate::metrics::inc_duplicate_segments();
                }
                if record.is_complete() {
                    let record = occupied.remove();
                    return Ok(Some(record.into_completed(self.latency_reference)));
                }
                Ok(None)
            }
            Entry::Vacant(vacant) => match self.unknown_policy {
                UnknownMessagePolicy::Reject => Err(ReassemblyError::UnknownMessage {
                    message_id,
                    username: segment.username().to_owned(),
                }),
                UnknownMessagePolicy::CreateOnFirstSegment => {
                    self.check_limit(message_id, segment.username(), segment.total_segments())?;
                    let mut record = ReassemblyRecord::new(
                        message_id,
                        segment.username(),
                        segment.total_segments(),
                        segment.sent_at(),
                        now,
                    );
                    record.fill(segment, now);
                    if record.is_complete() {
                        return Ok(Some(record.into_completed(self.latency_reference)));
                    }
                    vacant.insert(record);
                    Ok(None)
                }
            },
        }
    }

    /// Evict every record idle for at least `stale_after` as of `now`.
    ///
    /// Candidate keys are collected from a locked snapshot, then each record
    /// is removed only if it is still stale under its own shard lock. A
    /// segment accepted between the two steps refreshes the record and
    /// saves it; a record completed in between is already gone.
    pub fn sweep_stale(&self, stale_after: Duration, now: DateTime<Utc>) -> Vec<EvictedRecord> {
        let candidates: Vec<MessageId> = self
            .records
            .iter()
            .filter(|entry| entry.value().is_stale(stale_after, now))
            .map(|entry| *entry.key())
            .collect();

        candidates
            .into_iter()
            .filter_map(|message_id| {
                self.records
                    .remove_if(&message_id, |_, record| record.is_stale(stale_after, now))
            })
            .map(|(_, record)| record.into_evicted())
            .collect()
    }

    /// Progress snapshot for `message_id`, if it is in flight.
    #[must_use]
    pub fn summary(&self, message_id: &MessageId) -> Option<RecordSummary> {
        self.records.get(message_id).map(|record| record.summary())
    }

    /// Whether a record exists for `message_id`.
    #[must_use]
    pub fn contains(&self, message_id: &MessageId) -> bool { self.records.contains_key(message_id) }

    /// Number of records currently in flight.
    #[must_use]
    pub fn len(&self) -> usize { self.records.len() }

    /// Whether no records are in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    fn check_limit(
        &self,
        message_id: MessageId,
        username: &str,
        total_segments: u32,
    ) -> Result<(), ReassemblyError> {
        if total_segments > self.max_segments {
            return Err(ReassemblyError::SegmentLimitExceeded {
                message_id,
                username: username.to_owned(),
                total_segments,
                limit: self.max_segments,
            });
        }
        Ok(())
    }
}
