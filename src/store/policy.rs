//! Deployment policies that tune how the store treats inbound segments.

/// What the store does with a segment whose message it has never seen.
///
/// Sender-tracked deployments register every outbound message before its
/// segments leave, so an unknown identity means a late or foreign segment.
/// Receiver-only deployments never see the send side and must build records
/// from the first segment that arrives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnknownMessagePolicy {
    /// Fail with [`ReassemblyError::UnknownMessage`](crate::store::ReassemblyError::UnknownMessage).
    #[default]
    Reject,
    /// Lazily create a record from the segment's metadata.
    CreateOnFirstSegment,
}

impl UnknownMessagePolicy {
    /// Whether senders must register records before dispatching segments.
    #[must_use]
    pub const fn requires_registration(self) -> bool { matches!(self, Self::Reject) }
}

/// Reference point subtracted from each segment's arrival time when
/// computing latency samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LatencyReference {
    /// The send time recorded when the reassembly record was created.
    #[default]
    FirstSentAt,
    /// The send time carried by each individual segment.
    SegmentSentAt,
}
