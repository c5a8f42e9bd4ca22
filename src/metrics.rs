//! Metric helpers for `segment_transport`.
//!
//! This module defines metric names and simple helper functions
//! wrapping the [`metrics`](https://docs.rs/metrics) crate. With the
//! `metrics` feature disabled every helper is a no-op.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge holding the average per-segment latency, in seconds, of
/// the most recently completed message.
pub const SEGMENT_LATENCY_SECONDS: &str = "segment_transport_segment_latency_avg_seconds";
/// Name of the counter tracking reassembled messages.
pub const MESSAGES_COMPLETED: &str = "segment_transport_messages_completed_total";
/// Name of the counter tracking messages reported lost.
pub const MESSAGES_LOST: &str = "segment_transport_messages_lost_total";
/// Name of the counter tracking segments handed to the store.
pub const SEGMENTS_RECEIVED: &str = "segment_transport_segments_received_total";
/// Name of the counter tracking segments for unknown messages.
pub const SEGMENTS_UNKNOWN: &str = "segment_transport_segments_unknown_total";
/// Name of the counter tracking segments refused for exceeding the segment
/// limit.
pub const SEGMENTS_REJECTED: &str = "segment_transport_segments_rejected_total";
/// Name of the counter tracking re-delivered segments.
pub const SEGMENTS_DUPLICATE: &str = "segment_transport_segments_duplicate_total";
/// Name of the counter tracking carrier dispatch failures.
pub const DISPATCH_ERRORS: &str = "segment_transport_dispatch_errors_total";

/// Set the average segment latency gauge.
#[cfg_attr(not(feature = "metrics"), expect(unused_variables, reason = "metrics disabled"))]
pub fn set_segment_latency(seconds: f64) {
    #[cfg(feature = "metrics")]
    gauge!(SEGMENT_LATENCY_SECONDS).set(seconds);
}

/// Record a reassembled message.
pub fn inc_completed() {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES_COMPLETED).increment(1);
}

/// Record a message reported lost.
pub fn inc_lost() {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES_LOST).increment(1);
}

/// Record a segment handed to the store.
pub fn inc_segments_received() {
    #[cfg(feature = "metrics")]
    counter!(SEGMENTS_RECEIVED).increment(1);
}

/// Record a segment for a message the store does not track.
pub fn inc_unknown_segments() {
    #[cfg(feature = "metrics")]
    counter!(SEGMENTS_UNKNOWN).increment(1);
}

/// Record a segment refused for exceeding the segment limit.
pub fn inc_rejected_segments() {
    #[cfg(feature = "metrics")]
    counter!(SEGMENTS_REJECTED).increment(1);
}

/// Record a re-delivered segment.
pub fn inc_duplicate_segments() {
    #[cfg(feature = "metrics")]
    counter!(SEGMENTS_DUPLICATE).increment(1);
}

/// Record a failed carrier dispatch.
pub fn inc_dispatch_errors() {
    #[cfg(feature = "metrics")]
    counter!(DISPATCH_ERRORS).increment(1);
}
