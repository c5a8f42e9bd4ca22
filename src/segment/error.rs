//! Errors emitted while splitting outbound messages into segments.

use thiserror::Error;

/// Errors produced by [`split`](crate::segment::split) and
/// [`Segmenter`](crate::segment::Segmenter).
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum SegmentationError {
    /// The requested segment size was zero.
    #[error("segment size must be positive, got {size}")]
    InvalidSegmentSize { size: usize },
    /// The payload needs more segments than a `u32` sequence number can address.
    #[error("payload of {len} bytes needs more than u32::MAX segments")]
    TooManySegments { len: usize },
}
