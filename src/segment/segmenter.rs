//! Outbound helper that splits logical messages into transport segments.
//!
//! [`split`] is the pure byte-level chunking primitive. [`Segmenter`] wraps
//! it with a validated segment size and tags each chunk with the metadata the
//! receiving side needs: a fresh [`MessageId`], the sender, a one-based
//! [`SequenceNumber`] and the total segment count.

use std::num::NonZeroUsize;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::{MessageId, Segment, SegmentationError, SequenceNumber};

/// Split `payload` into consecutive slices of at most `segment_size` bytes.
///
/// Splitting works on raw bytes, so a multi-byte UTF-8 character may straddle
/// two segments. An empty payload yields no segments.
///
/// # Examples
///
/// ```
/// use segment_transport::segment::split;
/// let parts = split(b"abcdefg", 3).expect("non-zero size");
/// assert_eq!(parts, vec![&b"abc"[..], &b"def"[..], &b"g"[..]]);
/// assert!(split(b"", 3).expect("non-zero size").is_empty());
/// ```
///
/// # Errors
///
/// Returns [`SegmentationError::InvalidSegmentSize`] when `segment_size` is
/// zero.
pub fn split(payload: &[u8], segment_size: usize) -> Result<Vec<&[u8]>, SegmentationError> {
    if segment_size == 0 {
        return Err(SegmentationError::InvalidSegmentSize { size: segment_size });
    }
    Ok(payload.chunks(segment_size).collect())
}

/// Splits message payloads into segment-sized [`Segment`]s.
#[derive(Clone, Copy, Debug)]
pub struct Segmenter {
    segment_size: NonZeroUsize,
}

impl Segmenter {
    /// Create a segmenter that caps segment payloads at `segment_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentationError::InvalidSegmentSize`] when `segment_size`
    /// is zero.
    pub fn new(segment_size: usize) -> Result<Self, SegmentationError> {
        NonZeroUsize::new(segment_size)
            .map(Self::with_size)
            .ok_or(SegmentationError::InvalidSegmentSize { size: segment_size })
    }

    /// Create a segmenter from an already validated size.
    #[must_use]
    pub const fn with_size(segment_size: NonZeroUsize) -> Self { Self { segment_size } }

    /// Return the maximum segment payload size in bytes.
    #[must_use]
    pub const fn segment_size(&self) -> NonZeroUsize { self.segment_size }

    /// Number of segments `len` payload bytes will produce.
    #[must_use]
    pub const fn segment_count(&self, len: usize) -> usize { len.div_ceil(self.segment_size.get()) }

    /// Split `payload` into segments under a freshly generated [`MessageId`].
    ///
    /// # Errors
    ///
    /// Returns [`SegmentationError::TooManySegments`] if the payload would
    /// need more than `u32::MAX` segments.
    pub fn segment(
        &self,
        username: &str,
        payload: Bytes,
        sent_at: DateTime<Utc>,
    ) -> Result<SegmentBatch, SegmentationError> {
        self.segment_with_id(MessageId::generate(), username, payload, sent_at)
    }

    /// Split `payload` into segments tagged with `message_id`.
    ///
    /// Segments share the allocation of `payload`; no bytes are copied.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentationError::TooManySegments`] if the payload would
    /// need more than `u32::MAX` segments.
    pub fn segment_with_id(
        &self,
        message_id: MessageId,
        username: &str,
        payload: Bytes,
        sent_at: DateTime<Utc>,
    ) -> Result<SegmentBatch, SegmentationError> {
        let len = payload.len();
        let total = u32::try_from(self.segment_count(len))
            .map_err(|_| SegmentationError::TooManySegments { len })?;
        let size = self.segment_size.get();

        let segments = (0..len)
            .step_by(size)
            .enumerate()
            .map(|(slot, offset)| {
                let end = (offset + size).min(len);
                let sequence =
                    SequenceNumber::from_slot(slot).ok_or(SegmentationError::TooManySegments { len })?;
                Segment::new(
                    message_id,
                    username,
                    sequence,
                    total,
                    sent_at,
                    payload.slice(offset..end),
                )
                .ok_or(SegmentationError::TooManySegments { len })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SegmentBatch {
            message_id,
            total,
            segments,
        })
    }
}

/// Collection of segments produced for a single logical message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentBatch {
    message_id: MessageId,
    total: u32,
    segments: Vec<Segment>,
}

impl SegmentBatch {
    /// Return the [`MessageId`] shared by all segments.
    #[must_use]
    pub const fn message_id(&self) -> MessageId { self.message_id }

    /// Number of segments in the batch, as carried on each segment.
    #[must_use]
    pub const fn total_segments(&self) -> u32 { self.total }

    /// Return the segments in sequence order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] { self.segments.as_slice() }

    /// Number of segments in the batch.
    #[must_use]
    pub fn len(&self) -> usize { self.segments.len() }

    /// Whether the payload produced no segments at all.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.segments.is_empty() }

    /// Consume the batch, returning all segments.
    #[must_use]
    pub fn into_segments(self) -> Vec<Segment> { self.segments }
}

impl IntoIterator for SegmentBatch {
    type Item = Segment;
    type IntoIter = std::vec::IntoIter<Segment>;

    fn into_iter(self) -> Self::IntoIter { self.segments.into_iter() }
}
