//! Segment primitives for transparent message splitting.
//!
//! This module collects the outbound half of the pipeline: the message
//! identity, one-based sequence numbers, the [`Segment`] unit carried by the
//! lower-layer carrier, and the [`Segmenter`] that produces segments.

pub mod error;
mod frame;
pub mod id;
pub mod segmenter;
pub mod sequence;

pub use error::SegmentationError;
pub use frame::Segment;
pub use id::MessageId;
pub use segmenter::{SegmentBatch, Segmenter, split};
pub use sequence::SequenceNumber;
