//! Errors surfaced by the reassembly store.

use thiserror::Error;

use crate::segment::MessageId;

/// Errors produced by [`ReassemblyStore`](crate::store::ReassemblyStore).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ReassemblyError {
    /// No record exists for the segment's message and the store does not
    /// create records lazily.
    #[error("segment for unknown message {message_id} from {username}")]
    UnknownMessage {
        message_id: MessageId,
        username: String,
    },
    /// The segment disagrees with the record about the message length.
    #[error(
        "segment total mismatch for message {message_id} from {username}: expected {expected}, \
         found {found}"
    )]
    TotalMismatch {
        message_id: MessageId,
        username: String,
        expected: u32,
        found: u32,
    },
    /// The message claims more segments than the store will buffer.
    #[error(
        "message {message_id} from {username} claims {total_segments} segments, limit is {limit}"
    )]
    SegmentLimitExceeded {
        message_id: MessageId,
        username: String,
        total_segments: u32,
        limit: u32,
    },
    /// A record cannot be registered for a message without segments.
    #[error("message {message_id} from {username} cannot be registered with zero segments")]
    ZeroSegments {
        message_id: MessageId,
        username: String,
    },
}

impl ReassemblyError {
    /// Identifier of the message the error refers to.
    #[must_use]
    pub fn message_id(&self) -> MessageId {
        match self {
            Self::UnknownMessage { message_id, .. }
            | Self::TotalMismatch { message_id, .. }
            | Self::SegmentLimitExceeded { message_id, .. }
            | Self::ZeroSegments { message_id, .. } => *message_id,
        }
    }

    /// Whether the error only signals a late or foreign segment.
    #[must_use]
    pub fn is_unknown_message(&self) -> bool { matches!(self, Self::UnknownMessage { .. }) }
}
