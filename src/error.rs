//! Canonical error types for the transport orchestrator.
//!
//! Each layer keeps its own error enum; [`TransportError`] gathers them and
//! adds the collaborator failures seen while dispatching segments or
//! delivering messages. Every variant names the message and sender it
//! concerns.

use thiserror::Error;

use crate::{
    segment::{MessageId, SegmentationError, SequenceNumber},
    store::ReassemblyError,
};

/// Boxed error returned by carriers and application sinks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by [`Transport`](crate::transport::Transport) operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The message could not be segmented.
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] SegmentationError),
    /// The message carried no bytes, so there is nothing to dispatch.
    #[error("message from {username} has an empty payload")]
    EmptyPayload { username: String },
    /// The message needs more segments than the configured limit.
    #[error("message from {username} needs {segments} segments, limit is {limit}")]
    MessageTooLarge {
        username: String,
        segments: u32,
        limit: u32,
    },
    /// The carrier rejected a segment; later segments were not sent.
    #[error(
        "failed to dispatch segment {sequence} of message {message_id} from {username}: {source}"
    )]
    Dispatch {
        message_id: MessageId,
        username: String,
        sequence: SequenceNumber,
        #[source]
        source: BoxError,
    },
    /// The application sink rejected a reassembled message.
    #[error("failed to deliver message {message_id} from {username}: {source}")]
    Sink {
        message_id: MessageId,
        username: String,
        #[source]
        source: BoxError,
    },
    /// The store refused an inbound segment.
    #[error(transparent)]
    Reassembly(#[from] ReassemblyError),
}

/// Result alias used by transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
