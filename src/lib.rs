//! Public API for the `segment_transport` library.
//!
//! The crate splits messages into bounded segments, sends them over an
//! unreliable carrier, and reassembles them on the far side regardless of
//! arrival order or duplication. Messages whose segments stop arriving are
//! reported lost by a periodic [`sweeper`].

pub mod carrier;
pub mod config;
pub mod error;
pub mod latency;
pub mod metrics;
pub mod segment;
pub mod sink;
pub mod store;
pub mod sweeper;
pub mod transport;
pub mod wire;

pub use carrier::{
    BackoffConfig,
    Carrier,
    ChannelCarrier,
    SegmentConsumer,
    SegmentReceiver,
    ServeOptions,
    TcpCarrier,
    serve_segments,
};
pub use config::{ConfigError, DEFAULT_MAX_SEGMENTS, TransportConfig};
pub use error::{BoxError, Result, TransportError};
pub use latency::{LatencyRecorder, LatencySink, MetricsLatencySink};
pub use segment::{MessageId, Segment, SegmentBatch, SegmentationError, Segmenter, SequenceNumber};
pub use sink::{ApplicationSink, ChannelSink, Delivery, JsonSink, LoggingSink};
pub use store::{
    CompletedMessage,
    LatencyReference,
    LossNotification,
    LossReason,
    ReassembledMessage,
    ReassemblyError,
    ReassemblyStore,
    UnknownMessagePolicy,
};
pub use sweeper::Sweeper;
pub use transport::Transport;
pub use wire::{ApplicationMessage, WireError};
