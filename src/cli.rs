//! Command line interface for the `segment_transport` binary.
//!
//! Every option can also be supplied through the environment so the binary
//! can be configured the same way inside a container.

use std::net::SocketAddr;

use clap::{Parser, ValueEnum};

/// How segments of messages this node never sent are treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Senders register each message; stray segments are dropped.
    #[default]
    SenderTracked,
    /// Records are created from the first segment seen. Use this on nodes
    /// that only receive from a remote peer.
    ReceiverOnly,
}

/// Command line arguments for the `segment_transport` binary.
#[derive(Debug, Parser)]
#[command(
    name = "segment_transport",
    version,
    about = "Segment stdin messages and reassemble them on the receiving side"
)]
pub struct Cli {
    /// Address the segment listener binds to.
    #[arg(long, env = "SEGMENT_LISTEN", default_value = "127.0.0.1:7070")]
    pub listen: SocketAddr,

    /// Peer to send segments to. Without it segments loop back in-process.
    #[arg(long, env = "SEGMENT_PEER")]
    pub peer: Option<SocketAddr>,

    /// Handling of segments for unregistered messages.
    #[arg(long, env = "SEGMENT_MODE", value_enum, default_value_t = Mode::SenderTracked)]
    pub mode: Mode,

    /// Maximum payload bytes per segment.
    #[arg(long, env = "SEGMENT_SIZE", default_value_t = 300)]
    pub segment_size: usize,

    /// Largest segment count accepted for one message, inbound or outbound.
    #[arg(long, env = "SEGMENT_MAX_SEGMENTS", default_value_t = 65536)]
    pub max_segments: u32,

    /// Interval between stale-record sweeps, in milliseconds.
    #[arg(long, env = "SEGMENT_SCAN_PERIOD_MS", default_value_t = 1000)]
    pub scan_period_ms: u64,

    /// Application service that receives deliveries as length-delimited JSON
    /// records. Without it deliveries are only logged.
    #[arg(long, env = "SEGMENT_APP_ADDR")]
    pub app_addr: Option<SocketAddr>,

    /// Address of the Prometheus scrape endpoint.
    #[arg(long, env = "SEGMENT_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}
