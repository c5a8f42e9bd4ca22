//! Test doubles and fixtures shared by the `segment_transport` test suites.
//!
//! ```rust
//! use segment_transport::{Transport, TransportConfig};
//! use segment_transport_testing::{CapturingSink, RecordingCarrier};
//!
//! let transport = Transport::new(
//!     TransportConfig::default(),
//!     RecordingCarrier::new(),
//!     CapturingSink::new(),
//! )
//! .expect("default config is valid");
//! assert!(transport.store().is_empty());
//! ```

mod carrier;
mod latency;
pub mod logging;
mod segments;
mod sink;

pub use carrier::RecordingCarrier;
pub use latency::CapturingLatencySink;
pub use logging::{LoggerHandle, logger};
pub use segments::{at_millis, epoch, segment};
pub use sink::CapturingSink;
