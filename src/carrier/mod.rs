//! Lower-layer carriers that move segments between processes.
//!
//! The engine only needs "send one segment" ([`Carrier`]) and "receive one
//! segment, possibly out of order, possibly duplicated"
//! ([`SegmentReceiver`]). Two carrier shapes are provided:
//!
//! - [`ChannelCarrier`] publishes encoded records to a log-like channel that a
//!   [`SegmentConsumer`] drains asynchronously.
//! - [`TcpCarrier`] sends each segment as a request over a length-delimited
//!   TCP stream served by [`serve_segments`], which answers every request.

mod backoff;
mod channel;
mod tcp;

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};

pub use self::{
    backoff::BackoffConfig,
    channel::{ChannelCarrier, SegmentConsumer},
    tcp::{ServeOptions, TcpCarrier, serve_segments},
};
use crate::{
    error::{BoxError, TransportError},
    segment::Segment,
    wire,
};

/// Outbound half of a lower-layer channel.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Carrier: Send + Sync {
    /// Send one segment.
    async fn send(&self, segment: Segment) -> Result<(), BoxError>;
}

#[async_trait]
impl<C: Carrier + ?Sized> Carrier for Arc<C> {
    async fn send(&self, segment: Segment) -> Result<(), BoxError> { (**self).send(segment).await }
}

/// Inbound entry point carriers hand decoded segments to.
#[async_trait]
pub trait SegmentReceiver: Send + Sync {
    /// Fold one inbound segment into the reassembly engine.
    async fn receive_segment(&self, segment: Segment) -> Result<(), TransportError>;
}

#[async_trait]
impl<R: SegmentReceiver + ?Sized> SegmentReceiver for Arc<R> {
    async fn receive_segment(&self, segment: Segment) -> Result<(), TransportError> {
        (**self).receive_segment(segment).await
    }
}

/// Decode one wire record and hand it to `receiver`.
///
/// Failures are logged and returned so request/response carriers can answer
/// with them; log-style consumers simply move on to the next record.
async fn receive_record<R>(receiver: &R, record: &[u8]) -> Result<(), BoxError>
where
    R: SegmentReceiver + ?Sized,
{
    let segment = match wire::decode_segment(record) {
        Ok(segment) => segment,
        Err(e) => {
            warn!("dropping undecodable segment record: error={e}");
            return Err(e.into());
        }
    };
    debug!(
        "received segment from carrier: message_id={}, username={}, sequence={}/{}",
        segment.message_id(),
        segment.username(),
        segment.sequence_number(),
        segment.total_segments(),
    );
    receiver.receive_segment(segment).await.map_err(|e| {
        warn!("error handling segment: error={e}");
        e.into()
    })
}
