//! Publish/subscribe style carrier built on a bounded channel.

use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use tokio::{select, sync::mpsc};
use tokio_util::sync::CancellationToken;

use super::{Carrier, SegmentReceiver, receive_record};
use crate::{error::BoxError, segment::Segment, wire};

/// Carrier that publishes encoded segment records to an in-process log.
///
/// Records are consumed asynchronously by the paired [`SegmentConsumer`],
/// so `send` returns as soon as the record is queued.
#[derive(Clone, Debug)]
pub struct ChannelCarrier {
    tx: mpsc::Sender<Bytes>,
}

impl ChannelCarrier {
    /// Create a carrier and the consumer draining it.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, SegmentConsumer) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, SegmentConsumer { rx })
    }
}

#[async_trait]
impl Carrier for ChannelCarrier {
    async fn send(&self, segment: Segment) -> Result<(), BoxError> {
        let record = wire::encode_segment(&segment)?;
        self.tx
            .send(Bytes::from(record))
            .await
            .map_err(|_| "segment log closed".into())
    }
}

/// Reader that decodes published records and hands them to a receiver.
#[derive(Debug)]
pub struct SegmentConsumer {
    rx: mpsc::Receiver<Bytes>,
}

impl SegmentConsumer {
    /// Drain records into `receiver` until every carrier is dropped or
    /// `shutdown` is cancelled.
    ///
    /// Undecodable records and receive failures are logged and skipped.
    /// Returns the number of records that were handled successfully.
    pub async fn run<R>(mut self, receiver: &R, shutdown: CancellationToken) -> usize
    where
        R: SegmentReceiver + ?Sized,
    {
        let mut handled = 0;
        loop {
            let record = select! {
                biased;

                () = shutdown.cancelled() => break,
                record = self.rx.recv() => record,
            };
            let Some(record) = record else {
                debug!("segment log closed, consumer stopping");
                break;
            };
            if receive_record(receiver, &record).await.is_ok() {
                handled += 1;
            }
        }
        handled
    }
}
