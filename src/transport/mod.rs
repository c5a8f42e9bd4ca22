//! Orchestrator tying segmentation, reassembly and delivery together.
//!
//! A [`Transport`] owns the [`ReassemblyStore`] and shares it with its
//! [`Sweeper`]. Outbound messages are segmented and handed to a [`Carrier`]
//! in sequence order; inbound segments are folded into the store and
//! completed messages are forwarded to an [`ApplicationSink`].

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::{
    carrier::{Carrier, SegmentReceiver},
    config::{ConfigError, TransportConfig},
    error::{Result, TransportError},
    latency::{LatencyRecorder, LatencySink},
    segment::{MessageId, Segment, Segmenter},
    sink::{ApplicationSink, Delivery},
    store::{ReassemblyError, ReassemblyStore},
    sweeper::Sweeper,
};

/// Segment transport over carrier `C` delivering to sink `A`.
pub struct Transport<C, A> {
    store: Arc<ReassemblyStore>,
    segmenter: Segmenter,
    carrier: C,
    sink: Arc<A>,
    latency: LatencyRecorder,
    config: TransportConfig,
}

impl<C, A> std::fmt::Debug for Transport<C, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("config", &self.config)
            .field("in_flight", &self.store.len())
            .finish_non_exhaustive()
    }
}

impl<C, A> Transport<C, A>
where
    C: Carrier,
    A: ApplicationSink,
{
    /// Build a transport from a validated `config`.
    ///
    /// Latency averages go to the `metrics` gauge; use
    /// [`with_latency_sink`](Self::with_latency_sink) to redirect them.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` fails validation.
    pub fn new(config: TransportConfig, carrier: C, sink: A) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store: Arc::new(
                ReassemblyStore::new(config.unknown_message_policy, config.latency_reference)
                    .with_max_segments(config.max_segments),
            ),
            segmenter: config.segmenter()?,
            carrier,
            sink: Arc::new(sink),
            latency: LatencyRecorder::default(),
            config,
        })
    }

    /// Publish latency averages to `sink` instead of the metrics gauge.
    #[must_use]
    pub fn with_latency_sink(mut self, sink: Arc<dyn LatencySink>) -> Self {
        self.latency = LatencyRecorder::new(sink);
        self
    }

    /// Configuration this transport was built from.
    #[must_use]
    pub const fn config(&self) -> &TransportConfig { &self.config }

    /// Shared reassembly store.
    #[must_use]
    pub fn store(&self) -> &Arc<ReassemblyStore> { &self.store }

    /// Carrier used for outbound segments.
    #[must_use]
    pub const fn carrier(&self) -> &C { &self.carrier }

    /// Segment `payload` and dispatch every segment in order.
    ///
    /// When the store rejects unknown messages the record is registered
    /// before the first segment leaves, so a fast loopback cannot outrun it.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::EmptyPayload`] for an empty payload,
    /// [`TransportError::MessageTooLarge`] when the payload needs more than
    /// `max_segments` segments, and [`TransportError::Dispatch`] when the
    /// carrier fails. Segments sent
    /// before the failure are not recalled; the remaining ones are skipped.
    pub async fn send_message(
        &self,
        username: &str,
        payload: impl Into<Bytes>,
        sent_at: DateTime<Utc>,
    ) -> Result<MessageId> {
        let payload = payload.into();
        if payload.is_empty() {
            return Err(TransportError::EmptyPayload {
                username: username.to_owned(),
            });
        }
        let batch = self.segmenter.segment(username, payload, sent_at)?;
        let message_id = batch.message_id();
        if batch.total_segments() > self.config.max_segments {
            return Err(TransportError::MessageTooLarge {
                username: username.to_owned(),
                segments: batch.total_segments(),
                limit: self.config.max_segments,
            });
        }

        if self.store.unknown_policy().requires_registration() {
            self.store.begin_or_touch(
                message_id,
                username,
                batch.total_segments(),
                sent_at,
                Utc::now(),
            )?;
        }

        debug!(
            "dispatching message: message_id={message_id}, username={username}, segments={}",
            batch.total_segments(),
        );
        for segment in batch {
            let sequence = segment.sequence_number();
            if let Err(source) = self.carrier.send(segment).await {
                crate::metrics::inc_dispatch_errors();
                warn!(
                    "segment dispatch failed: message_id={message_id}, username={username}, \
                     sequence={sequence}, error={source}"
                );
                return Err(TransportError::Dispatch {
                    message_id,
                    username: username.to_owned(),
                    sequence,
                    source,
                });
            }
        }
        Ok(message_id)
    }

    /// Fold one inbound segment into the store.
    ///
    /// Segments for unknown messages, including late segments of a message
    /// already reported lost, are logged and dropped. So are segments that
    /// claim more than `max_segments` segments.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Reassembly`] when the segment contradicts
    /// its record, and [`TransportError::Sink`] when the completed message
    /// could not be delivered. The record is gone in the latter case.
    pub async fn receive_segment(&self, segment: Segment) -> Result<()> {
        crate::metrics::inc_segments_received();
        let completed = match self.store.accept_segment(segment) {
            Ok(Some(completed)) => completed,
            Ok(None) => return Ok(()),
            Err(ReassemblyError::UnknownMessage {
                message_id,
                username,
            }) => {
                crate::metrics::inc_unknown_segments();
                warn!(
                    "segment for unknown message dropped: message_id={message_id}, \
                     username={username}"
                );
                return Ok(());
            }
            Err(ReassemblyError::SegmentLimitExceeded {
                message_id,
                username,
                total_segments,
                limit,
            }) => {
                crate::metrics::inc_rejected_segments();
                warn!(
                    "oversized message dropped: message_id={message_id}, username={username}, \
                     total_segments={total_segments}, limit={limit}"
                );
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let message = completed.message;
        let average = self.latency.record(&completed.latencies);
        crate::metrics::inc_completed();
        info!(
            "message reassembled: message_id={}, username={}, bytes={}, latency_avg_s={}",
            message.message_id(),
            message.username(),
            message.payload().len(),
            average.unwrap_or_default(),
        );

        let message_id = message.message_id();
        let username = message.username().to_owned();
        self.sink
            .deliver(Delivery::Message(message))
            .await
            .map_err(|source| TransportError::Sink {
                message_id,
                username,
                source,
            })
    }

    /// Sweeper sharing this transport's store and sink.
    #[must_use]
    pub fn sweeper(&self) -> Sweeper<A> {
        Sweeper::new(
            Arc::clone(&self.store),
            Arc::clone(&self.sink),
            self.config.scan_period,
            self.config.stale_after(),
        )
    }

    /// Run the sweeper until `shutdown` is cancelled.
    pub async fn run_sweeper(&self, shutdown: CancellationToken) { self.sweeper().run(shutdown).await; }
}

#[async_trait]
impl<C, A> SegmentReceiver for Transport<C, A>
where
    C: Carrier,
    A: ApplicationSink,
{
    async fn receive_segment(&self, segment: Segment) -> Result<()> {
        Transport::receive_segment(self, segment).await
    }
}

#[cfg(test)]
mod tests;
