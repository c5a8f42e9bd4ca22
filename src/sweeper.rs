//! Periodic eviction of stalled reassembly records.
//!
//! [`Sweeper`] is the single writer of timeout evictions. Every
//! `scan_period` it asks the [`ReassemblyStore`] to drop records idle for
//! `stale_after` and reports each one to the application as lost. The store
//! hands evicted records back by value, so the sink is called without any
//! store lock held.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use log::warn;
use tokio::{
    select,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;

use crate::{
    sink::{ApplicationSink, Delivery},
    store::{LossNotification, ReassemblyStore},
};

/// Background task that reports stalled messages as lost.
pub struct Sweeper<A> {
    store: Arc<ReassemblyStore>,
    sink: Arc<A>,
    scan_period: Duration,
    stale_after: Duration,
}

impl<A> std::fmt::Debug for Sweeper<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sweeper")
            .field("scan_period", &self.scan_period)
            .field("stale_after", &self.stale_after)
            .finish_non_exhaustive()
    }
}

impl<A: ApplicationSink> Sweeper<A> {
    /// Create a sweeper over `store` reporting losses to `sink`.
    #[must_use]
    pub fn new(
        store: Arc<ReassemblyStore>,
        sink: Arc<A>,
        scan_period: Duration,
        stale_after: Duration,
    ) -> Self {
        Self {
            store,
            sink,
            scan_period,
            stale_after,
        }
    }

    /// Interval between two sweeps.
    #[must_use]
    pub const fn scan_period(&self) -> Duration { self.scan_period }

    /// Idle time after which a record is evicted.
    #[must_use]
    pub const fn stale_after(&self) -> Duration { self.stale_after }

    /// Sweep every `scan_period` until `shutdown` is cancelled.
    ///
    /// The first sweep happens one period after the call. A sweep already
    /// delivering notifications finishes before the loop observes
    /// cancellation.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.scan_period, self.scan_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                biased;

                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep_at(Utc::now()).await;
                }
            }
        }
    }

    /// Run one sweep as of `now`, returning the notifications produced.
    ///
    /// Sink failures are logged; the record stays evicted either way.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Vec<LossNotification> {
        let evicted = self.store.sweep_stale(self.stale_after, now);
        let mut notifications = Vec::with_capacity(evicted.len());

        for record in evicted {
            warn!(
                "segment timeout, message lost: message_id={}, username={}, received={}/{}",
                record.message_id, record.username, record.received, record.total_segments,
            );
            crate::metrics::inc_lost();
            let notification = record.into_notification();
            if let Err(e) = self.sink.deliver(Delivery::Lost(notification.clone())).await {
                warn!(
                    "failed to report lost message: message_id={}, username={}, error={e}",
                    notification.message_id, notification.username,
                );
            }
            notifications.push(notification);
        }

        notifications
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use chrono::TimeDelta;
    use rstest::{fixture, rstest};
    use tokio::time::timeout;

    use super::*;
    use crate::{
        segment::{MessageId, Segment, SequenceNumber},
        sink::ChannelSink,
        store::{LatencyReference, UnknownMessagePolicy},
    };

    const SCAN_PERIOD: Duration = Duration::from_millis(20);

    #[fixture]
    fn store() -> Arc<ReassemblyStore> {
        Arc::new(ReassemblyStore::new(
            UnknownMessagePolicy::Reject,
            LatencyReference::FirstSentAt,
        ))
    }

    fn register(store: &ReassemblyStore, id: MessageId, registered_at: DateTime<Utc>) {
        store
            .begin_or_touch(id, "alice", 2, registered_at, registered_at)
            .expect("register record");
    }

    #[rstest]
    #[tokio::test]
    async fn sweep_reports_each_stale_record_once(store: Arc<ReassemblyStore>) {
        let (sink, mut rx) = ChannelSink::new(8);
        let sweeper = Sweeper::new(store.clone(), Arc::new(sink), SCAN_PERIOD, SCAN_PERIOD * 3);
        let start = Utc::now();
        let stale = MessageId::generate();
        let fresh = MessageId::generate();
        register(&store, stale, start);
        register(&store, fresh, start + TimeDelta::milliseconds(50));

        let later = start + TimeDelta::milliseconds(61);
        let notifications = sweeper.sweep_at(later).await;

        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].message_id, stale);
        let delivery = rx.try_recv().expect("loss delivered");
        assert!(delivery.is_lost());
        assert_eq!(delivery.message_id(), stale);
        assert!(store.contains(&fresh));

        assert!(sweeper.sweep_at(later).await.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[rstest]
    #[tokio::test]
    async fn sink_failure_does_not_resurrect_record(store: Arc<ReassemblyStore>) {
        let (sink, rx) = ChannelSink::new(1);
        drop(rx);
        let sweeper = Sweeper::new(store.clone(), Arc::new(sink), SCAN_PERIOD, SCAN_PERIOD * 3);
        let id = MessageId::generate();
        let start = Utc::now();
        register(&store, id, start);

        let notifications = sweeper.sweep_at(start + TimeDelta::seconds(1)).await;
        assert_eq!(notifications.len(), 1);
        assert!(!store.contains(&id));
    }

    #[rstest]
    #[tokio::test]
    async fn running_sweeper_evicts_and_stops_on_cancel(store: Arc<ReassemblyStore>) {
        let (sink, mut rx) = ChannelSink::new(8);
        let sweeper = Sweeper::new(store.clone(), Arc::new(sink), SCAN_PERIOD, SCAN_PERIOD * 3);
        let id = MessageId::generate();
        let long_ago = Utc::now() - TimeDelta::seconds(10);
        register(&store, id, long_ago);
        let segment = Segment::new(
            id,
            "alice",
            SequenceNumber::first(),
            2,
            long_ago,
            Bytes::from_static(b"a"),
        )
        .expect("valid position");
        store
            .accept_segment_at(segment, long_ago)
            .expect("accept first");

        let token = CancellationToken::new();
        let task = tokio::spawn(sweeper.run(token.clone()));

        let delivery = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("sweeper should report the loss")
            .expect("channel open");
        assert_eq!(delivery.message_id(), id);
        assert!(store.is_empty());

        token.cancel();
        timeout(Duration::from_secs(1), task)
            .await
            .expect("sweeper should stop promptly")
            .expect("sweeper task panicked");
    }
}
