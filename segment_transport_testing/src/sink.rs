//! Application sink double.

use std::sync::{
    Mutex,
    PoisonError,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use segment_transport::{ApplicationSink, BoxError, Delivery, LossNotification, ReassembledMessage};
use tokio::sync::Notify;

/// Sink that stores every delivery and can be told to fail.
#[derive(Debug, Default)]
pub struct CapturingSink {
    deliveries: Mutex<Vec<Delivery>>,
    failing: AtomicBool,
    delivered: Notify,
}

impl CapturingSink {
    /// Sink that accepts every delivery.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Sink that rejects every delivery while still recording it.
    #[must_use]
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.set_failing(true);
        sink
    }

    /// Toggle delivery failures.
    pub fn set_failing(&self, failing: bool) { self.failing.store(failing, Ordering::SeqCst); }

    /// Every delivery so far, in arrival order.
    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Reassembled messages delivered so far.
    #[must_use]
    pub fn messages(&self) -> Vec<ReassembledMessage> {
        self.deliveries()
            .into_iter()
            .filter_map(|delivery| match delivery {
                Delivery::Message(message) => Some(message),
                Delivery::Lost(_) => None,
            })
            .collect()
    }

    /// Loss notifications delivered so far.
    #[must_use]
    pub fn losses(&self) -> Vec<LossNotification> {
        self.deliveries()
            .into_iter()
            .filter_map(|delivery| match delivery {
                Delivery::Lost(notification) => Some(notification),
                Delivery::Message(_) => None,
            })
            .collect()
    }

    /// Wait until at least `count` deliveries have been recorded.
    pub async fn wait_for(&self, count: usize) {
        loop {
            let notified = self.delivered.notified();
            if self.deliveries.lock().unwrap_or_else(PoisonError::into_inner).len() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl ApplicationSink for CapturingSink {
    async fn deliver(&self, delivery: Delivery) -> Result<(), BoxError> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(delivery);
        self.delivered.notify_waiters();
        if self.failing.load(Ordering::SeqCst) {
            return Err("application unavailable".into());
        }
        Ok(())
    }
}
