//! Latency sink that keeps every published value.

use std::sync::{Mutex, PoisonError};

use segment_transport::LatencySink;

/// [`LatencySink`] capturing published averages for assertions.
#[derive(Debug, Default)]
pub struct CapturingLatencySink {
    values: Mutex<Vec<f64>>,
}

impl CapturingLatencySink {
    /// Every value published so far.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Most recently published value, as a last-write-wins gauge would hold.
    #[must_use]
    pub fn last(&self) -> Option<f64> { self.values().last().copied() }
}

impl LatencySink for CapturingLatencySink {
    fn publish(&self, seconds: f64) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(seconds);
    }
}
