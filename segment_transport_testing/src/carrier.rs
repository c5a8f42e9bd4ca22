//! Carrier double that records outbound segments.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use segment_transport::{BoxError, Carrier, Segment};

/// Carrier that keeps every segment it is asked to send.
///
/// Optionally fails when asked to send a given sequence number, which lets
/// tests observe partial dispatch.
#[derive(Debug, Default)]
pub struct RecordingCarrier {
    sent: Mutex<Vec<Segment>>,
    fail_at: Option<u32>,
}

impl RecordingCarrier {
    /// Carrier that accepts every segment.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Carrier that rejects the segment numbered `sequence`.
    #[must_use]
    pub fn failing_at(sequence: u32) -> Self {
        Self {
            sent: Mutex::default(),
            fail_at: Some(sequence),
        }
    }

    /// Segments accepted so far, in send order.
    #[must_use]
    pub fn sent(&self) -> Vec<Segment> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Remove and return the segments accepted so far.
    pub fn take(&self) -> Vec<Segment> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[async_trait]
impl Carrier for RecordingCarrier {
    async fn send(&self, segment: Segment) -> Result<(), BoxError> {
        if self.fail_at == Some(segment.sequence_number().get()) {
            return Err(format!("refusing segment {}", segment.sequence_number()).into());
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(segment);
        Ok(())
    }
}
