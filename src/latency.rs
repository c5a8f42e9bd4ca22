//! Average per-segment latency of completed messages.
//!
//! [`LatencyRecorder`] reduces the samples returned with a
//! [`CompletedMessage`](crate::store::CompletedMessage) to their arithmetic
//! mean and publishes it through an injected [`LatencySink`]. The sink is a
//! last-write-wins gauge: each completion replaces the previous value.

use std::sync::Arc;

use chrono::TimeDelta;

/// Destination for the latency gauge.
pub trait LatencySink: Send + Sync {
    /// Replace the published value with `seconds`.
    fn publish(&self, seconds: f64);
}

/// [`LatencySink`] backed by the `metrics` gauge
/// [`SEGMENT_LATENCY_SECONDS`](crate::metrics::SEGMENT_LATENCY_SECONDS).
#[derive(Clone, Copy, Debug, Default)]
pub struct MetricsLatencySink;

impl LatencySink for MetricsLatencySink {
    fn publish(&self, seconds: f64) { crate::metrics::set_segment_latency(seconds); }
}

/// Computes and publishes the mean transit time of a message's segments.
#[derive(Clone)]
pub struct LatencyRecorder {
    sink: Arc<dyn LatencySink>,
}

impl LatencyRecorder {
    /// Create a recorder publishing to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn LatencySink>) -> Self { Self { sink } }

    /// Publish the mean of `samples`, returning it.
    ///
    /// Returns `None`, without publishing, when `samples` is empty.
    pub fn record(&self, samples: &[TimeDelta]) -> Option<f64> {
        let mean = mean_seconds(samples)?;
        self.sink.publish(mean);
        Some(mean)
    }
}

impl Default for LatencyRecorder {
    fn default() -> Self { Self::new(Arc::new(MetricsLatencySink)) }
}

impl std::fmt::Debug for LatencyRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyRecorder").finish_non_exhaustive()
    }
}

/// Arithmetic mean of `samples` in seconds, at nanosecond resolution.
///
/// # Examples
///
/// ```
/// use chrono::TimeDelta;
/// use segment_transport::latency::mean_seconds;
/// let samples = [TimeDelta::seconds(1), TimeDelta::seconds(3)];
/// assert_eq!(mean_seconds(&samples), Some(2.0));
/// assert_eq!(mean_seconds(&[]), None);
/// ```
#[must_use]
#[expect(
    clippy::cast_precision_loss,
    reason = "latencies are far below the 2^52 ns where f64 loses precision"
)]
pub fn mean_seconds(samples: &[TimeDelta]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let total: f64 = samples.iter().copied().map(delta_seconds).sum();
    Some(total / samples.len() as f64)
}

#[expect(
    clippy::cast_precision_loss,
    reason = "latencies are far below the 2^52 ns where f64 loses precision"
)]
fn delta_seconds(delta: TimeDelta) -> f64 {
    match delta.num_nanoseconds() {
        Some(nanos) => nanos as f64 / 1e9,
        None => delta.num_milliseconds() as f64 / 1e3,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rstest::rstest;

    use super::*;

    #[derive(Default)]
    struct Capture(Mutex<Vec<f64>>);

    impl LatencySink for Capture {
        fn publish(&self, seconds: f64) {
            self.0.lock().expect("capture poisoned").push(seconds);
        }
    }

    #[rstest]
    #[case(&[100, 200, 300], 0.2)]
    #[case(&[1_500], 1.5)]
    #[case(&[-50, 50], 0.0)]
    fn mean_matches_arithmetic_average(#[case] millis: &[i64], #[case] expected: f64) {
        let samples: Vec<TimeDelta> = millis.iter().copied().map(TimeDelta::milliseconds).collect();
        let mean = mean_seconds(&samples).expect("non-empty samples");
        assert!((mean - expected).abs() < 1e-9, "mean {mean} != {expected}");
    }

    #[test]
    fn recorder_publishes_last_value_only() {
        let capture = Arc::new(Capture::default());
        let recorder = LatencyRecorder::new(capture.clone());

        recorder.record(&[TimeDelta::seconds(1)]);
        recorder.record(&[TimeDelta::seconds(2), TimeDelta::seconds(4)]);

        let published = capture.0.lock().expect("capture poisoned").clone();
        assert_eq!(published, vec![1.0, 3.0]);
    }

    #[test]
    fn recorder_skips_empty_samples() {
        let capture = Arc::new(Capture::default());
        let recorder = LatencyRecorder::new(capture.clone());

        assert_eq!(recorder.record(&[]), None);
        assert!(capture.0.lock().expect("capture poisoned").is_empty());
    }
}
