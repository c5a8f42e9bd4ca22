//! Transport configuration.
//!
//! [`TransportConfig`] gathers the tunables of the reassembly engine and is
//! validated once at startup, so invalid sizes fail fast instead of on the
//! first message.

use std::{num::NonZeroUsize, time::Duration};

use thiserror::Error;

pub use crate::store::DEFAULT_MAX_SEGMENTS;
use crate::{
    segment::Segmenter,
    store::{LatencyReference, UnknownMessagePolicy},
};

/// Segment payload size used when none is configured, in bytes.
pub const DEFAULT_SEGMENT_SIZE: usize = 300;
/// Sweep interval used when none is configured.
pub const DEFAULT_SCAN_PERIOD: Duration = Duration::from_secs(1);
/// Number of scan periods a record may stay idle before it is reported lost.
pub const DEFAULT_STALE_MULTIPLIER: u32 = 3;

/// Errors raised by [`TransportConfig::validate`].
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Segments must carry at least one byte.
    #[error("segment size must be positive")]
    ZeroSegmentSize,
    /// The sweeper cannot tick with a zero interval.
    #[error("scan period must be positive")]
    ZeroScanPeriod,
    /// Records would be evicted the moment they are created.
    #[error("stale multiplier must be positive")]
    ZeroStaleMultiplier,
    /// No message could ever be sent or reassembled.
    #[error("segment limit must be positive")]
    ZeroMaxSegments,
    /// `scan_period * stale_multiplier` does not fit in a `Duration`.
    #[error("stale threshold overflows")]
    StaleThresholdOverflow,
}

/// Tunables of the reassembly engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportConfig {
    /// Maximum payload bytes per segment.
    pub segment_size: usize,
    /// Interval between two sweeps.
    pub scan_period: Duration,
    /// Idle scan periods after which a record is evicted.
    pub stale_multiplier: u32,
    /// Largest number of segments a single message may span. Bounds the
    /// slots allocated for a record created from a foreign segment.
    pub max_segments: u32,
    /// Treatment of segments for unregistered messages.
    pub unknown_message_policy: UnknownMessagePolicy,
    /// Reference point for latency samples.
    pub latency_reference: LatencyReference,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            scan_period: DEFAULT_SCAN_PERIOD,
            stale_multiplier: DEFAULT_STALE_MULTIPLIER,
            max_segments: DEFAULT_MAX_SEGMENTS,
            unknown_message_policy: UnknownMessagePolicy::default(),
            latency_reference: LatencyReference::default(),
        }
    }
}

impl TransportConfig {
    /// Check every tunable, returning the first violation.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.segment_size == 0 {
            return Err(ConfigError::ZeroSegmentSize);
        }
        if self.scan_period.is_zero() {
            return Err(ConfigError::ZeroScanPeriod);
        }
        if self.stale_multiplier == 0 {
            return Err(ConfigError::ZeroStaleMultiplier);
        }
        if self.max_segments == 0 {
            return Err(ConfigError::ZeroMaxSegments);
        }
        self.scan_period
            .checked_mul(self.stale_multiplier)
            .ok_or(ConfigError::StaleThresholdOverflow)?;
        Ok(())
    }

    /// Idle time after which a record is considered stale.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use segment_transport::config::TransportConfig;
    ///
    /// let config = TransportConfig::default();
    /// assert_eq!(config.stale_after(), Duration::from_secs(3));
    /// ```
    #[must_use]
    pub fn stale_after(&self) -> Duration {
        self.scan_period.saturating_mul(self.stale_multiplier)
    }

    /// Build the segmenter for the configured size.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroSegmentSize`] when the size is zero.
    pub fn segmenter(&self) -> Result<Segmenter, ConfigError> {
        NonZeroUsize::new(self.segment_size)
            .map(Segmenter::with_size)
            .ok_or(ConfigError::ZeroSegmentSize)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = TransportConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.segment_size, 300);
        assert_eq!(config.unknown_message_policy, UnknownMessagePolicy::Reject);
    }

    #[rstest]
    #[case::segment_size(TransportConfig { segment_size: 0, ..TransportConfig::default() }, ConfigError::ZeroSegmentSize)]
    #[case::scan_period(TransportConfig { scan_period: Duration::ZERO, ..TransportConfig::default() }, ConfigError::ZeroScanPeriod)]
    #[case::multiplier(TransportConfig { stale_multiplier: 0, ..TransportConfig::default() }, ConfigError::ZeroStaleMultiplier)]
    #[case::max_segments(TransportConfig { max_segments: 0, ..TransportConfig::default() }, ConfigError::ZeroMaxSegments)]
    #[case::overflow(TransportConfig { scan_period: Duration::MAX, ..TransportConfig::default() }, ConfigError::StaleThresholdOverflow)]
    fn invalid_configs_are_rejected(#[case] config: TransportConfig, #[case] expected: ConfigError) {
        assert_eq!(config.validate(), Err(expected));
    }

    #[test]
    fn stale_threshold_scales_with_scan_period() {
        let config = TransportConfig {
            scan_period: Duration::from_millis(250),
            stale_multiplier: 4,
            ..TransportConfig::default()
        };
        assert_eq!(config.stale_after(), Duration::from_secs(1));
    }
}
