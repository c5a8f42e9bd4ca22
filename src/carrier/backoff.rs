//! Retry timing for [`serve_segments`](super::serve_segments).

use std::time::Duration;

const FLOOR: Duration = Duration::from_millis(1);

/// Exponential delays applied after failed `accept()` calls.
///
/// A successful accept resets the delay to `initial_delay`. Each failure
/// doubles it up to `max_delay`. Defaults are 10 ms and 1 s.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Wait after the first failure in a row.
    pub initial_delay: Duration,
    /// Upper bound on any single wait.
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl BackoffConfig {
    /// Raise both bounds to at least 1 ms and order them.
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use segment_transport::carrier::BackoffConfig;
    ///
    /// let swapped = BackoffConfig {
    ///     initial_delay: Duration::from_millis(400),
    ///     max_delay: Duration::from_millis(50),
    /// }
    /// .normalized();
    /// assert_eq!(swapped.initial_delay, Duration::from_millis(50));
    /// assert_eq!(swapped.max_delay, Duration::from_millis(400));
    /// ```
    #[must_use]
    pub fn normalized(self) -> Self {
        let a = self.initial_delay.max(FLOOR);
        let b = self.max_delay.max(FLOOR);
        Self {
            initial_delay: a.min(b),
            max_delay: a.max(b),
        }
    }

    /// Wait to use after a failure that followed a wait of `current`.
    #[must_use]
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Duration::from_millis(10), Duration::from_millis(20))]
    #[case(Duration::from_millis(600), Duration::from_secs(1))]
    #[case(Duration::from_secs(1), Duration::from_secs(1))]
    fn delay_doubles_up_to_the_cap(#[case] current: Duration, #[case] expected: Duration) {
        assert_eq!(BackoffConfig::default().next_delay(current), expected);
    }

    #[test]
    fn zero_delays_are_raised_to_one_millisecond() {
        let cfg = BackoffConfig {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
        .normalized();
        assert_eq!(cfg.initial_delay, Duration::from_millis(1));
        assert_eq!(cfg.max_delay, Duration::from_millis(1));
    }

    #[test]
    fn inverted_bounds_are_swapped() {
        let cfg = BackoffConfig {
            initial_delay: Duration::from_millis(400),
            max_delay: Duration::from_millis(50),
        }
        .normalized();
        assert_eq!(cfg.initial_delay, Duration::from_millis(50));
        assert_eq!(cfg.max_delay, Duration::from_millis(400));
        assert_eq!(cfg.next_delay(cfg.max_delay), cfg.max_delay);
    }
}
