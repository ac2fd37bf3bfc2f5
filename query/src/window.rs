//! Range query time window normalization.
//!
//! Range queries arrive as `end`/`range`/`step` in whole seconds. Before
//! evaluation the window is normalized so that:
//!
//! - `end == 0` means "now", read from the injected clock;
//! - `step` is at least one second;
//! - the window never reaches before the Unix epoch;
//! - `end` sits on a multiple of `step`, so repeated queries with the same
//!   step sample the same grid regardless of when "now" was read.

use std::time::{Duration, SystemTime};

use crate::clock::{Clock, from_unix_secs, unix_secs};

/// Raw range query parameters, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeParams {
    /// Window end; `0` selects the current time.
    pub end: i64,
    /// Window length.
    pub range: i64,
    /// Resolution.
    pub step: i64,
}

impl RangeParams {
    pub fn new(end: i64, range: i64, step: i64) -> Self {
        Self { end, range, step }
    }
}

/// A normalized evaluation window, in seconds.
///
/// Invariants: `step >= 1`, `0 <= range <= end`, `end % step == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    end: i64,
    range: i64,
    step: i64,
}

impl TimeWindow {
    /// Normalizes raw parameters. The clock is read only when `end == 0`.
    pub fn normalize(params: RangeParams, clock: &dyn Clock) -> Self {
        let mut end = params.end;
        if end == 0 {
            end = unix_secs(clock.now());
        }
        let end = end.max(0);

        let step = params.step.max(1);

        let mut range = params.range.max(0);
        if end.saturating_sub(range) < 0 {
            range = end;
        }

        // Align to the step grid.
        let end = end - end.rem_euclid(step);

        // Alignment can pull `end` below a range that was clamped to the
        // unaligned end.
        let range = range.min(end);

        Self { end, range, step }
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn range(&self) -> i64 {
        self.range
    }

    pub fn step(&self) -> i64 {
        self.step
    }

    pub fn start(&self) -> i64 {
        self.end - self.range
    }

    pub fn start_time(&self) -> SystemTime {
        from_unix_secs(self.start())
    }

    pub fn end_time(&self) -> SystemTime {
        from_unix_secs(self.end)
    }

    pub fn step_duration(&self) -> Duration {
        Duration::from_secs(self.step as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use rstest::rstest;

    const NOW: u64 = 1_700_000_123;

    fn normalize(end: i64, range: i64, step: i64) -> TimeWindow {
        TimeWindow::normalize(
            RangeParams::new(end, range, step),
            &FixedClock::from_unix_secs(NOW),
        )
    }

    #[test]
    fn should_keep_already_aligned_window() {
        // given/when
        let window = normalize(1000, 500, 10);

        // then
        assert_eq!(window.start(), 500);
        assert_eq!(window.end(), 1000);
        assert_eq!(window.step(), 10);
    }

    #[test]
    fn should_clamp_range_then_align_end() {
        // given: 1005 - 2000 < 0, and 1005 % 100 == 5
        let window = normalize(1005, 2000, 100);

        // then
        assert_eq!(window.end(), 1000);
        assert_eq!(window.range(), 1000);
        assert_eq!(window.start(), 0);
    }

    #[test]
    fn should_use_clock_when_end_is_zero() {
        // given/when
        let window = normalize(0, 60, 1);

        // then
        assert_eq!(window.end(), NOW as i64);
        assert_eq!(window.start(), NOW as i64 - 60);
    }

    #[test]
    fn should_align_clock_time_to_step() {
        let window = normalize(0, 3600, 60);
        assert_eq!(window.end(), 1_700_000_100);
        assert_eq!(window.range(), 3600);
    }

    #[rstest]
    #[case(0)]
    #[case(-1)]
    #[case(-3600)]
    #[case(i64::MIN)]
    fn should_clamp_step_to_one(#[case] step: i64) {
        let window = normalize(1005, 100, step);
        assert_eq!(window.step(), 1);
        assert_eq!(window.end(), 1005);
    }

    #[test]
    fn should_clamp_negative_range_to_zero() {
        let window = normalize(1000, -50, 10);
        assert_eq!(window.range(), 0);
        assert_eq!(window.start(), 1000);
    }

    #[test]
    fn should_clamp_negative_end_to_epoch() {
        let window = normalize(-500, 100, 10);
        assert_eq!(window.end(), 0);
        assert_eq!(window.range(), 0);
    }

    #[test]
    fn should_convert_to_system_times() {
        let window = normalize(1000, 500, 10);
        assert_eq!(window.start_time(), from_unix_secs(500));
        assert_eq!(window.end_time(), from_unix_secs(1000));
        assert_eq!(window.step_duration(), Duration::from_secs(10));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn step_is_never_below_one(
                end in 1i64..=i64::MAX / 2,
                range in any::<i64>(),
                step in i64::MIN..1,
            ) {
                prop_assert_eq!(normalize(end, range, step).step(), 1);
            }

            #[test]
            fn end_is_aligned_to_step(
                end in 0i64..=i64::MAX / 2,
                range in any::<i64>(),
                step in any::<i64>(),
            ) {
                let window = normalize(end, range, step);
                prop_assert_eq!(window.end() % window.step(), 0);
                prop_assert!(window.end() <= end.max(NOW as i64));
            }

            #[test]
            fn window_never_starts_before_epoch(
                end in any::<i64>(),
                range in any::<i64>(),
                step in any::<i64>(),
            ) {
                let window = normalize(end, range, step);
                prop_assert!(window.start() >= 0);
                prop_assert!(window.range() >= 0);
                prop_assert!(window.range() <= window.end());
            }

            #[test]
            fn oversized_range_is_clamped_to_end(
                end in 1i64..=1_000_000_000,
                excess in 1i64..=1_000_000_000,
            ) {
                let window = normalize(end, end + excess, 1);
                prop_assert_eq!(window.range(), end);
                prop_assert_eq!(window.start(), 0);
            }
        }
    }
}
