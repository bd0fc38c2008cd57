//! Sliding window counter implementation.

use parking_lot::RwLock;
use std::time::Duration;
use tokio::time::Instant;

/// Default length of the trailing window.
pub const DEFAULT_WINDOW_LENGTH: Duration = Duration::from_secs(60);
/// Default rotation granularity.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Timing parameters shared by every counter of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSettings {
    /// Length of the trailing window
    pub length: Duration,
    /// How often the rotation task wakes up
    pub tick: Duration,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            length: DEFAULT_WINDOW_LENGTH,
            tick: DEFAULT_TICK_INTERVAL,
        }
    }
}

/// One fixed bucket of events.
#[derive(Debug, Clone, Copy)]
struct Window {
    count: u64,
    created_at: Instant,
}

impl Window {
    fn empty(created_at: Instant) -> Self {
        Self {
            count: 0,
            created_at,
        }
    }
}

#[derive(Debug)]
struct Windows {
    current: Window,
    previous: Window,
    expired: bool,
}

/// An approximate "events in the trailing window" counter for a single key.
///
/// Two adjacent fixed buckets are kept. The previous bucket contributes to
/// the estimate with a weight that decays linearly from 1 to 0 over the
/// current bucket's lifetime, so memory stays constant per key and the limit
/// slides instead of resetting at the boundary.
///
/// All state sits behind one lock; rotation, increments and reads are
/// linearized by it.
pub struct SlidingWindowCounter {
    windows: RwLock<Windows>,
    length: Duration,
}

impl SlidingWindowCounter {
    /// Create a counter whose current window starts now.
    pub fn new(length: Duration) -> Self {
        let now = Instant::now();
        let previous_start = now.checked_sub(length).unwrap_or(now);

        Self {
            windows: RwLock::new(Windows {
                current: Window::empty(now),
                previous: Window::empty(previous_start),
                expired: false,
            }),
            length,
        }
    }

    /// Record one event in the current window.
    pub fn increment(&self) {
        self.windows.write().current.count += 1;
    }

    /// Check whether the estimated event count is strictly above `limit`.
    pub fn is_limit_exceeded(&self, limit: u64) -> bool {
        self.estimate_at(Instant::now()) > limit
    }

    /// Whether both windows are empty.
    pub fn is_idle(&self) -> bool {
        let windows = self.windows.read();
        windows.current.count == 0 && windows.previous.count == 0
    }

    /// Whether this counter has expired. An expired counter is never
    /// registered again; its rotation task has ended.
    pub fn is_expired(&self) -> bool {
        self.windows.read().expired
    }

    /// Events in the current window.
    pub fn count(&self) -> u64 {
        self.windows.read().current.count
    }

    /// Events in the previous window.
    pub fn previous_count(&self) -> u64 {
        self.windows.read().previous.count
    }

    /// Estimated events in the trailing window as of `now`, rounded half
    /// away from zero.
    fn estimate_at(&self, now: Instant) -> u64 {
        let windows = self.windows.read();
        let elapsed = now.saturating_duration_since(windows.current.created_at);
        let weight = (1.0 - elapsed.as_secs_f64() / self.length.as_secs_f64()).max(0.0);

        (windows.current.count as f64 + weight * windows.previous.count as f64).round() as u64
    }

    /// Retire the current window if a full window length has passed.
    ///
    /// Returns `true` if a rotation happened.
    pub(crate) fn rotate_if_due(&self, now: Instant) -> bool {
        let mut windows = self.windows.write();
        if windows.expired || now.saturating_duration_since(windows.current.created_at) < self.length {
            return false;
        }

        windows.previous = windows.current;
        windows.current = Window::empty(now);
        true
    }

    /// Mark the counter expired if it is still idle.
    ///
    /// The idleness check and the transition happen under the same write
    /// lock, so an increment racing with expiry either lands first (and the
    /// expiry is refused) or is never applied to this counter.
    pub(crate) fn try_expire(&self) -> bool {
        let mut windows = self.windows.write();
        if windows.expired {
            return false;
        }
        if windows.current.count != 0 || windows.previous.count != 0 {
            return false;
        }

        windows.expired = true;
        true
    }

    #[cfg(test)]
    fn from_parts(length: Duration, current: u64, previous: u64, created_at: Instant) -> Self {
        Self {
            windows: RwLock::new(Windows {
                current: Window {
                    count: current,
                    created_at,
                },
                previous: Window {
                    count: previous,
                    created_at: created_at.checked_sub(length).unwrap_or(created_at),
                },
                expired: false,
            }),
            length,
        }
    }
}

impl std::fmt::Debug for SlidingWindowCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let windows = self.windows.read();
        f.debug_struct("SlidingWindowCounter")
            .field("current", &windows.current.count)
            .field("previous", &windows.previous.count)
            .field("expired", &windows.expired)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: u64 = 10;

    fn exceeded_after(current: u64, previous: u64, elapsed_ms: u64) -> bool {
        let start = Instant::now();
        let counter = SlidingWindowCounter::from_parts(DEFAULT_WINDOW_LENGTH, current, previous, start);
        counter.estimate_at(start + Duration::from_millis(elapsed_ms)) > LIMIT
    }

    #[test]
    fn test_window_settings_default() {
        let settings = WindowSettings::default();
        assert_eq!(settings.length, Duration::from_millis(60_000));
        assert_eq!(settings.tick, Duration::from_millis(1_000));
    }

    #[test]
    fn test_increment_is_monotonic() {
        let counter = SlidingWindowCounter::new(DEFAULT_WINDOW_LENGTH);
        for _ in 0..25 {
            counter.increment();
        }

        assert_eq!(counter.count(), 25);
        assert_eq!(counter.previous_count(), 0);
    }

    #[test]
    fn test_increment_leaves_previous_window_alone() {
        let counter = SlidingWindowCounter::from_parts(DEFAULT_WINDOW_LENGTH, 9, 9, Instant::now());
        counter.increment();

        assert_eq!(counter.count(), 10);
        assert_eq!(counter.previous_count(), 9);
    }

    #[test]
    fn test_limit_is_strictly_greater() {
        let counter = SlidingWindowCounter::new(DEFAULT_WINDOW_LENGTH);
        for _ in 0..10 {
            counter.increment();
        }
        assert!(!counter.is_limit_exceeded(LIMIT));

        counter.increment();
        assert!(counter.is_limit_exceeded(LIMIT));
    }

    #[test]
    fn test_previous_window_full_weight_at_start() {
        assert!(!exceeded_after(0, 10, 0));
        assert!(exceeded_after(1, 10, 0));
    }

    #[test]
    fn test_previous_window_weight_after_six_seconds() {
        // weight 0.9: 9.9 rounds to 10, 10.9 rounds to 11
        assert!(!exceeded_after(0, 11, 6_000));
        assert!(exceeded_after(1, 11, 6_000));
    }

    #[test]
    fn test_previous_window_weight_near_end() {
        assert!(!exceeded_after(0, 100, 54_000));
        assert!(exceeded_after(1, 100, 54_000));
        assert!(!exceeded_after(9, 100, 59_999));
    }

    #[test]
    fn test_previous_window_ignored_after_full_length() {
        assert!(!exceeded_after(10, 1_000_000, 60_000));
        assert!(!exceeded_after(10, 1_000_000, 90_000));
    }

    #[test]
    fn test_rotation_moves_current_to_previous() {
        let start = Instant::now();
        let counter = SlidingWindowCounter::from_parts(DEFAULT_WINDOW_LENGTH, 3, 2, start);

        assert!(!counter.rotate_if_due(start + Duration::from_millis(59_999)));
        assert_eq!(counter.count(), 3);

        assert!(counter.rotate_if_due(start + DEFAULT_WINDOW_LENGTH));
        assert_eq!(counter.count(), 0);
        assert_eq!(counter.previous_count(), 3);
    }

    #[test]
    fn test_idle_requires_both_windows_empty() {
        let start = Instant::now();
        let counter = SlidingWindowCounter::from_parts(DEFAULT_WINDOW_LENGTH, 1, 0, start);
        assert!(!counter.is_idle());

        counter.rotate_if_due(start + DEFAULT_WINDOW_LENGTH);
        assert!(!counter.is_idle());

        counter.rotate_if_due(start + DEFAULT_WINDOW_LENGTH * 2);
        assert!(counter.is_idle());
    }

    #[test]
    fn test_expire_only_once_and_only_when_idle() {
        let counter = SlidingWindowCounter::new(DEFAULT_WINDOW_LENGTH);
        counter.increment();
        assert!(!counter.try_expire());
        assert!(!counter.is_expired());

        let idle = SlidingWindowCounter::new(DEFAULT_WINDOW_LENGTH);
        assert!(idle.try_expire());
        assert!(idle.is_expired());
        assert!(!idle.try_expire());
    }

    #[test]
    fn test_expired_counter_does_not_rotate() {
        let start = Instant::now();
        let counter = SlidingWindowCounter::from_parts(DEFAULT_WINDOW_LENGTH, 0, 0, start);
        assert!(counter.try_expire());
        assert!(!counter.rotate_if_due(start + DEFAULT_WINDOW_LENGTH * 3));
    }
}
