use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Tasker epoch: Saturday, January 1, 2022 00:00:00 UTC+8
/// (Friday, December 31, 2021 16:00:00 UTC).
pub const TASKER_EPOCH: Duration = Duration::from_millis(1_640_966_400_000);

/// A trait for time sources that return a millisecond timestamp.
///
/// This abstraction allows you to plug in the system clock or a mocked time
/// source in tests. The value is expected to be **milliseconds** relative to a
/// configurable origin.
///
/// # Example
///
/// ```
/// use tasker::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_millis(&self) -> u64 {
///         1234
///     }
/// }
///
/// let time = FixedTime;
/// assert_eq!(time.current_millis(), 1234);
/// ```
pub trait TimeSource {
    /// Returns the current time in milliseconds since the configured epoch.
    fn current_millis(&self) -> u64;
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn current_millis(&self) -> u64 {
        (**self).current_millis()
    }
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn current_millis(&self) -> u64 {
        (**self).current_millis()
    }
}

/// A wall-clock time source offset from a fixed epoch.
///
/// Every call reads `SystemTime::now()`. If the system clock is set before the
/// epoch the reading saturates at zero. Regressions of the wall clock are
/// absorbed by the generators, which never move their stored timestamp
/// backwards.
#[derive(Clone, Copy, Debug)]
pub struct WallClock {
    epoch: Duration,
}

impl Default for WallClock {
    /// Constructs a wall clock aligned to [`TASKER_EPOCH`].
    fn default() -> Self {
        Self::with_epoch(TASKER_EPOCH)
    }
}

impl WallClock {
    /// Constructs a wall clock using `epoch` (a [`Duration`] since
    /// 1970-01-01 UTC) as the zero-point for all timestamps.
    pub const fn with_epoch(epoch: Duration) -> Self {
        Self { epoch }
    }

    pub const fn epoch(&self) -> Duration {
        self.epoch
    }
}

impl TimeSource for WallClock {
    fn current_millis(&self) -> u64 {
        let since_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        let millis = since_unix.saturating_sub(self.epoch).as_millis();
        u64::try_from(millis).unwrap_or(u64::MAX)
    }
}
