use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Trait for providing the current time.
///
/// The query service samples the clock at most once per request so that
/// every timestamp derived for that request agrees.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> SystemTime;
}

/// Clock implementation that returns the real system time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Clock pinned to a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(SystemTime);

impl FixedClock {
    pub fn new(time: SystemTime) -> Self {
        Self(time)
    }

    /// Creates a clock pinned to `secs` seconds after the Unix epoch.
    pub fn from_unix_secs(secs: u64) -> Self {
        Self(UNIX_EPOCH + Duration::from_secs(secs))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> SystemTime {
        self.0
    }
}

/// Seconds since the Unix epoch, negative for times before it.
pub(crate) fn unix_secs(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => saturate(u128::from(d.as_secs())),
        Err(e) => -saturate(u128::from(e.duration().as_secs())),
    }
}

/// Milliseconds since the Unix epoch, negative for times before it.
pub(crate) fn unix_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => saturate(d.as_millis()),
        Err(e) => -saturate(e.duration().as_millis()),
    }
}

fn saturate(value: u128) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Inverse of [`unix_secs`].
pub(crate) fn from_unix_secs(secs: i64) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs as u64)
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
    }
}
