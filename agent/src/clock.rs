//! Wall clock access.
//!
//! Everything time-related the agent writes (record stamps, fallback file
//! names, flush countdowns) is read through a [`Clock`], so tests can pin it.

use std::sync::Mutex;

use beacon_engine::{DeviceTime, Timestamp};
use chrono::{DateTime, FixedOffset, Local};

/// `yyyy/MM/dd HH:mm:ss zzz`, e.g. `2024/02/01 09:30:00 +01:00`.
pub const DEVICE_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S %:z";

/// `YYYYMMDD_HHmmss`, used for fallback file names.
pub const FILE_STEM_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Source of the current local time.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// The system clock in the local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Milliseconds since epoch. Instants before 1970 clamp to zero.
pub fn epoch_ms(at: &DateTime<FixedOffset>) -> Timestamp {
    u64::try_from(at.timestamp_millis()).unwrap_or(0)
}

/// Sample an instant in the form records are stamped with.
pub fn device_time(at: &DateTime<FixedOffset>) -> DeviceTime {
    DeviceTime::new(at.format(DEVICE_TIME_FORMAT).to_string(), epoch_ms(at))
}

/// File stem of the fallback file written at `at`.
pub fn file_stem(at: &DateTime<FixedOffset>) -> String {
    at.format(FILE_STEM_FORMAT).to_string()
}
