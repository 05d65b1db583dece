//! Device time stamped onto records.
//!
//! The engine never reads a clock itself. Callers sample the wall clock once
//! and hand the result in, which keeps every buffer transition reproducible.

use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// A single sample of the device clock.
///
/// Holds both renderings the wire format needs, taken from the same instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceTime {
    /// Local time rendered as `yyyy/MM/dd HH:mm:ss zzz`
    pub display: String,
    /// Milliseconds since the Unix epoch
    pub epoch_ms: Timestamp,
}

impl DeviceTime {
    /// Create a sample from its two renderings.
    pub fn new(display: impl Into<String>, epoch_ms: Timestamp) -> Self {
        Self {
            display: display.into(),
            epoch_ms,
        }
    }

    /// The epoch rendering as it appears in `device_time_ms`.
    pub fn epoch_ms_string(&self) -> String {
        self.epoch_ms.to_string()
    }

    /// Milliseconds elapsed since an earlier timestamp.
    /// Saturates at zero if the clock went backwards.
    pub fn millis_since(&self, earlier: Timestamp) -> u64 {
        self.epoch_ms.saturating_sub(earlier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_rendering() {
        let t = DeviceTime::new("2024/02/01 09:30:00 +00:00", 1706779800123);
        assert_eq!(t.epoch_ms_string(), "1706779800123");
    }

    #[test]
    fn millis_since_saturates() {
        let t = DeviceTime::new("x", 1_000);
        assert_eq!(t.millis_since(400), 600);
        assert_eq!(t.millis_since(5_000), 0);
    }
}
