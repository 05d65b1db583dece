//! Telemetry records.

use crate::{error::Result, CorrelationToken, DeviceTime, Error, RecordId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key holding the run's correlation token.
pub const GUID_TOKEN_KEY: &str = "guid_token";
/// Key holding the human-readable device time.
pub const DEVICE_TIME_KEY: &str = "device_time";
/// Key holding milliseconds since epoch, as a string.
pub const DEVICE_TIME_MS_KEY: &str = "device_time_ms";

/// Keys owned by the engine. Callers cannot set them through [`Record::insert`].
pub const RESERVED_KEYS: [&str; 3] = [GUID_TOKEN_KEY, DEVICE_TIME_KEY, DEVICE_TIME_MS_KEY];

/// Field map of a record.
pub type RecordData = serde_json::Map<String, Value>;

/// One telemetry event.
///
/// Serialized shape:
/// `{"record_id": "...", "record_data": {..., "guid_token": "...", "device_time": "...", "device_time_ms": "..."}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    record_id: RecordId,
    #[serde(default)]
    record_data: RecordData,
}

impl Record {
    /// Create a record stamped with the given device time.
    ///
    /// Any `device_time` / `device_time_ms` values already present in `data`
    /// are replaced by the stamp.
    pub fn new(id: impl Into<RecordId>, data: RecordData, now: &DeviceTime) -> Self {
        let mut record = Self {
            record_id: id.into(),
            record_data: data,
        };
        record.stamp(now);
        record
    }

    /// The record identifier.
    pub fn id(&self) -> &str {
        &self.record_id
    }

    /// All fields, including the engine-owned ones.
    pub fn data(&self) -> &RecordData {
        &self.record_data
    }

    /// Get a single field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.record_data.get(key)
    }

    /// Set a field. Reserved keys are rejected so stamps stay immutable.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<Option<Value>> {
        let key = key.into();
        if RESERVED_KEYS.contains(&key.as_str()) {
            return Err(Error::ReservedKey(key));
        }
        Ok(self.record_data.insert(key, value.into()))
    }

    /// Builder form of [`Record::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<Self> {
        self.insert(key, value)?;
        Ok(self)
    }

    pub fn device_time(&self) -> Option<&str> {
        self.record_data.get(DEVICE_TIME_KEY).and_then(Value::as_str)
    }

    /// The epoch stamp, parsed back from its string form.
    pub fn device_time_ms(&self) -> Option<Timestamp> {
        self.record_data
            .get(DEVICE_TIME_MS_KEY)
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }

    pub fn token(&self) -> Option<&str> {
        self.record_data.get(GUID_TOKEN_KEY).and_then(Value::as_str)
    }

    /// Check if both time stamps are present.
    pub fn is_stamped(&self) -> bool {
        self.record_data.contains_key(DEVICE_TIME_KEY)
            && self.record_data.contains_key(DEVICE_TIME_MS_KEY)
    }

    /// Reject records that cannot be attributed downstream.
    pub fn validate(&self) -> Result<()> {
        if self.record_id.is_empty() {
            return Err(Error::MalformedRecord("missing record_id".into()));
        }
        Ok(())
    }

    fn stamp(&mut self, now: &DeviceTime) {
        self.record_data
            .insert(DEVICE_TIME_KEY.into(), Value::String(now.display.clone()));
        self.record_data
            .insert(DEVICE_TIME_MS_KEY.into(), Value::String(now.epoch_ms_string()));
    }

    /// Stamp records that arrived without time fields (e.g. deserialized ones).
    /// Existing stamps are never touched.
    pub(crate) fn stamp_if_absent(&mut self, now: &DeviceTime) {
        self.record_data
            .entry(DEVICE_TIME_KEY)
            .or_insert_with(|| Value::String(now.display.clone()));
        self.record_data
            .entry(DEVICE_TIME_MS_KEY)
            .or_insert_with(|| Value::String(now.epoch_ms_string()));
    }

    /// Attach the run token. The buffer's token always wins.
    pub(crate) fn attach_token(&mut self, token: &CorrelationToken) {
        self.record_data
            .insert(GUID_TOKEN_KEY.into(), Value::String(token.as_str().to_string()));
    }
}
