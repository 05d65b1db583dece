//! Ordered batches of records.
//!
//! A batch is the unit of delivery. Its JSON form (an array of records) is
//! the payload posted to the remote endpoint and written to fallback files,
//! so record order is preserved end to end.

use crate::{error::Result, Error, Record};
use serde::{Deserialize, Serialize};

/// An ordered group of records flushed together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Batch {
    records: Vec<Record>,
}

impl Batch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a record at the end.
    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Put an earlier batch in front of this one, keeping both orders.
    pub fn prepend(&mut self, mut earlier: Batch) {
        earlier.records.append(&mut self.records);
        self.records = earlier.records;
    }

    /// Move every record out, leaving this batch empty.
    pub fn take(&mut self) -> Batch {
        std::mem::take(self)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Record ids in batch order.
    pub fn ids(&self) -> Vec<&str> {
        self.records.iter().map(Record::id).collect()
    }

    /// Serialize to the JSON array payload.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Parse a JSON array payload.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidBatch(e.to_string()))
    }
}

impl From<Vec<Record>> for Batch {
    fn from(records: Vec<Record>) -> Self {
        Self { records }
    }
}

impl FromIterator<Record> for Batch {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl Extend<Record> for Batch {
    fn extend<I: IntoIterator<Item = Record>>(&mut self, iter: I) {
        self.records.extend(iter);
    }
}

impl IntoIterator for Batch {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
