//! Buffer - the two-slot batching state machine.
//!
//! The Buffer holds the pending batch being accumulated and, while a delivery
//! is outstanding, the in-flight batch. It decides when a flush is due and
//! reconciles state once the caller reports how a delivery went.

use crate::{
    error::Result, Batch, CorrelationToken, DeviceTime, Error, FlightId, Record, Timestamp,
};
use serde::{Deserialize, Serialize};

/// Default number of pending records that triggers a flush.
pub const DEFAULT_SIZE_THRESHOLD: usize = 5;

/// Default maximum age of a pending batch, in milliseconds.
pub const DEFAULT_TIME_THRESHOLD_MS: u64 = 30_000;

/// Flush thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferConfig {
    /// Pending records needed before an append triggers a flush
    pub size_threshold: usize,
    /// Time a pending batch may wait before a periodic driver should flush it
    pub time_threshold_ms: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            size_threshold: DEFAULT_SIZE_THRESHOLD,
            time_threshold_ms: DEFAULT_TIME_THRESHOLD_MS,
        }
    }
}

impl BufferConfig {
    pub fn new(size_threshold: usize, time_threshold_ms: u64) -> Self {
        Self {
            size_threshold,
            time_threshold_ms,
        }
    }

    pub fn with_size_threshold(mut self, size_threshold: usize) -> Self {
        self.size_threshold = size_threshold;
        self
    }

    pub fn with_time_threshold_ms(mut self, time_threshold_ms: u64) -> Self {
        self.time_threshold_ms = time_threshold_ms;
        self
    }

    /// A threshold of zero behaves like one: every append flushes.
    fn effective_size_threshold(&self) -> usize {
        self.size_threshold.max(1)
    }
}

/// Whether a delivery is outstanding.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FlushState {
    /// Nothing in flight
    #[default]
    Idle,
    /// One batch handed out for delivery
    Flushing { flight: FlightId, batch: Batch },
}

/// A batch handed out for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flight {
    /// Identifies the flight when reporting its outcome
    pub id: FlightId,
    /// JSON array payload
    pub payload: String,
    /// Number of records in the payload
    pub records: usize,
}

/// Result of an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Append {
    /// Record stored, threshold not reached
    Buffered { pending: usize },
    /// Record stored and the pending batch reached the size threshold
    ThresholdReached { pending: usize },
}

impl Append {
    pub fn should_flush(&self) -> bool {
        matches!(self, Append::ThresholdReached { .. })
    }
}

/// Result of asking for a flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushStart {
    /// Pending moved into flight
    Started(Flight),
    /// A flight is already outstanding; the request runs after it succeeds
    Deferred,
    /// Nothing pending
    Empty,
}

/// Outcome of a delivery attempt, as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Failed,
}

/// What happened to an in-flight batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Released as delivered
    Delivered,
    /// Prepended back into pending
    Requeued,
}

/// Summary of a completed flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub flight: FlightId,
    pub records: usize,
    pub disposition: Disposition,
    /// A deferred flush is waiting and pending is non-empty
    pub flush_again: bool,
}

/// Running counters, in records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferStats {
    pub appended: u64,
    pub delivered: u64,
    pub requeued: u64,
    pub abandoned: u64,
    pub flights: u64,
}

/// The batching buffer.
#[derive(Debug, Clone)]
pub struct Buffer {
    /// Flush thresholds
    config: BufferConfig,
    /// Attached to every record before it leaves
    token: CorrelationToken,
    /// Records accumulated since the last flush
    pending: Batch,
    /// In-flight slot
    state: FlushState,
    /// Next flight identifier
    next_flight: FlightId,
    /// A flush was requested while a flight was outstanding
    flush_deferred: bool,
    /// When the countdown last reset (milliseconds since epoch)
    last_flush_at: Timestamp,
    stats: BufferStats,
}

impl Buffer {
    /// Create an empty buffer. `now` starts the flush countdown.
    pub fn new(config: BufferConfig, token: CorrelationToken, now: Timestamp) -> Self {
        Self {
            config,
            token,
            pending: Batch::new(),
            state: FlushState::Idle,
            next_flight: 1,
            flush_deferred: false,
            last_flush_at: now,
            stats: BufferStats::default(),
        }
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    pub fn token(&self) -> &CorrelationToken {
        &self.token
    }

    pub fn state(&self) -> &FlushState {
        &self.state
    }

    pub fn stats(&self) -> &BufferStats {
        &self.stats
    }

    /// Add a record to the pending batch.
    ///
    /// Records without an id are rejected. The correlation token is attached
    /// and missing time stamps are filled from `now`.
    pub fn append(&mut self, mut record: Record, now: &DeviceTime) -> Result<Append> {
        record.validate()?;
        record.stamp_if_absent(now);
        record.attach_token(&self.token);

        self.pending.push(record);
        self.stats.appended += 1;

        let pending = self.pending.len();
        if pending >= self.config.effective_size_threshold() {
            Ok(Append::ThresholdReached { pending })
        } else {
            Ok(Append::Buffered { pending })
        }
    }

    /// Move the pending batch into flight.
    ///
    /// Only one flight may be outstanding. A request made while one is in
    /// flight is remembered and reported through [`Settlement::flush_again`].
    pub fn begin_flush(&mut self, now: Timestamp) -> Result<FlushStart> {
        if self.is_flushing() {
            self.flush_deferred = true;
            return Ok(FlushStart::Deferred);
        }

        self.last_flush_at = now;
        if self.pending.is_empty() {
            return Ok(FlushStart::Empty);
        }

        let payload = self.pending.to_json()?;
        let batch = self.pending.take();
        let records = batch.len();

        let id = self.next_flight;
        self.next_flight += 1;
        self.stats.flights += 1;
        self.state = FlushState::Flushing { flight: id, batch };

        Ok(FlushStart::Started(Flight {
            id,
            payload,
            records,
        }))
    }

    /// Settle an outstanding flight.
    ///
    /// Delivered batches are released. Failed batches are prepended to
    /// pending so they go out first on the next flush, and any deferred
    /// request is dropped so a failing endpoint is not retried in a loop.
    pub fn complete(&mut self, flight: FlightId, delivery: Delivery) -> Result<Settlement> {
        let batch = self.take_flight(flight)?;
        let records = batch.len();

        let disposition = match delivery {
            Delivery::Delivered => {
                self.stats.delivered += records as u64;
                Disposition::Delivered
            }
            Delivery::Failed => {
                self.stats.requeued += records as u64;
                self.pending.prepend(batch);
                Disposition::Requeued
            }
        };

        let flush_again = std::mem::take(&mut self.flush_deferred)
            && disposition == Disposition::Delivered
            && !self.pending.is_empty();

        Ok(Settlement {
            flight,
            records,
            disposition,
            flush_again,
        })
    }

    /// Release an outstanding flight without delivering or retrying it.
    ///
    /// Used when a batch cannot be stored at all. The records are returned so
    /// the caller can report them.
    pub fn abandon(&mut self, flight: FlightId) -> Result<Batch> {
        let batch = self.take_flight(flight)?;
        self.stats.abandoned += batch.len() as u64;
        self.flush_deferred = false;
        Ok(batch)
    }

    fn take_flight(&mut self, flight: FlightId) -> Result<Batch> {
        match std::mem::take(&mut self.state) {
            FlushState::Flushing { flight: current, batch } if current == flight => Ok(batch),
            FlushState::Flushing { flight: current, batch } => {
                self.state = FlushState::Flushing {
                    flight: current,
                    batch,
                };
                Err(Error::UnknownFlight {
                    expected: Some(current),
                    got: flight,
                })
            }
            FlushState::Idle => Err(Error::UnknownFlight {
                expected: None,
                got: flight,
            }),
        }
    }

    /// Check if the pending batch has waited at least the time threshold.
    pub fn flush_due(&self, now: Timestamp) -> bool {
        !self.pending.is_empty()
            && now.saturating_sub(self.last_flush_at) >= self.config.time_threshold_ms
    }

    /// Milliseconds left before [`Buffer::flush_due`] turns true.
    pub fn time_until_due(&self, now: Timestamp) -> u64 {
        let elapsed = now.saturating_sub(self.last_flush_at);
        self.config.time_threshold_ms.saturating_sub(elapsed)
    }

    /// Get the pending batch.
    pub fn pending(&self) -> &Batch {
        &self.pending
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Remove and return the pending batch without flushing it.
    pub fn take_pending(&mut self) -> Batch {
        self.pending.take()
    }

    /// Get the in-flight batch, if any.
    pub fn in_flight(&self) -> Option<&Batch> {
        match &self.state {
            FlushState::Flushing { batch, .. } => Some(batch),
            FlushState::Idle => None,
        }
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight().map_or(0, Batch::len)
    }

    pub fn is_flushing(&self) -> bool {
        matches!(self.state, FlushState::Flushing { .. })
    }

    /// Whether a flush request is waiting on the current flight.
    pub fn flush_deferred(&self) -> bool {
        self.flush_deferred
    }
}
