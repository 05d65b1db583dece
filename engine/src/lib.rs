//! # Beacon Engine
//!
//! A deterministic batching core for shipping telemetry records.
//!
//! This crate holds the bookkeeping side of telemetry shipping: records,
//! batches, and the two-slot buffer that decides what is pending, what is in
//! flight, and what goes back for retry when a delivery fails.
//!
//! ## Design Principles
//!
//! - **No IO**: Engine has no knowledge of files, network, or clocks
//! - **Deterministic**: Timestamps are passed in, so the same inputs always
//!   produce the same buffer state
//! - **Lossless**: A record is always pending, in flight, or handed back to
//!   the caller as delivered/abandoned
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! A [`Record`] is an identifier plus a JSON object of fields. Every record is
//! stamped with a [`DeviceTime`] when it is built and carries the buffer's
//! [`CorrelationToken`] before it leaves the buffer.
//!
//! ### Batches
//!
//! A [`Batch`] is an ordered list of records. It serializes to a JSON array,
//! which is the payload format for both network and file delivery.
//!
//! ### Buffer
//!
//! The [`Buffer`] owns exactly one pending batch and at most one in-flight
//! batch, tracked by [`FlushState`]:
//! - [`Buffer::append`] adds a record and reports when the size threshold is hit
//! - [`Buffer::begin_flush`] moves pending into flight and hands out a [`Flight`]
//! - [`Buffer::complete`] settles a flight; failures are prepended back to pending
//!
//! ## Quick Start
//!
//! ```rust
//! use beacon_engine::{
//!     Buffer, BufferConfig, CorrelationToken, Delivery, DeviceTime, FlushStart, Record,
//!     RecordData,
//! };
//!
//! let now = DeviceTime::new("2024/02/01 09:30:00 +00:00", 1706779800000);
//! let mut buffer = Buffer::new(BufferConfig::default(), CorrelationToken::new("run-1"), now.epoch_ms);
//!
//! buffer.append(Record::new("level_start", RecordData::new(), &now), &now).unwrap();
//!
//! let FlushStart::Started(flight) = buffer.begin_flush(now.epoch_ms).unwrap() else {
//!     panic!("expected a flight");
//! };
//! assert_eq!(flight.records, 1);
//! assert!(flight.payload.contains("\"record_id\":\"level_start\""));
//!
//! // The transport failed: the record goes back to pending
//! buffer.complete(flight.id, Delivery::Failed).unwrap();
//! assert_eq!(buffer.pending_len(), 1);
//! ```

pub mod batch;
pub mod buffer;
pub mod clock;
pub mod error;
pub mod record;
pub mod token;

// Re-export main types at crate root
pub use batch::Batch;
pub use buffer::{
    Append, Buffer, BufferConfig, BufferStats, Delivery, Disposition, Flight, FlushStart,
    FlushState, Settlement, DEFAULT_SIZE_THRESHOLD, DEFAULT_TIME_THRESHOLD_MS,
};
pub use clock::DeviceTime;
pub use error::Error;
pub use record::{
    Record, RecordData, DEVICE_TIME_KEY, DEVICE_TIME_MS_KEY, GUID_TOKEN_KEY, RESERVED_KEYS,
};
pub use token::CorrelationToken;

/// Type aliases for clarity
pub type RecordId = String;
pub type FlightId = u64;
pub type Timestamp = u64;
