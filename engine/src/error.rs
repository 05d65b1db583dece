//! Error types for the Beacon engine.

use crate::FlightId;
use thiserror::Error;

/// All possible errors from the Beacon engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Record errors
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("reserved key cannot be set: {0}")]
    ReservedKey(String),

    // Payload errors
    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("invalid batch: {0}")]
    InvalidBatch(String),

    // State errors
    #[error("unknown flight {got} (in flight: {})", fmt_flight(.expected))]
    UnknownFlight {
        expected: Option<FlightId>,
        got: FlightId,
    },
}

fn fmt_flight(flight: &Option<FlightId>) -> String {
    match flight {
        Some(id) => id.to_string(),
        None => "none".to_string(),
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
