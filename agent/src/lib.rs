//! # Beacon Agent
//!
//! Ships telemetry records in batches.
//!
//! [`Batcher`] accumulates records in a [`beacon_engine::Buffer`] and flushes
//! them when the size threshold is reached or when a periodic driver
//! ([`FlushTicker`]) finds the pending batch older than the time threshold.
//!
//! - With an endpoint configured, each batch is POSTed as a form field
//!   `data` holding the JSON array of records. Delivery runs on a spawned
//!   task; failed batches are put back in front of the pending batch and go
//!   out with the next flush.
//! - Without one, each batch is written to `<output_dir>/<YYYYMMDD_HHmmss>.json`.
//!
//! ```no_run
//! use beacon_agent::{Batcher, Config};
//! use serde_json::json;
//!
//! # async fn run() -> beacon_agent::Result<()> {
//! let config = Config::default().with_endpoint("https://collect.example.com/events");
//! let batcher = Batcher::from_config(&config)?;
//!
//! let data = json!({"level": 3, "score": 1200});
//! batcher.send("level_complete", data.as_object().cloned().unwrap_or_default())?;
//!
//! let undelivered = batcher.shutdown().await?;
//! assert!(undelivered.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod batcher;
pub mod clock;
pub mod config;
pub mod error;
pub mod sink;
pub mod ticker;
pub mod transport;

pub use batcher::{Batcher, FlushReport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ConfigError};
pub use error::{Error, Result};
pub use sink::FileSink;
pub use ticker::FlushTicker;
pub use transport::{HttpTransport, TransportError, PAYLOAD_FIELD};
