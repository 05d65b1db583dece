//! Unified error handling for the agent.

use std::io;
use std::path::PathBuf;

use beacon_engine::Batch;

use crate::config::ConfigError;

/// Agent error type.
///
/// Transport failures never show up here: they are recovered by requeueing
/// the batch and only logged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Engine error: {0}")]
    Engine(#[from] beacon_engine::Error),

    #[error("Invalid record: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Failed to write {} records to {}: {source}", batch.len(), path.display())]
    LocalWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
        /// Records of the batch that could not be stored
        batch: Batch,
    },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("A remote endpoint requires a running tokio runtime")]
    NoRuntime,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for agent operations.
pub type Result<T> = std::result::Result<T, Error>;
