//! Configuration management for the agent.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use beacon_engine::{BufferConfig, DEFAULT_SIZE_THRESHOLD, DEFAULT_TIME_THRESHOLD_MS};

/// Agent configuration, usually loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Remote collector URI; `None` selects the local file sink
    pub endpoint: Option<String>,
    /// Directory for local fallback files
    pub output_dir: PathBuf,
    /// Pending records that trigger an automatic flush
    pub size_threshold: usize,
    /// Maximum age of a pending batch before the ticker flushes it
    pub flush_interval: Duration,
    /// How often the ticker checks the pending batch
    pub tick: Duration,
    /// Timeout for a single delivery request
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: None,
            output_dir: PathBuf::from("."),
            size_threshold: DEFAULT_SIZE_THRESHOLD,
            flush_interval: Duration::from_millis(DEFAULT_TIME_THRESHOLD_MS),
            tick: Duration::from_secs(1),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let endpoint = lookup("BEACON_ENDPOINT")
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());

        let output_dir = lookup("BEACON_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.output_dir);

        let size_threshold: usize =
            parse_var(&lookup, "BEACON_BATCH_SIZE")?.unwrap_or(defaults.size_threshold);
        if size_threshold == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }

        let flush_interval = parse_var(&lookup, "BEACON_FLUSH_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.flush_interval);

        let tick = parse_var(&lookup, "BEACON_TICK_MILLIS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.tick);
        if tick.is_zero() {
            return Err(ConfigError::ZeroTick);
        }

        let request_timeout = parse_var(&lookup, "BEACON_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        Ok(Self {
            endpoint,
            output_dir,
            size_threshold,
            flush_interval,
            tick,
            request_timeout,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_size_threshold(mut self, size_threshold: usize) -> Self {
        self.size_threshold = size_threshold;
        self
    }

    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Thresholds handed to the engine buffer.
    pub fn buffer_config(&self) -> BufferConfig {
        BufferConfig::new(
            self.size_threshold,
            u64::try_from(self.flush_interval.as_millis()).unwrap_or(u64::MAX),
        )
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid {var} value: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("BEACON_BATCH_SIZE must be at least 1")]
    ZeroBatchSize,

    #[error("BEACON_TICK_MILLIS must be at least 1")]
    ZeroTick,
}
