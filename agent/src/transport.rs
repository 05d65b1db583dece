//! HTTP delivery of batch payloads.

use std::time::Duration;

use reqwest::{Client, StatusCode};

use crate::error::{Error, Result};

/// Name of the form field carrying the JSON payload.
pub const PAYLOAD_FIELD: &str = "data";

/// A delivery attempt that did not reach the collector.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("collector responded with {0}")]
    Status(StatusCode),
}

/// Posts batch payloads to a remote collector.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    /// Create a transport for an endpoint.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST the payload as `data=<payload>`, form-url-encoded.
    ///
    /// Any non-2xx status counts as a failed delivery.
    pub async fn deliver(&self, payload: &str) -> std::result::Result<(), TransportError> {
        // `form` sets Content-Type: application/x-www-form-urlencoded
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[(PAYLOAD_FIELD, payload)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status));
        }

        Ok(())
    }
}
