//! The telemetry batcher.
//!
//! Wraps the engine [`Buffer`] behind a single mutex and performs the IO the
//! engine leaves out: HTTP delivery on a spawned task, or a synchronous write
//! to the local fallback directory when no endpoint is configured.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use beacon_engine::{
    Batch, Buffer, BufferConfig, BufferStats, CorrelationToken, Delivery, Disposition, Flight,
    FlightId, FlushStart, Record, RecordData, RecordId,
};
use chrono::{DateTime, FixedOffset};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::clock::{device_time, epoch_ms, Clock, SystemClock};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::sink::{FileSink, WriteError};
use crate::transport::HttpTransport;

/// Where flushed batches go.
#[derive(Debug, Clone)]
enum Sink {
    Remote(HttpTransport),
    Local(FileSink),
}

/// Outcome of a flush request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushReport {
    /// Batch handed to a delivery task
    Dispatched { flight: FlightId, records: usize },
    /// Batch written to a local file
    Written { path: PathBuf, records: usize },
    /// A delivery is outstanding; the flush runs once it succeeds
    Deferred,
    /// Nothing was pending
    Empty,
}

struct Inner {
    buffer: Mutex<Buffer>,
    sink: Sink,
    clock: Arc<dyn Clock>,
    runtime: Option<Handle>,
    delivery: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Batches records and ships them.
///
/// Cheap to clone; clones share one buffer. All buffer state sits behind one
/// lock that is never held across an await point.
///
/// Without an endpoint, a flush writes its file synchronously while holding
/// that lock, so callers on a tokio worker block for the duration of the
/// write.
#[derive(Clone)]
pub struct Batcher {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Batcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let buffer = self.inner.lock();
        f.debug_struct("Batcher")
            .field("sink", &self.inner.sink)
            .field("token", buffer.token())
            .field("pending", &buffer.pending_len())
            .field("in_flight", &buffer.in_flight_len())
            .finish()
    }
}

impl Batcher {
    /// Create a batcher with a fresh random correlation token and the system clock.
    pub fn from_config(config: &Config) -> Result<Self> {
        let token = CorrelationToken::new(uuid::Uuid::new_v4().to_string());
        Self::new(config, token, Arc::new(SystemClock))
    }

    /// Create a batcher with an injected token and clock.
    ///
    /// With a remote endpoint this must run inside a tokio runtime, which is
    /// used for delivery tasks.
    pub fn new(config: &Config, token: CorrelationToken, clock: Arc<dyn Clock>) -> Result<Self> {
        let (sink, runtime) = match &config.endpoint {
            Some(endpoint) => {
                let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
                let transport = HttpTransport::new(endpoint.clone(), config.request_timeout)?;
                (Sink::Remote(transport), Some(runtime))
            }
            None => (Sink::Local(FileSink::new(&config.output_dir)), None),
        };

        let buffer = Buffer::new(config.buffer_config(), token, epoch_ms(&clock.now()));

        match &sink {
            Sink::Remote(transport) => tracing::info!(
                token = %buffer.token(),
                endpoint = transport.endpoint(),
                size_threshold = config.size_threshold,
                "Batcher delivering to remote endpoint"
            ),
            Sink::Local(files) => tracing::info!(
                token = %buffer.token(),
                dir = %files.dir().display(),
                size_threshold = config.size_threshold,
                "No endpoint configured, batcher writing to local files"
            ),
        }

        Ok(Self {
            inner: Arc::new(Inner {
                buffer: Mutex::new(buffer),
                sink,
                clock,
                runtime,
                delivery: Mutex::new(None),
            }),
        })
    }

    /// Build a record stamped with the batcher's clock.
    pub fn record(&self, id: impl Into<RecordId>, data: RecordData) -> Record {
        Record::new(id, data, &device_time(&self.inner.clock.now()))
    }

    /// Build and append a record in one call.
    pub fn send(&self, id: impl Into<RecordId>, data: RecordData) -> Result<Option<FlushReport>> {
        self.append(self.record(id, data))
    }

    /// Append a record, flushing when the size threshold is reached.
    ///
    /// Returns the flush report when this append triggered one. A local
    /// write failure during that flush is returned as the error; the record
    /// itself was accepted either way.
    pub fn append(&self, record: Record) -> Result<Option<FlushReport>> {
        let at = self.inner.clock.now();
        let mut buffer = self.inner.lock();

        let trace = tracing::enabled!(tracing::Level::DEBUG).then(|| {
            (
                record.id().to_string(),
                serde_json::Value::Object(record.data().clone()),
            )
        });
        let outcome = match buffer.append(record, &device_time(&at)) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::debug!(error = %e, "Record rejected");
                return Err(e.into());
            }
        };
        if let Some((record_id, fields)) = trace {
            tracing::debug!(
                record_id = record_id.as_str(),
                %fields,
                "Sending telemetry record"
            );
        }

        if outcome.should_flush() {
            return self.flush_locked(&mut buffer, &at).map(Some);
        }
        Ok(None)
    }

    /// Append a record given as JSON (`{"record_id": ..., "record_data": {...}}`).
    pub fn append_json(&self, json: &str) -> Result<Option<FlushReport>> {
        let record: Record = serde_json::from_str(json)?;
        self.append(record)
    }

    /// Flush the pending batch now.
    pub fn flush(&self) -> Result<FlushReport> {
        let at = self.inner.clock.now();
        let mut buffer = self.inner.lock();
        self.flush_locked(&mut buffer, &at)
    }

    /// Flush if the pending batch has waited at least the time threshold.
    pub fn flush_if_due(&self) -> Result<Option<FlushReport>> {
        let at = self.inner.clock.now();
        let mut buffer = self.inner.lock();
        if !buffer.flush_due(epoch_ms(&at)) {
            return Ok(None);
        }
        self.flush_locked(&mut buffer, &at).map(Some)
    }

    fn flush_locked(&self, buffer: &mut Buffer, at: &DateTime<FixedOffset>) -> Result<FlushReport> {
        let flight = match buffer.begin_flush(epoch_ms(at))? {
            FlushStart::Started(flight) => flight,
            FlushStart::Deferred => {
                tracing::debug!(
                    pending = buffer.pending_len(),
                    "Delivery outstanding, flush deferred"
                );
                return Ok(FlushReport::Deferred);
            }
            FlushStart::Empty => return Ok(FlushReport::Empty),
        };

        match &self.inner.sink {
            Sink::Remote(transport) => {
                let report = FlushReport::Dispatched {
                    flight: flight.id,
                    records: flight.records,
                };
                self.dispatch(transport.clone(), flight);
                Ok(report)
            }
            // Blocking write under the buffer lock; errors reach the caller directly
            Sink::Local(files) => match files.write(&flight.payload, at) {
                Ok(path) => {
                    buffer.complete(flight.id, Delivery::Delivered)?;
                    tracing::info!(
                        records = flight.records,
                        path = %path.display(),
                        "Batch written"
                    );
                    tracing::debug!(payload = %flight.payload, "Batch payload");
                    Ok(FlushReport::Written {
                        path,
                        records: flight.records,
                    })
                }
                Err(WriteError { path, source }) => {
                    let batch = buffer.abandon(flight.id)?;
                    tracing::error!(
                        records = batch.len(),
                        path = %path.display(),
                        error = %source,
                        "Failed to write batch"
                    );
                    Err(Error::LocalWrite {
                        path,
                        source,
                        batch,
                    })
                }
            },
        }
    }

    fn dispatch(&self, transport: HttpTransport, flight: Flight) {
        let Some(runtime) = &self.inner.runtime else {
            // Remote sinks are only built with a runtime handle
            return;
        };

        tracing::debug!(
            flight = flight.id,
            records = flight.records,
            "Dispatching batch"
        );
        let handle = runtime.spawn(deliver_flights(self.inner.clone(), transport, flight));

        *self.inner.delivery.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Wait until no delivery is outstanding.
    pub async fn settle(&self) {
        loop {
            let handle = self
                .inner
                .delivery
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take();

            match handle {
                Some(handle) => {
                    if let Err(e) = handle.await {
                        tracing::error!(error = %e, "Delivery task failed");
                    }
                }
                None => break,
            }
        }
    }

    /// Flush what is pending, wait for deliveries, and hand back anything
    /// that could not be delivered.
    pub async fn shutdown(&self) -> Result<Batch> {
        self.settle().await;
        self.flush()?;
        self.settle().await;

        let leftover = self.take_pending();
        if !leftover.is_empty() {
            tracing::warn!(
                records = leftover.len(),
                "Shutting down with undelivered records"
            );
        }
        Ok(leftover)
    }

    /// Remove and return every pending record.
    pub fn take_pending(&self) -> Batch {
        self.inner.lock().take_pending()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending_len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.inner.lock().in_flight_len()
    }

    pub fn is_flushing(&self) -> bool {
        self.inner.lock().is_flushing()
    }

    /// Ids of pending records, in order.
    pub fn pending_ids(&self) -> Vec<String> {
        self.inner
            .lock()
            .pending()
            .ids()
            .into_iter()
            .map(String::from)
            .collect()
    }

    pub fn token(&self) -> CorrelationToken {
        self.inner.lock().token().clone()
    }

    pub fn config(&self) -> BufferConfig {
        *self.inner.lock().config()
    }

    pub fn stats(&self) -> BufferStats {
        *self.inner.lock().stats()
    }

    /// Whether batches go to a remote endpoint rather than local files.
    pub fn is_remote(&self) -> bool {
        matches!(self.inner.sink, Sink::Remote(_))
    }
}

/// Deliver a flight, settle it, and keep going while deferred flushes wait.
async fn deliver_flights(inner: Arc<Inner>, transport: HttpTransport, mut flight: Flight) {
    loop {
        let delivery = match transport.deliver(&flight.payload).await {
            Ok(()) => Delivery::Delivered,
            Err(e) => {
                tracing::warn!(
                    flight = flight.id,
                    records = flight.records,
                    error = %e,
                    "Delivery failed, batch requeued"
                );
                Delivery::Failed
            }
        };

        let at = inner.clock.now();
        let next = {
            let mut buffer = inner.lock();
            match buffer.complete(flight.id, delivery) {
                Ok(settlement) => {
                    if settlement.disposition == Disposition::Delivered {
                        tracing::info!(
                            flight = flight.id,
                            records = settlement.records,
                            "Batch delivered"
                        );
                    }
                    if settlement.flush_again {
                        match buffer.begin_flush(epoch_ms(&at)) {
                            Ok(FlushStart::Started(next)) => Some(next),
                            Ok(_) => None,
                            Err(e) => {
                                tracing::error!(error = %e, "Failed to start deferred flush");
                                None
                            }
                        }
                    } else {
                        None
                    }
                }
                Err(e) => {
                    tracing::error!(flight = flight.id, error = %e, "Failed to settle flight");
                    None
                }
            }
        };

        match next {
            Some(next) => {
                tracing::debug!(
                    flight = next.id,
                    records = next.records,
                    "Dispatching deferred batch"
                );
                flight = next;
            }
            None => break,
        }
    }
}
