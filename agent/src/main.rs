//! Beacon Agent - ships newline-delimited JSON telemetry records from stdin.
//!
//! Each input line is one record: `{"record_id": "...", "record_data": {...}}`.
//! Batches go to `BEACON_ENDPOINT` when set, otherwise to files under
//! `BEACON_OUTPUT_DIR`.

use beacon_agent::{Batcher, Config, FlushTicker};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing; stdout is left to the records
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beacon_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let batcher = Batcher::from_config(&config)?;
    let ticker = FlushTicker::spawn(batcher.clone(), config.tick);

    tracing::info!(
        flush_interval_secs = config.flush_interval.as_secs(),
        "Reading records from stdin"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).split(b'\n');
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            line = lines.next_segment() => match line {
                Ok(Some(bytes)) => match String::from_utf8(bytes) {
                    Ok(line) => ingest(&batcher, &line),
                    Err(e) => tracing::warn!(error = %e, "Skipping line that is not UTF-8"),
                },
                Ok(None) => break,
                Err(e) => {
                    // Pending records still go through shutdown below
                    tracing::error!(error = %e, "Failed to read stdin");
                    break;
                }
            },
            _ = &mut interrupted => {
                tracing::info!("Interrupted, flushing remaining records");
                break;
            }
        }
    }

    ticker.stop().await;
    let undelivered = batcher.shutdown().await?;

    let stats = batcher.stats();
    tracing::info!(
        appended = stats.appended,
        delivered = stats.delivered,
        undelivered = undelivered.len(),
        "Agent stopped"
    );

    Ok(())
}

fn ingest(batcher: &Batcher, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    match batcher.append_json(line) {
        Ok(_) => {}
        // Already logged by the batcher; the record was accepted
        Err(beacon_agent::Error::LocalWrite { .. }) => {}
        Err(e) => tracing::warn!(error = %e, "Skipping record"),
    }
}
