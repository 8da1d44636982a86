use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::writer::BatchWriter;

/// Drives [`BatchWriter::write`] on a fixed cadence, backing off
/// exponentially while ticks fail (CAS outage, ledger rejection) and
/// resetting on the first success.
pub struct BatchWriterDriver {
    writer: Arc<BatchWriter>,
    interval: Duration,
    max_backoff: Duration,
}

impl BatchWriterDriver {
    pub fn new(writer: Arc<BatchWriter>, interval: Duration) -> Self {
        Self {
            writer,
            interval,
            max_backoff: Duration::from_secs(600),
        }
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Run forever; callers spawn this on its own task and abort it to
    /// shut down. Every awaited tick is a cancellation point.
    pub async fn run(&self) {
        let mut delay = self.interval;
        loop {
            match self.writer.write().await {
                Ok(anchored) => {
                    if anchored > 0 {
                        info!(operations = anchored, "batch writer tick complete");
                    }
                    delay = self.interval;
                }
                Err(err) => {
                    error!(error = %err, retry_in_secs = delay.as_secs(), "batch writer tick failed");
                    delay = next_backoff(delay, self.max_backoff);
                }
            }
            tokio::time::sleep(delay).await;
        }
    }
}

fn next_backoff(current: Duration, max: Duration) -> Duration {
    (current * 2).min(max)
}
