use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use trellis_core::cas::{CasClient, FetchResult};
use trellis_core::ProtocolParameters;

/// Bounds concurrent CAS fetches (`max_concurrent_downloads`) and applies
/// a per-request timeout.
///
/// A timed-out fetch reports `CasNotReachable`, which the processor treats
/// as retryable, so a slow CAS degrades to retries instead of stalling the
/// observer.
pub struct DownloadManager {
    cas: Arc<dyn CasClient>,
    permits: Semaphore,
    fetch_timeout: Duration,
}

impl DownloadManager {
    pub fn new(
        cas: Arc<dyn CasClient>,
        params: &ProtocolParameters,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            cas,
            permits: Semaphore::new(params.max_concurrent_downloads),
            fetch_timeout,
        }
    }

    /// Fetch `uri` with the store's size cap, holding one of the manager's
    /// permits for the duration.
    pub async fn download(&self, uri: &str, max_size_in_bytes: u64) -> FetchResult {
        let Ok(_permit) = self.permits.acquire().await else {
            return FetchResult::CasNotReachable;
        };
        match tokio::time::timeout(self.fetch_timeout, self.cas.read(uri, max_size_in_bytes)).await
        {
            Ok(result) => result,
            Err(_) => FetchResult::CasNotReachable,
        }
    }
}
