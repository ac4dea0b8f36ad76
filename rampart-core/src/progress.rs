use std::sync::Arc;
use std::time::Duration;

/// Periodic run-state sample pushed to the embedder (CLI progress bar, JSON
/// line stream). Purely informational; dropping updates loses nothing.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub elapsed: Duration,
    pub total_duration: Duration,
    /// Scheduled concurrency at this instant.
    pub target_vus: u64,
    pub iterations_total: u64,
    pub requests_total: u64,
    pub failed_requests_total: u64,
    /// Requests/sec over the last tick interval.
    pub rps_now: f64,
}

pub type ProgressFn = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;
