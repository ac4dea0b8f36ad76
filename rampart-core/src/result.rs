use std::time::{Duration, SystemTime};

use rampart_metrics::{SeriesSummary, TrendSummary};

use crate::collector::RunSnapshot;
use crate::thresholds::ThresholdVerdict;

#[derive(Debug, Clone)]
pub struct RunMeta {
    pub profile: String,
    pub base_url: String,
    /// Seed actually used for scenario randomness (resolved from config or OS).
    pub seed: u64,
    pub started_at: SystemTime,
    pub ended_at: SystemTime,
    pub elapsed: Duration,
}

/// Final immutable snapshot of a run: assembled once, after every virtual
/// user has retired and no further samples can arrive.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub meta: RunMeta,
    pub iterations_total: u64,
    pub requests_total: u64,
    pub failed_requests_total: u64,
    pub checks_total: u64,
    pub checks_failed: u64,
    pub rps: f64,
    pub error_rate: f64,
    /// End-to-end request latency distribution, milliseconds.
    pub latency_ms: TrendSummary,
    pub metrics: Vec<SeriesSummary>,
    pub thresholds: Vec<ThresholdVerdict>,
}

impl RunResult {
    pub(crate) fn assemble(
        meta: RunMeta,
        snapshot: RunSnapshot,
        thresholds: Vec<ThresholdVerdict>,
    ) -> Self {
        Self {
            meta,
            iterations_total: snapshot.iterations_total,
            requests_total: snapshot.requests_total,
            failed_requests_total: snapshot.failed_requests_total,
            checks_total: snapshot.checks_total,
            checks_failed: snapshot.checks_failed,
            rps: snapshot.rps,
            error_rate: snapshot.error_rate,
            latency_ms: snapshot.latency_ms,
            metrics: snapshot.series,
            thresholds,
        }
    }

    /// Overall verdict: the logical AND of every threshold verdict. An
    /// indeterminate (`NoData`) verdict fails the run.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.thresholds.iter().all(|v| v.passed())
    }
}
