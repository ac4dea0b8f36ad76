use std::time::Duration;

use rampart_metrics::{MetricId, MetricValue, Registry, SeriesSummary, TrendSummary};

use crate::transport::TransportErrorKind;

/// The run's single shared mutable resource: every virtual user records
/// samples here concurrently.
///
/// Each sample lands in the untagged base series (what thresholds read) and
/// in a tagged per-scenario series (what the breakdown report reads). Trend
/// metrics are recorded in microseconds and reported in milliseconds.
#[derive(Debug)]
pub struct Collector {
    registry: Registry,
    http_reqs: MetricId,
    http_req_duration: MetricId,
    http_req_failed: MetricId,
    checks: MetricId,
    iterations: MetricId,
    iteration_duration: MetricId,
    vus: MetricId,
}

/// Outcome of one request as observed by a virtual user.
#[derive(Debug, Clone, Copy)]
pub struct RequestMeta<'a> {
    pub scenario: &'a str,
    /// Sub-step within the scenario, e.g. `list_products`.
    pub step: &'a str,
    pub method: &'a str,
    /// `None` when the transport failed before producing a status.
    pub status: Option<u16>,
    pub error: Option<TransportErrorKind>,
    pub duration: Duration,
}

impl RequestMeta<'_> {
    fn failed(&self) -> bool {
        self.error.is_some() || self.status.is_some_and(|s| s >= 400)
    }
}

/// Immutable aggregation view, taken after (or during) a run. Rates are
/// derived here from counts and elapsed time, not pre-computed per sample.
#[derive(Debug, Clone)]
pub struct RunSnapshot {
    pub elapsed: Duration,
    pub iterations_total: u64,
    pub requests_total: u64,
    pub failed_requests_total: u64,
    pub checks_total: u64,
    pub checks_failed: u64,
    /// Requests per second over the elapsed window.
    pub rps: f64,
    /// Failed fraction of all requests; 0 when no requests were made.
    pub error_rate: f64,
    /// Base `http_req_duration` distribution, in milliseconds.
    pub latency_ms: TrendSummary,
    /// Every live series, trends already converted to milliseconds.
    pub series: Vec<SeriesSummary>,
}

impl RunSnapshot {
    /// Base (untagged) value of a metric, by name.
    pub fn metric(&self, name: &str) -> Option<&MetricValue> {
        self.series
            .iter()
            .find(|s| s.name == name && s.tags.is_empty())
            .map(|s| &s.value)
    }
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector {
    pub fn new() -> Self {
        use rampart_metrics::MetricKind::{Counter, Gauge, Rate, Trend};

        let registry = Registry::default();
        let http_reqs = registry.register("http_reqs", Counter);
        let http_req_duration = registry.register("http_req_duration", Trend);
        let http_req_failed = registry.register("http_req_failed", Rate);
        let checks = registry.register("checks", Rate);
        let iterations = registry.register("iterations", Counter);
        let iteration_duration = registry.register("iteration_duration", Trend);
        let vus = registry.register("vus", Gauge);

        Self {
            registry,
            http_reqs,
            http_req_duration,
            http_req_failed,
            checks,
            iterations,
            iteration_duration,
            vus,
        }
    }

    fn write(&self, metric: MetricId, tags: &[(&str, &str)], f: impl Fn(&rampart_metrics::MetricHandle)) {
        if let Some(base) = self.registry.base_series(metric) {
            f(&base);
        }
        if !tags.is_empty()
            && let Some(tagged) = self.registry.series(metric, self.registry.resolve_tags(tags))
        {
            f(&tagged);
        }
    }

    pub fn record_request(&self, meta: RequestMeta<'_>) {
        let status_text;
        let mut tags: Vec<(&str, &str)> = vec![
            ("scenario", meta.scenario),
            ("name", meta.step),
            ("method", meta.method),
        ];
        if let Some(status) = meta.status {
            status_text = status.to_string();
            tags.push(("status", &status_text));
        }

        let micros = meta.duration.as_micros().min(u64::MAX as u128) as u64;
        let failed = meta.failed();

        self.write(self.http_reqs, &tags, |h| h.incr(1));
        self.write(self.http_req_duration, &tags, |h| h.observe(micros));
        self.write(self.http_req_failed, &tags, |h| h.hit(failed));
    }

    pub fn record_check(&self, scenario: &str, name: &str, ok: bool) {
        let tags = [("scenario", scenario), ("check", name)];
        self.write(self.checks, &tags, |h| h.hit(ok));
    }

    pub fn record_iteration(&self, scenario: &str, elapsed: Duration) {
        let tags = [("scenario", scenario)];
        let micros = elapsed.as_micros().min(u64::MAX as u128) as u64;
        self.write(self.iterations, &tags, |h| h.incr(1));
        self.write(self.iteration_duration, &tags, |h| h.observe(micros));
    }

    pub fn set_active_vus(&self, n: u64) {
        if let Some(h) = self.registry.base_series(self.vus) {
            h.set(n.min(i64::MAX as u64) as i64);
        }
    }

    pub fn requests_total(&self) -> u64 {
        match self.registry.base_value(self.http_reqs) {
            Some(MetricValue::Counter(n)) => n,
            _ => 0,
        }
    }

    pub fn iterations_total(&self) -> u64 {
        match self.registry.base_value(self.iterations) {
            Some(MetricValue::Counter(n)) => n,
            _ => 0,
        }
    }

    pub fn failed_requests_total(&self) -> u64 {
        match self.registry.base_value(self.http_req_failed) {
            Some(MetricValue::Rate { hits, .. }) => hits,
            _ => 0,
        }
    }

    pub fn checks_failed_total(&self) -> u64 {
        match self.registry.base_value(self.checks) {
            Some(MetricValue::Rate { total, hits, .. }) => total.saturating_sub(hits),
            _ => 0,
        }
    }

    pub fn snapshot(&self, elapsed: Duration) -> RunSnapshot {
        let secs = elapsed.as_secs_f64().max(1e-9);

        let mut series = self.registry.summarize();
        for s in &mut series {
            let scaled = match &s.value {
                MetricValue::Trend(t) => Some(t.scaled_down(1000.0)),
                _ => None,
            };
            if let Some(t) = scaled {
                s.value = MetricValue::Trend(t);
            }
        }

        let requests_total = self.requests_total();
        let failed_requests_total = self.failed_requests_total();
        let (checks_total, checks_failed) = match self.registry.base_value(self.checks) {
            Some(MetricValue::Rate { total, hits, .. }) => (total, total.saturating_sub(hits)),
            _ => (0, 0),
        };

        let latency_ms = series
            .iter()
            .find(|s| s.name == "http_req_duration" && s.tags.is_empty())
            .and_then(|s| match &s.value {
                MetricValue::Trend(t) => Some(t.clone()),
                _ => None,
            })
            .unwrap_or_default();

        let error_rate = if requests_total == 0 {
            0.0
        } else {
            failed_requests_total as f64 / requests_total as f64
        };

        RunSnapshot {
            elapsed,
            iterations_total: self.iterations_total(),
            requests_total,
            failed_requests_total,
            checks_total,
            checks_failed,
            rps: requests_total as f64 / secs,
            error_rate,
            latency_ms,
            series,
        }
    }
}
