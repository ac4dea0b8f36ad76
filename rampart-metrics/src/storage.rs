use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MetricKind {
    /// Monotonic event count.
    Counter,
    /// Last-written signed value.
    Gauge,
    /// Hit fraction: hits over total observations.
    Rate,
    /// Value distribution with percentile estimation.
    Trend,
}

#[derive(Debug, Default)]
pub struct RateCells {
    pub total: AtomicU64,
    pub hits: AtomicU64,
}

/// Percentile summary of one trend series, in the recorded unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrendSummary {
    pub count: u64,
    pub sum: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub stdev: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

impl TrendSummary {
    pub fn percentile(&self, p: u32) -> Option<f64> {
        match p {
            50 => self.p50,
            75 => self.p75,
            90 => self.p90,
            95 => self.p95,
            99 => self.p99,
            _ => None,
        }
    }

    /// Divide every value field by `by` (unit conversion, e.g. micros to ms).
    #[must_use]
    pub fn scaled_down(&self, by: f64) -> TrendSummary {
        let scale = |v: Option<f64>| v.map(|x| x / by);
        TrendSummary {
            count: self.count,
            sum: scale(self.sum),
            min: scale(self.min),
            max: scale(self.max),
            mean: scale(self.mean),
            stdev: scale(self.stdev),
            p50: scale(self.p50),
            p75: scale(self.p75),
            p90: scale(self.p90),
            p95: scale(self.p95),
            p99: scale(self.p99),
        }
    }
}

/// One snapshotted value, by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Counter(u64),
    Gauge(i64),
    Rate {
        total: u64,
        hits: u64,
        rate: Option<f64>,
    },
    Trend(TrendSummary),
}

pub(crate) fn new_trend_histogram() -> Histogram<u64> {
    // 1 microsecond to 1 hour, 3 significant figures. Values beyond the upper
    // bound saturate instead of being dropped, so counts stay exact.
    match Histogram::<u64>::new_with_bounds(1, 3_600_000_000, 3) {
        Ok(h) => h,
        Err(err) => unreachable!("static histogram bounds rejected: {err}"),
    }
}

pub(crate) fn summarize_trend(h: &Histogram<u64>) -> TrendSummary {
    let count = h.len();
    if count == 0 {
        return TrendSummary::default();
    }

    let q = |quantile: f64| Some(h.value_at_quantile(quantile) as f64);
    let mean = h.mean();

    TrendSummary {
        count,
        sum: Some(mean * count as f64),
        min: Some(h.min() as f64),
        max: Some(h.max() as f64),
        mean: Some(mean),
        stdev: Some(h.stdev()),
        p50: q(0.50),
        p75: q(0.75),
        p90: q(0.90),
        p95: q(0.95),
        p99: q(0.99),
    }
}

#[derive(Debug)]
pub(crate) enum MetricStorage {
    Counter(Arc<AtomicU64>),
    Gauge(Arc<AtomicI64>),
    Rate(Arc<RateCells>),
    Trend(Arc<Mutex<Histogram<u64>>>),
}

impl MetricStorage {
    pub(crate) fn new(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Counter => Self::Counter(Arc::new(AtomicU64::new(0))),
            MetricKind::Gauge => Self::Gauge(Arc::new(AtomicI64::new(0))),
            MetricKind::Rate => Self::Rate(Arc::new(RateCells::default())),
            MetricKind::Trend => Self::Trend(Arc::new(Mutex::new(new_trend_histogram()))),
        }
    }

    pub(crate) fn handle(&self) -> MetricHandle {
        match self {
            Self::Counter(c) => MetricHandle::Counter(c.clone()),
            Self::Gauge(g) => MetricHandle::Gauge(g.clone()),
            Self::Rate(r) => MetricHandle::Rate(r.clone()),
            Self::Trend(h) => MetricHandle::Trend(h.clone()),
        }
    }

    pub(crate) fn value(&self) -> MetricValue {
        match self {
            Self::Counter(c) => MetricValue::Counter(c.load(Ordering::Relaxed)),
            Self::Gauge(g) => MetricValue::Gauge(g.load(Ordering::Relaxed)),
            Self::Rate(r) => {
                let total = r.total.load(Ordering::Relaxed);
                let hits = r.hits.load(Ordering::Relaxed);
                let rate = (total > 0).then(|| hits as f64 / total as f64);
                MetricValue::Rate { total, hits, rate }
            }
            Self::Trend(h) => MetricValue::Trend(summarize_trend(&h.lock())),
        }
    }
}

/// Cheap cloneable writer for one series. Mismatched-kind writes are no-ops.
#[derive(Debug, Clone)]
pub enum MetricHandle {
    Counter(Arc<AtomicU64>),
    Gauge(Arc<AtomicI64>),
    Rate(Arc<RateCells>),
    Trend(Arc<Mutex<Histogram<u64>>>),
}

impl MetricHandle {
    #[inline]
    pub fn incr(&self, n: u64) {
        if let Self::Counter(c) = self {
            c.fetch_add(n, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn set(&self, value: i64) {
        if let Self::Gauge(g) = self {
            g.store(value, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn hit(&self, hit: bool) {
        if let Self::Rate(r) = self {
            r.total.fetch_add(1, Ordering::Relaxed);
            if hit {
                r.hits.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    #[inline]
    pub fn observe(&self, value: u64) {
        if let Self::Trend(h) = self {
            h.lock().saturating_record(value.max(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_and_rate_accumulate() {
        let c = MetricStorage::new(MetricKind::Counter);
        let h = c.handle();
        h.incr(2);
        h.incr(3);
        assert_eq!(c.value(), MetricValue::Counter(5));

        let r = MetricStorage::new(MetricKind::Rate);
        let h = r.handle();
        h.hit(true);
        h.hit(false);
        h.hit(false);
        h.hit(false);
        let MetricValue::Rate { total, hits, rate } = r.value() else {
            panic!("expected rate value");
        };
        assert_eq!((total, hits), (4, 1));
        assert_eq!(rate, Some(0.25));
    }

    #[test]
    fn gauge_keeps_last_value() {
        let g = MetricStorage::new(MetricKind::Gauge);
        let h = g.handle();
        h.set(7);
        h.set(-3);
        assert_eq!(g.value(), MetricValue::Gauge(-3));
    }

    #[test]
    fn empty_trend_has_no_stats() {
        let t = MetricStorage::new(MetricKind::Trend);
        let MetricValue::Trend(s) = t.value() else {
            panic!("expected trend value");
        };
        assert_eq!(s.count, 0);
        assert!(s.p95.is_none());
        assert!(s.min.is_none());
        assert!(s.mean.is_none());
    }

    #[test]
    fn trend_summary_covers_percentiles() {
        let t = MetricStorage::new(MetricKind::Trend);
        let h = t.handle();
        for v in 1..=100u64 {
            h.observe(v);
        }

        let MetricValue::Trend(s) = t.value() else {
            panic!("expected trend value");
        };
        assert_eq!(s.count, 100);
        assert_eq!(s.min, Some(1.0));
        assert_eq!(s.max, Some(100.0));
        let p95 = match s.percentile(95) {
            Some(v) => v,
            None => panic!("expected p95"),
        };
        assert!((94.0..=96.0).contains(&p95), "p95={p95}");
        assert_eq!(s.percentile(42), None);
    }

    #[test]
    fn trend_saturates_instead_of_dropping() {
        let t = MetricStorage::new(MetricKind::Trend);
        let h = t.handle();
        h.observe(u64::MAX);
        h.observe(10);

        let MetricValue::Trend(s) = t.value() else {
            panic!("expected trend value");
        };
        // The oversized sample is clamped to the histogram bound, not lost.
        assert_eq!(s.count, 2);
    }

    #[test]
    fn mismatched_kind_writes_are_noops() {
        let c = MetricStorage::new(MetricKind::Counter);
        let h = c.handle();
        h.observe(10);
        h.hit(true);
        h.set(5);
        assert_eq!(c.value(), MetricValue::Counter(0));
    }
}
