use crate::collector::RunSnapshot;
use crate::config::ThresholdSpec;
use rampart_metrics::MetricValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
}

impl ThresholdOp {
    fn holds(self, observed: f64, expected: f64) -> bool {
        match self {
            Self::Lt => observed < expected,
            Self::Lte => observed <= expected,
            Self::Gt => observed > expected,
            Self::Gte => observed >= expected,
            Self::Eq => observed == expected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdStat {
    Avg,
    Min,
    Max,
    Count,
    Rate,
    P(u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdExpr {
    pub stat: ThresholdStat,
    pub op: ThresholdOp,
    pub value: f64,
}

/// `p(95)<500`, `rate<0.01`, `avg<=123`, ...
pub fn parse_threshold_expr(raw: &str) -> Result<ThresholdExpr, String> {
    let s: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if s.is_empty() {
        return Err("empty threshold expression".to_string());
    }

    let ops = [
        ("<=", ThresholdOp::Lte),
        (">=", ThresholdOp::Gte),
        ("==", ThresholdOp::Eq),
        ("<", ThresholdOp::Lt),
        (">", ThresholdOp::Gt),
    ];
    let (pos, len, op) = ops
        .iter()
        .find_map(|(tok, op)| s.find(tok).map(|pos| (pos, tok.len(), *op)))
        .ok_or_else(|| format!("missing comparator in `{raw}`"))?;

    let (stat_raw, rest) = s.split_at(pos);
    let value_raw = &rest[len..];
    if stat_raw.is_empty() || value_raw.is_empty() {
        return Err(format!("malformed threshold `{raw}`"));
    }

    let stat = if stat_raw.eq_ignore_ascii_case("avg") {
        ThresholdStat::Avg
    } else if stat_raw.eq_ignore_ascii_case("min") {
        ThresholdStat::Min
    } else if stat_raw.eq_ignore_ascii_case("max") {
        ThresholdStat::Max
    } else if stat_raw.eq_ignore_ascii_case("count") {
        ThresholdStat::Count
    } else if stat_raw.eq_ignore_ascii_case("rate") {
        ThresholdStat::Rate
    } else if let Some(inner) = stat_raw.strip_prefix("p(").and_then(|v| v.strip_suffix(')')) {
        let p: u32 = inner
            .parse()
            .map_err(|_| format!("invalid percentile in `{raw}`"))?;
        if !(1..=99).contains(&p) {
            return Err(format!("percentile out of range in `{raw}`"));
        }
        ThresholdStat::P(p)
    } else {
        return Err(format!("unknown statistic `{stat_raw}` in `{raw}`"));
    };

    let value: f64 = value_raw
        .parse()
        .map_err(|_| format!("invalid numeric value in `{raw}`"))?;

    Ok(ThresholdExpr { stat, op, value })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOutcome {
    Pass,
    Fail,
    /// The metric had zero samples (or the statistic does not apply to its
    /// kind); reported explicitly, never a silent pass.
    NoData,
}

#[derive(Debug, Clone)]
pub struct ThresholdVerdict {
    pub metric: String,
    pub expression: String,
    pub observed: Option<f64>,
    pub outcome: ThresholdOutcome,
}

impl ThresholdVerdict {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcome == ThresholdOutcome::Pass
    }
}

/// Evaluate every expression of every spec against a snapshot. Expressions
/// were parsed once at config validation; an unparsable one here still lands
/// as an explicit `NoData` verdict instead of vanishing.
pub fn evaluate_thresholds(specs: &[ThresholdSpec], snapshot: &RunSnapshot) -> Vec<ThresholdVerdict> {
    let mut out = Vec::new();

    for spec in specs {
        for raw in &spec.expressions {
            let verdict = match parse_threshold_expr(raw) {
                Err(_) => ThresholdVerdict {
                    metric: spec.metric.clone(),
                    expression: raw.clone(),
                    observed: None,
                    outcome: ThresholdOutcome::NoData,
                },
                Ok(expr) => {
                    let observed = snapshot
                        .metric(&spec.metric)
                        .and_then(|value| observed_stat(value, expr.stat, snapshot));
                    let outcome = match observed {
                        None => ThresholdOutcome::NoData,
                        Some(v) if expr.op.holds(v, expr.value) => ThresholdOutcome::Pass,
                        Some(_) => ThresholdOutcome::Fail,
                    };
                    ThresholdVerdict {
                        metric: spec.metric.clone(),
                        expression: raw.clone(),
                        observed,
                        outcome,
                    }
                }
            };
            out.push(verdict);
        }
    }

    out
}

fn observed_stat(value: &MetricValue, stat: ThresholdStat, snapshot: &RunSnapshot) -> Option<f64> {
    let elapsed_secs = snapshot.elapsed.as_secs_f64().max(1e-9);

    match stat {
        ThresholdStat::Count => match value {
            MetricValue::Counter(n) => Some(*n as f64),
            MetricValue::Rate { total, .. } => Some(*total as f64),
            MetricValue::Trend(t) => Some(t.count as f64),
            MetricValue::Gauge(_) => None,
        },

        // On a rate metric: hit fraction. On a counter: events per second of
        // elapsed run time (how `http_reqs: rate>100` expresses RPS).
        ThresholdStat::Rate => match value {
            MetricValue::Rate { rate, .. } => *rate,
            MetricValue::Counter(n) => Some(*n as f64 / elapsed_secs),
            _ => None,
        },

        ThresholdStat::Avg => match value {
            MetricValue::Trend(t) => t.mean,
            _ => None,
        },
        ThresholdStat::Min => match value {
            MetricValue::Trend(t) => t.min,
            _ => None,
        },
        ThresholdStat::Max => match value {
            MetricValue::Trend(t) => t.max,
            _ => None,
        },
        ThresholdStat::P(p) => match value {
            MetricValue::Trend(t) => t.percentile(p),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{Collector, RequestMeta};
    use std::time::Duration;

    fn ok_request<'a>(scenario: &'a str, ms: u64) -> RequestMeta<'a> {
        RequestMeta {
            scenario,
            step: "list_products",
            method: "GET",
            status: Some(200),
            error: None,
            duration: Duration::from_millis(ms),
        }
    }

    #[test]
    fn parse_accepts_whitespace_and_all_stats() {
        let expr = match parse_threshold_expr("  p(95)  <  500  ") {
            Ok(e) => e,
            Err(err) => panic!("{err}"),
        };
        assert_eq!(expr.stat, ThresholdStat::P(95));
        assert_eq!(expr.op, ThresholdOp::Lt);
        assert_eq!(expr.value, 500.0);

        assert!(parse_threshold_expr("avg<=123").is_ok());
        assert!(parse_threshold_expr("rate>0.5").is_ok());
        assert!(parse_threshold_expr("count==10").is_ok());
        assert!(parse_threshold_expr("min>=1").is_ok());
    }

    #[test]
    fn parse_rejects_malformed_expressions() {
        assert!(parse_threshold_expr("").is_err());
        assert!(parse_threshold_expr("p95<500").is_err());
        assert!(parse_threshold_expr("p(0)<500").is_err());
        assert!(parse_threshold_expr("p(100)<500").is_err());
        assert!(parse_threshold_expr("avg<").is_err());
        assert!(parse_threshold_expr("<500").is_err());
        assert!(parse_threshold_expr("avg~500").is_err());
        assert!(parse_threshold_expr("avg<abc").is_err());
    }

    #[test]
    fn p95_verdict_matches_constructed_distribution() {
        let collector = Collector::new();
        // 100 samples: 1..=100 ms. p95 ~ 95ms.
        for ms in 1..=100 {
            collector.record_request(ok_request("browse_products", ms));
        }
        let snapshot = collector.snapshot(Duration::from_secs(10));

        let specs = vec![ThresholdSpec::new("http_req_duration", &["p(95)<500"])];
        let verdicts = evaluate_thresholds(&specs, &snapshot);
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].outcome, ThresholdOutcome::Pass);

        let specs = vec![ThresholdSpec::new("http_req_duration", &["p(95)<50"])];
        let verdicts = evaluate_thresholds(&specs, &snapshot);
        assert_eq!(verdicts[0].outcome, ThresholdOutcome::Fail);
        let observed = match verdicts[0].observed {
            Some(v) => v,
            None => panic!("expected observed value"),
        };
        assert!((90.0..=100.0).contains(&observed), "p95={observed}");
    }

    #[test]
    fn counter_rate_is_per_second_of_elapsed_time() {
        let collector = Collector::new();
        for _ in 0..500 {
            collector.record_request(ok_request("browse_products", 1));
        }
        // 500 requests over 2s = 250 rps.
        let snapshot = collector.snapshot(Duration::from_secs(2));

        let specs = vec![ThresholdSpec::new("http_reqs", &["rate>100"])];
        let verdicts = evaluate_thresholds(&specs, &snapshot);
        assert_eq!(verdicts[0].outcome, ThresholdOutcome::Pass);
        assert_eq!(verdicts[0].observed, Some(250.0));
    }

    #[test]
    fn failed_fraction_rate_uses_hits_over_total() {
        let collector = Collector::new();
        for i in 0..100 {
            let status = if i < 2 { Some(500) } else { Some(200) };
            collector.record_request(RequestMeta {
                status,
                ..ok_request("browse_products", 1)
            });
        }
        let snapshot = collector.snapshot(Duration::from_secs(1));

        let specs = vec![ThresholdSpec::new("http_req_failed", &["rate<0.01"])];
        let verdicts = evaluate_thresholds(&specs, &snapshot);
        assert_eq!(verdicts[0].outcome, ThresholdOutcome::Fail);
        assert_eq!(verdicts[0].observed, Some(0.02));
    }

    #[test]
    fn zero_sample_metric_reports_no_data_not_pass() {
        let collector = Collector::new();
        let snapshot = collector.snapshot(Duration::from_secs(1));

        let specs = vec![
            ThresholdSpec::new("http_req_duration", &["p(95)<500"]),
            ThresholdSpec::new("made_up_metric", &["count>0"]),
        ];
        let verdicts = evaluate_thresholds(&specs, &snapshot);
        assert_eq!(verdicts.len(), 2);
        for v in &verdicts {
            assert_eq!(v.outcome, ThresholdOutcome::NoData);
            assert!(v.observed.is_none());
            assert!(!v.passed());
        }
    }

    #[test]
    fn every_expression_gets_its_own_verdict() {
        let collector = Collector::new();
        for ms in [10, 20, 30] {
            collector.record_request(ok_request("browse_products", ms));
        }
        let snapshot = collector.snapshot(Duration::from_secs(1));

        let specs = vec![ThresholdSpec::new(
            "http_req_duration",
            &["p(95)<500", "p(99)<1000", "avg>1000000"],
        )];
        let verdicts = evaluate_thresholds(&specs, &snapshot);
        assert_eq!(verdicts.len(), 3);
        assert_eq!(verdicts[0].outcome, ThresholdOutcome::Pass);
        assert_eq!(verdicts[1].outcome, ThresholdOutcome::Pass);
        assert_eq!(verdicts[2].outcome, ThresholdOutcome::Fail);
    }
}
