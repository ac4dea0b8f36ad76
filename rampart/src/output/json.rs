use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};

use rampart_core::{Config, MetricValue, ProgressFn, RunResult, SeriesSummary, ThresholdOutcome};

use super::OutputFormatter;

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _config: &Config) {}

    fn progress(&self) -> Option<ProgressFn> {
        Some(Arc::new(|u| {
            let line = json!({
                "kind": "progress",
                "elapsed_secs": u.elapsed.as_secs(),
                "target_vus": u.target_vus,
                "iterations_total": u.iterations_total,
                "requests_total": u.requests_total,
                "failed_requests_total": u.failed_requests_total,
                "rps_now": u.rps_now,
            });
            println!("{line}");
        }))
    }

    fn print_summary(&self, result: &RunResult) -> anyhow::Result<()> {
        println!("{}", result_record(result));
        Ok(())
    }
}

fn epoch_ms(t: SystemTime) -> u128 {
    t.duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

fn outcome_str(outcome: ThresholdOutcome) -> &'static str {
    match outcome {
        ThresholdOutcome::Pass => "pass",
        ThresholdOutcome::Fail => "fail",
        ThresholdOutcome::NoData => "no_data",
    }
}

fn series_value(series: &SeriesSummary) -> Value {
    match &series.value {
        MetricValue::Counter(n) => json!({ "count": n }),
        MetricValue::Gauge(v) => json!({ "value": v }),
        MetricValue::Rate { total, hits, rate } => {
            json!({ "total": total, "hits": hits, "rate": rate })
        }
        MetricValue::Trend(t) => json!({
            "count": t.count,
            "avg": t.mean,
            "min": t.min,
            "max": t.max,
            "p50": t.p50,
            "p90": t.p90,
            "p95": t.p95,
            "p99": t.p99,
        }),
    }
}

/// The machine-readable result record, used for stdout and `--out`.
pub(crate) fn result_record(result: &RunResult) -> Value {
    let metrics: Vec<Value> = result
        .metrics
        .iter()
        .map(|s| {
            let tags: serde_json::Map<String, Value> = s
                .tags
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            json!({
                "name": s.name,
                "kind": s.kind.to_string(),
                "tags": tags,
                "value": series_value(s),
            })
        })
        .collect();

    let thresholds: Vec<Value> = result
        .thresholds
        .iter()
        .map(|v| {
            json!({
                "metric": v.metric,
                "expression": v.expression,
                "observed": v.observed,
                "outcome": outcome_str(v.outcome),
            })
        })
        .collect();

    let l = &result.latency_ms;
    json!({
        "kind": "summary",
        "profile": result.meta.profile,
        "base_url": result.meta.base_url,
        "seed": result.meta.seed,
        "started_at_ms": epoch_ms(result.meta.started_at),
        "ended_at_ms": epoch_ms(result.meta.ended_at),
        "elapsed_ms": result.meta.elapsed.as_millis(),
        "iterations_total": result.iterations_total,
        "requests_total": result.requests_total,
        "failed_requests_total": result.failed_requests_total,
        "checks_total": result.checks_total,
        "checks_failed": result.checks_failed,
        "rps": result.rps,
        "error_rate": result.error_rate,
        "latency_ms": {
            "avg": l.mean,
            "min": l.min,
            "max": l.max,
            "p50": l.p50,
            "p90": l.p90,
            "p95": l.p95,
            "p99": l.p99,
        },
        "metrics": metrics,
        "thresholds": thresholds,
        "passed": result.passed(),
    })
}
