use std::fmt::Write as _;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use rampart_core::{Config, ProgressFn, RunResult, ThresholdOutcome};

use super::OutputFormatter;

pub(crate) struct HumanOutput {
    bar: Arc<ProgressBar>,
}

impl HumanOutput {
    pub(crate) fn new() -> Self {
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr_with_hz(5));
        let style = ProgressStyle::with_template(
            "[{elapsed_precise}] {bar:30} {percent:>3}% {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);

        Self { bar: Arc::new(bar) }
    }
}

impl OutputFormatter for HumanOutput {
    fn print_header(&self, config: &Config) {
        eprintln!(
            "rampart: profile={} target={} max_vus={} duration={}",
            config.profile_name,
            config.base_url,
            config.profile.max_vus(),
            humantime::format_duration(config.profile.total_duration()),
        );
    }

    fn progress(&self) -> Option<ProgressFn> {
        let bar = self.bar.clone();
        Some(Arc::new(move |u| {
            let total_ms = u.total_duration.as_millis() as u64;
            let elapsed_ms = (u.elapsed.as_millis() as u64).min(total_ms);
            bar.set_length(total_ms.max(1));
            bar.set_position(elapsed_ms);
            bar.set_message(format!(
                "vus={} reqs={} rps={:.0} failed={}",
                u.target_vus, u.requests_total, u.rps_now, u.failed_requests_total
            ));
        }))
    }

    fn print_summary(&self, result: &RunResult) -> anyhow::Result<()> {
        self.bar.finish_and_clear();
        print!("{}", render(result));
        Ok(())
    }
}

fn fmt_ms(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{v:.2}ms"),
        None => "n/a".to_string(),
    }
}

pub(crate) fn render(result: &RunResult) -> String {
    let mut out = String::new();

    writeln!(
        &mut out,
        "\nprofile: {}  target: {}  seed: {}",
        result.meta.profile, result.meta.base_url, result.meta.seed
    )
    .ok();
    writeln!(
        &mut out,
        "duration: {:.1}s",
        result.meta.elapsed.as_secs_f64()
    )
    .ok();

    writeln!(
        &mut out,
        "\nrequests: {} (failed {})  iterations: {}",
        result.requests_total, result.failed_requests_total, result.iterations_total
    )
    .ok();
    writeln!(
        &mut out,
        "rps: {:.2}  error rate: {:.2}%",
        result.rps,
        result.error_rate * 100.0
    )
    .ok();

    let l = &result.latency_ms;
    if l.count > 0 {
        writeln!(
            &mut out,
            "latency: avg={} min={} max={}",
            fmt_ms(l.mean),
            fmt_ms(l.min),
            fmt_ms(l.max)
        )
        .ok();
        writeln!(
            &mut out,
            "         p50={} p90={} p95={} p99={}",
            fmt_ms(l.p50),
            fmt_ms(l.p90),
            fmt_ms(l.p95),
            fmt_ms(l.p99)
        )
        .ok();
    } else {
        out.push_str("latency: n/a (no requests)\n");
    }

    writeln!(
        &mut out,
        "checks: {} passed, {} failed",
        result.checks_total.saturating_sub(result.checks_failed),
        result.checks_failed
    )
    .ok();

    if !result.thresholds.is_empty() {
        out.push_str("\nthresholds\n");
        for v in &result.thresholds {
            let status = match v.outcome {
                ThresholdOutcome::Pass => "PASS",
                ThresholdOutcome::Fail => "FAIL",
                ThresholdOutcome::NoData => "NO DATA",
            };
            match v.observed {
                Some(observed) => writeln!(
                    &mut out,
                    "  [{status}] {} {} (observed {observed:.2})",
                    v.metric, v.expression
                )
                .ok(),
                None => writeln!(&mut out, "  [{status}] {} {}", v.metric, v.expression).ok(),
            };
        }
    }

    writeln!(
        &mut out,
        "\noverall: {}",
        if result.passed() { "PASS" } else { "FAIL" }
    )
    .ok();

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rampart_core::{ThresholdVerdict, TrendSummary};
    use std::time::{Duration, SystemTime};

    fn sample_result() -> RunResult {
        RunResult {
            meta: rampart_core::RunMeta {
                profile: "smoke".to_string(),
                base_url: "http://localhost:8080".to_string(),
                seed: 7,
                started_at: SystemTime::UNIX_EPOCH,
                ended_at: SystemTime::UNIX_EPOCH,
                elapsed: Duration::from_secs(10),
            },
            iterations_total: 12,
            requests_total: 20,
            failed_requests_total: 1,
            checks_total: 36,
            checks_failed: 2,
            rps: 2.0,
            error_rate: 0.05,
            latency_ms: TrendSummary {
                count: 20,
                mean: Some(12.5),
                min: Some(1.0),
                max: Some(120.0),
                p50: Some(10.0),
                p90: Some(30.0),
                p95: Some(50.0),
                p99: Some(100.0),
                ..TrendSummary::default()
            },
            metrics: Vec::new(),
            thresholds: vec![
                ThresholdVerdict {
                    metric: "http_req_duration".to_string(),
                    expression: "p(95)<500".to_string(),
                    observed: Some(50.0),
                    outcome: ThresholdOutcome::Pass,
                },
                ThresholdVerdict {
                    metric: "http_req_failed".to_string(),
                    expression: "rate<0.01".to_string(),
                    observed: Some(0.05),
                    outcome: ThresholdOutcome::Fail,
                },
                ThresholdVerdict {
                    metric: "ghost_metric".to_string(),
                    expression: "count>0".to_string(),
                    observed: None,
                    outcome: ThresholdOutcome::NoData,
                },
            ],
        }
    }

    #[test]
    fn render_includes_totals_latency_and_verdicts() {
        let text = render(&sample_result());
        assert!(text.contains("profile: smoke"));
        assert!(text.contains("requests: 20 (failed 1)"));
        assert!(text.contains("rps: 2.00"));
        assert!(text.contains("error rate: 5.00%"));
        assert!(text.contains("p95=50.00ms"));
        assert!(text.contains("checks: 34 passed, 2 failed"));
        assert!(text.contains("[PASS] http_req_duration p(95)<500"));
        assert!(text.contains("[FAIL] http_req_failed rate<0.01 (observed 0.05)"));
        assert!(text.contains("[NO DATA] ghost_metric count>0"));
        assert!(text.contains("overall: FAIL"));
    }

    #[test]
    fn render_without_requests_shows_na_latency() {
        let mut result = sample_result();
        result.latency_ms = TrendSummary::default();
        result.thresholds.clear();
        let text = render(&result);
        assert!(text.contains("latency: n/a"));
        assert!(text.contains("overall: PASS"));
    }
}
