use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use rampart_core::Stage;

fn parse_duration(input: &str) -> Result<Duration, String> {
    let d = humantime::parse_duration(input.trim())
        .map_err(|_| format!("invalid duration '{input}' (expected e.g. 10s, 250ms, 1m)"))?;
    if d.is_zero() {
        return Err(format!("duration '{input}' must be positive"));
    }
    Ok(d)
}

/// `DURATION:TARGET`, e.g. `30s:10`.
fn parse_stage(input: &str) -> Result<Stage, String> {
    let (duration_raw, target_raw) = input
        .split_once(':')
        .ok_or_else(|| format!("invalid stage '{input}' (expected DURATION:TARGET, e.g. 30s:10)"))?;

    let duration = humantime::parse_duration(duration_raw.trim())
        .map_err(|_| format!("invalid stage duration in '{input}'"))?;
    let target: u64 = target_raw
        .trim()
        .parse()
        .map_err(|_| format!("invalid stage target in '{input}'"))?;

    Ok(Stage { duration, target })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary with a live progress bar.
    HumanReadable,
    /// NDJSON progress lines plus a final summary record on stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "rampart",
    version,
    about = "Load-test a product-catalog HTTP API against SLO thresholds",
    long_about = "rampart simulates concurrent shoppers against a product-catalog API: it ramps\n\
        virtual users over a load profile, picks weighted behavior scenarios per\n\
        iteration, aggregates latency/throughput/error metrics, and judges the run\n\
        against SLO thresholds.",
    after_help = "Examples:\n  rampart run --base-url http://localhost:8080\n  rampart run --profile spike --base-url http://staging:8080\n  rampart run --vus 50 --duration 30s --no-think-time\n  rampart run --stage 30s:10 --stage 1m:10 --stage 30s:0\n  rampart run --threshold 'http_req_duration:p(95)<500' --output json"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a load test
    Run(RunArgs),

    /// List the built-in load profiles
    Profiles,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Base URL of the target service
    #[arg(long, env = "BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    /// Built-in load profile (see `rampart profiles`)
    #[arg(long, default_value = "smoke")]
    pub profile: String,

    /// Custom flat profile: virtual users (requires --duration)
    #[arg(long, conflicts_with = "stage")]
    pub vus: Option<u64>,

    /// Custom flat profile: duration (e.g. 30s, 1m; requires --vus)
    #[arg(long, value_parser = parse_duration, conflicts_with = "stage")]
    pub duration: Option<Duration>,

    /// Custom ramp stage as DURATION:TARGET (repeatable, ordered)
    #[arg(long = "stage", value_name = "DURATION:TARGET", value_parser = parse_stage)]
    pub stage: Vec<Stage>,

    /// Seed for deterministic scenario selection and pacing
    #[arg(long)]
    pub seed: Option<u64>,

    /// Per-request timeout
    #[arg(long, value_parser = parse_duration, default_value = "30s")]
    pub timeout: Duration,

    /// Disable think-time pauses (maximum-throughput mode)
    #[arg(long)]
    pub no_think_time: bool,

    /// SLO as METRIC:EXPR, e.g. 'http_req_duration:p(95)<500'.
    /// Repeatable; overrides the default threshold set.
    #[arg(long = "threshold", value_name = "METRIC:EXPR")]
    pub threshold: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// Also write the machine-readable result record to this file
    #[arg(long)]
    pub out: Option<PathBuf>,
}
