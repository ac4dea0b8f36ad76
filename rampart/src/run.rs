use anyhow::Context as _;
use std::sync::Arc;

use rampart_core::{
    Config, HyperTransport, LoadProfile, RunOptions, ThresholdSpec,
};

use crate::cli::RunArgs;
use crate::exit_codes::ExitCode;
use crate::output;

pub async fn run(args: RunArgs) -> anyhow::Result<ExitCode> {
    let config = match build_config(&args) {
        Ok(config) => config,
        Err(msg) => {
            eprintln!("{msg}");
            return Ok(ExitCode::InvalidInput);
        }
    };

    if let Err(err) = config.validate() {
        eprintln!("{err}");
        return Ok(ExitCode::InvalidInput);
    }

    let out = output::formatter(args.output);
    out.print_header(&config);

    let transport = Arc::new(HyperTransport::default());
    let opts = RunOptions {
        progress: out.progress(),
        stop: None,
    };

    let result = match rampart_core::run(config, transport, opts).await {
        Ok(result) => result,
        Err(rampart_core::Error::Config(err)) => {
            eprintln!("{err}");
            return Ok(ExitCode::InvalidInput);
        }
        Err(err) => return Err(err.into()),
    };

    out.print_summary(&result)?;

    if let Some(path) = &args.out {
        let record = output::json::result_record(&result);
        let pretty = serde_json::to_string_pretty(&record)
            .context("failed to serialize result record")?;
        std::fs::write(path, pretty)
            .with_context(|| format!("failed to write result record: {}", path.display()))?;
    }

    Ok(ExitCode::from_quality_gates(
        result.checks_failed > 0,
        !result.passed(),
    ))
}

pub fn print_profiles() {
    for name in LoadProfile::profile_names() {
        let Some(profile) = LoadProfile::named(name) else {
            continue;
        };
        match profile {
            LoadProfile::Flat { vus, duration } => {
                println!(
                    "{name:<8} flat    {vus} VU for {}",
                    humantime::format_duration(duration)
                );
            }
            LoadProfile::Staged { stages, .. } => {
                let shape: Vec<String> = stages
                    .iter()
                    .map(|s| format!("{}:{}", humantime::format_duration(s.duration), s.target))
                    .collect();
                println!("{name:<8} staged  {}", shape.join(" "));
            }
        }
    }
}

fn build_config(args: &RunArgs) -> Result<Config, String> {
    let (profile_name, profile) = if !args.stage.is_empty() {
        (
            "custom".to_string(),
            LoadProfile::Staged {
                start: 0,
                stages: args.stage.clone(),
            },
        )
    } else if args.vus.is_some() || args.duration.is_some() {
        let (Some(vus), Some(duration)) = (args.vus, args.duration) else {
            return Err("custom flat profile requires both --vus and --duration".to_string());
        };
        ("custom".to_string(), LoadProfile::Flat { vus, duration })
    } else {
        let profile = LoadProfile::named(&args.profile).ok_or_else(|| {
            format!(
                "unknown profile `{}` (expected one of: {})",
                args.profile,
                LoadProfile::profile_names().join(", ")
            )
        })?;
        (args.profile.clone(), profile)
    };

    let mut config = Config::new(args.base_url.clone(), profile_name, profile);
    config.seed = args.seed;
    config.request_timeout = args.timeout;
    if args.no_think_time {
        config.think_time = None;
    }
    if !args.threshold.is_empty() {
        config.thresholds = parse_threshold_args(&args.threshold)?;
    }

    Ok(config)
}

/// Group repeated `METRIC:EXPR` flags into one spec per metric, keeping the
/// declaration order.
fn parse_threshold_args(raw: &[String]) -> Result<Vec<ThresholdSpec>, String> {
    let mut specs: Vec<ThresholdSpec> = Vec::new();

    for item in raw {
        let (metric, expr) = item.split_once(':').ok_or_else(|| {
            format!("invalid threshold '{item}' (expected METRIC:EXPR, e.g. http_req_duration:p(95)<500)")
        })?;
        if metric.is_empty() || expr.is_empty() {
            return Err(format!("invalid threshold '{item}'"));
        }

        match specs.iter_mut().find(|s| s.metric == metric) {
            Some(spec) => spec.expressions.push(expr.to_string()),
            None => specs.push(ThresholdSpec {
                metric: metric.to_string(),
                expressions: vec![expr.to_string()],
            }),
        }
    }

    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser as _;
    use std::time::Duration;

    fn args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["rampart", "run"];
        argv.extend_from_slice(extra);
        let cli = match crate::cli::Cli::try_parse_from(argv) {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };
        match cli.command {
            crate::cli::Command::Run(args) => args,
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn named_profile_is_resolved() {
        let config = match build_config(&args(&["--profile", "spike"])) {
            Ok(c) => c,
            Err(err) => panic!("{err}"),
        };
        assert_eq!(config.profile_name, "spike");
        assert_eq!(config.profile.max_vus(), 200);
    }

    #[test]
    fn unknown_profile_is_an_input_error() {
        let err = match build_config(&args(&["--profile", "hurricane"])) {
            Ok(_) => panic!("expected error"),
            Err(err) => err,
        };
        assert!(err.contains("unknown profile"));
    }

    #[test]
    fn vus_without_duration_is_rejected() {
        let err = match build_config(&args(&["--vus", "5"])) {
            Ok(_) => panic!("expected error"),
            Err(err) => err,
        };
        assert!(err.contains("--vus and --duration"));
    }

    #[test]
    fn stages_build_a_staged_profile() {
        let config = match build_config(&args(&["--stage", "30s:10", "--stage", "30s:0"])) {
            Ok(c) => c,
            Err(err) => panic!("{err}"),
        };
        assert_eq!(config.profile_name, "custom");
        assert_eq!(config.profile.total_duration(), Duration::from_secs(60));
        assert_eq!(config.profile.max_vus(), 10);
    }

    #[test]
    fn threshold_flags_group_by_metric() {
        let specs = match parse_threshold_args(&[
            "http_req_duration:p(95)<500".to_string(),
            "http_req_duration:p(99)<1000".to_string(),
            "http_req_failed:rate<0.01".to_string(),
        ]) {
            Ok(s) => s,
            Err(err) => panic!("{err}"),
        };
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].metric, "http_req_duration");
        assert_eq!(specs[0].expressions.len(), 2);
        assert_eq!(specs[1].metric, "http_req_failed");

        assert!(parse_threshold_args(&["nope".to_string()]).is_err());
    }

    #[test]
    fn no_think_time_flag_disables_pacing() {
        let config = match build_config(&args(&["--no-think-time"])) {
            Ok(c) => c,
            Err(err) => panic!("{err}"),
        };
        assert!(config.think_time.is_none());
    }
}
