use std::sync::Arc;
use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::Barrier;
use tokio::time::MissedTickBehavior;

use crate::collector::Collector;
use crate::config::Config;
use crate::error::Result;
use crate::progress::{ProgressFn, ProgressUpdate};
use crate::result::{RunMeta, RunResult};
use crate::scenario::ScenarioEnv;
use crate::schedule::StageSchedule;
use crate::selector::WeightedSelector;
use crate::thresholds::evaluate_thresholds;
use crate::transport::Transport;
use crate::vu::{StartSignal, StopSignal, VuContext, run_vu};

#[derive(Default, Clone)]
pub struct RunOptions {
    /// Per-second run-state callback.
    pub progress: Option<ProgressFn>,
    /// External cancellation; VUs retire at their next iteration boundary.
    pub stop: Option<Arc<StopSignal>>,
}

/// Drive one full load test: validate, spawn the VU population, track the
/// stage schedule to completion, then snapshot and judge the thresholds.
pub async fn run<T: Transport>(
    config: Config,
    transport: Arc<T>,
    opts: RunOptions,
) -> Result<RunResult> {
    config.validate()?;

    let collector = Arc::new(Collector::new());
    let selector = Arc::new(WeightedSelector::new(&config.weights));
    let schedule = Arc::new(StageSchedule::from_profile(&config.profile));
    let env = Arc::new(ScenarioEnv::new(&config, transport, collector.clone())?);

    let seed = config.seed.unwrap_or_else(|| rand::rng().random());
    let max_vus = config.profile.max_vus();
    let total_duration = schedule.total_duration();

    let run_started: Arc<OnceLock<Instant>> = Arc::new(OnceLock::new());
    let ready_barrier = Arc::new(Barrier::new(max_vus as usize + 1));
    let start_signal = Arc::new(StartSignal::default());
    let stop = opts
        .stop
        .unwrap_or_else(|| Arc::new(StopSignal::default()));

    let mut handles = Vec::with_capacity(max_vus as usize);
    for vu_id in 1..=max_vus {
        let ctx = VuContext {
            vu_id,
            schedule: schedule.clone(),
            selector: selector.clone(),
            env: env.clone(),
            collector: collector.clone(),
            rng: ChaCha8Rng::seed_from_u64(vu_seed(seed, vu_id)),
            run_started: run_started.clone(),
            ready_barrier: ready_barrier.clone(),
            start_signal: start_signal.clone(),
            stop: stop.clone(),
        };
        handles.push(tokio::spawn(run_vu(ctx)));
    }

    // Hold every VU at the barrier so spawn cost stays out of measured time.
    ready_barrier.wait().await;

    let started = Instant::now();
    let started_at = SystemTime::now();
    let _ = run_started.set(started);
    start_signal.start();

    let progress_handle = opts.progress.map(|progress| {
        let collector = collector.clone();
        let schedule = schedule.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval fires immediately.
            interval.tick().await;

            let mut last_at = Instant::now();
            let mut last_requests = 0u64;
            loop {
                interval.tick().await;

                let now = Instant::now();
                let dt = now.duration_since(last_at);
                last_at = now;

                let elapsed = started.elapsed();
                let requests_total = collector.requests_total();
                let delta = requests_total.saturating_sub(last_requests);
                last_requests = requests_total;

                let target_vus = schedule.target_at(elapsed);
                collector.set_active_vus(target_vus);

                progress(ProgressUpdate {
                    elapsed,
                    total_duration,
                    target_vus,
                    iterations_total: collector.iterations_total(),
                    requests_total,
                    failed_requests_total: collector.failed_requests_total(),
                    rps_now: delta as f64 / dt.as_secs_f64().max(1e-9),
                });
            }
        })
    });

    // A profile whose every target is zero spawns no VUs but still spans its
    // configured duration; zero iterations is a valid outcome.
    if max_vus == 0 {
        tokio::select! {
            _ = tokio::time::sleep(total_duration) => {}
            _ = stop.stopped() => {}
        }
    }

    for h in handles {
        h.await?;
    }

    if let Some(h) = progress_handle {
        h.abort();
        let _ = h.await;
    }

    let elapsed = started.elapsed();
    let ended_at = SystemTime::now();

    let snapshot = collector.snapshot(elapsed);
    let verdicts = evaluate_thresholds(&config.thresholds, &snapshot);

    Ok(RunResult::assemble(
        RunMeta {
            profile: config.profile_name,
            base_url: config.base_url,
            seed,
            started_at,
            ended_at,
            elapsed,
        },
        snapshot,
        verdicts,
    ))
}

/// Per-VU stream seed: splitmix64 over the run seed and VU index, so every
/// VU gets an independent deterministic stream.
fn vu_seed(seed: u64, vu_id: u64) -> u64 {
    let mut z = seed
        .wrapping_add(vu_id.wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
