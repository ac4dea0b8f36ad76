use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rand_chacha::ChaCha8Rng;
use tokio::sync::{Barrier, Notify};

use crate::collector::Collector;
use crate::scenario::{ScenarioEnv, run_scenario};
use crate::schedule::StageSchedule;
use crate::selector::WeightedSelector;
use crate::transport::Transport;

/// Opens once, after every VU has initialized, so setup cost stays out of the
/// measured window and all VUs observe the same start instant.
#[derive(Debug, Default)]
pub(crate) struct StartSignal {
    started: AtomicBool,
    notify: Notify,
}

impl StartSignal {
    pub(crate) fn start(&self) {
        self.started.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub(crate) async fn wait(&self) {
        while !self.started.load(Ordering::Acquire) {
            self.notify.notified().await;
        }
    }
}

/// External run cancellation. Observed between iterations only; in-flight
/// requests always finish (or time out) first.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Resolve once the signal fires (immediately if it already has).
    pub async fn stopped(&self) {
        while !self.stopped.load(Ordering::Acquire) {
            self.notify.notified().await;
        }
    }
}

pub(crate) struct VuContext<T> {
    /// 1-based index; a VU is active while `vu_id <= target(elapsed)`.
    pub(crate) vu_id: u64,
    pub(crate) schedule: Arc<StageSchedule>,
    pub(crate) selector: Arc<WeightedSelector>,
    pub(crate) env: Arc<ScenarioEnv<T>>,
    pub(crate) collector: Arc<Collector>,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) run_started: Arc<OnceLock<Instant>>,
    pub(crate) ready_barrier: Arc<Barrier>,
    pub(crate) start_signal: Arc<StartSignal>,
    pub(crate) stop: Arc<StopSignal>,
}

/// One virtual user: wait for the start, then iterate while the schedule
/// keeps this index active. Retirement (ramp-down, run end, external stop)
/// only ever takes effect at an iteration boundary.
pub(crate) async fn run_vu<T: Transport>(mut ctx: VuContext<T>) {
    ctx.ready_barrier.wait().await;
    ctx.start_signal.wait().await;

    let started = ctx
        .run_started
        .get()
        .copied()
        .unwrap_or_else(Instant::now);

    loop {
        let elapsed = started.elapsed();
        if ctx.schedule.is_done(elapsed) || ctx.stop.is_stopped() {
            break;
        }

        let target = ctx.schedule.target_at(elapsed);
        if ctx.vu_id > target {
            let wait = ctx.schedule.next_recheck_in(elapsed, ctx.vu_id);
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
            continue;
        }

        let kind = ctx.selector.pick(&mut ctx.rng);
        let iteration_started = Instant::now();
        run_scenario(kind, &ctx.env, &mut ctx.rng).await;
        ctx.collector
            .record_iteration(&kind.to_string(), iteration_started.elapsed());
    }
}
