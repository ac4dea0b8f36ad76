use std::time::Duration;

use crate::config::{LoadProfile, Stage};

/// Target-concurrency-over-time function for one run.
///
/// Flat profiles become a single constant stage; staged profiles interpolate
/// linearly between consecutive targets, rounding to the nearest integer.
#[derive(Debug, Clone)]
pub struct StageSchedule {
    start: u64,
    stages: Vec<Stage>,
    cumulative_ends: Vec<Duration>,
}

impl StageSchedule {
    pub fn new(start: u64, stages: Vec<Stage>) -> Self {
        let mut cumulative_ends = Vec::with_capacity(stages.len());
        let mut acc = Duration::ZERO;
        for s in &stages {
            acc = acc.saturating_add(s.duration);
            cumulative_ends.push(acc);
        }

        Self {
            start,
            stages,
            cumulative_ends,
        }
    }

    pub fn from_profile(profile: &LoadProfile) -> Self {
        match profile {
            LoadProfile::Flat { vus, duration } => Self::new(
                *vus,
                vec![Stage {
                    duration: *duration,
                    target: *vus,
                }],
            ),
            LoadProfile::Staged { start, stages } => Self::new(*start, stages.clone()),
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.cumulative_ends
            .last()
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_done(&self, elapsed: Duration) -> bool {
        elapsed >= self.total_duration()
    }

    fn stage_index(&self, elapsed: Duration) -> usize {
        match self
            .cumulative_ends
            .binary_search_by(|end| end.cmp(&elapsed))
        {
            Ok(i) => i,
            Err(i) => i,
        }
    }

    /// Target VU count at `elapsed`, rounded to the nearest integer.
    pub fn target_at(&self, elapsed: Duration) -> u64 {
        if self.stages.is_empty() || elapsed.is_zero() {
            return self.start;
        }
        if elapsed >= self.total_duration() {
            return self.stages.last().map(|s| s.target).unwrap_or(self.start);
        }

        let idx = self.stage_index(elapsed);
        let stage_start = if idx == 0 {
            Duration::ZERO
        } else {
            self.cumulative_ends[idx - 1]
        };
        let stage = &self.stages[idx];
        let stage_elapsed = elapsed.saturating_sub(stage_start);

        let from = if idx == 0 {
            self.start
        } else {
            self.stages[idx - 1].target
        };
        let to = stage.target;

        if stage.duration.is_zero() {
            return to;
        }

        let frac = stage_elapsed.as_secs_f64() / stage.duration.as_secs_f64();
        let value = from as f64 + (to as f64 - from as f64) * frac;
        value.round().max(0.0) as u64
    }

    /// How long an inactive VU with 1-based index `vu_index` should sleep
    /// before re-checking whether the ramp has reached it.
    pub fn next_recheck_in(&self, elapsed: Duration, vu_index: u64) -> Duration {
        let default_sleep = Duration::from_millis(50);

        if self.stages.is_empty() {
            return default_sleep;
        }
        let total = self.total_duration();
        if elapsed >= total {
            return Duration::ZERO;
        }

        let idx = self.stage_index(elapsed);
        let stage_end = self.cumulative_ends[idx];
        let stage_start = if idx == 0 {
            Duration::ZERO
        } else {
            self.cumulative_ends[idx - 1]
        };
        let stage = &self.stages[idx];
        let stage_elapsed = elapsed.saturating_sub(stage_start);

        let from = if idx == 0 {
            self.start
        } else {
            self.stages[idx - 1].target
        };
        let to = stage.target;

        // Flat or falling target: this VU cannot activate within the stage.
        if to <= from || vu_index > to {
            return stage_end.saturating_sub(elapsed).min(default_sleep);
        }

        // Rising ramp: estimate when the rounded target first reaches the
        // index (the linear value crosses index - 0.5).
        let want = (vu_index as f64 - 0.5).max(0.0);
        if (from as f64) >= want {
            return Duration::from_millis(1);
        }

        let frac = (want - from as f64) / (to as f64 - from as f64);
        let needed = stage.duration.mul_f64(frac.clamp(0.0, 1.0));
        needed
            .saturating_sub(stage_elapsed)
            .min(default_sleep)
            .max(Duration::from_millis(1))
    }
}
