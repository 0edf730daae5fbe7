use std::time::{Duration, Instant};

/// Smoothed rate of generations over wall-clock time.
pub struct RateMeter {
    last_commit: Option<Instant>,
    seconds_per_generation_smoothed: f64,
    last_step_duration: Duration,
}

impl Default for RateMeter {
    fn default() -> Self {
        Self {
            last_commit: None,
            seconds_per_generation_smoothed: 0.,
            last_step_duration: Duration::ZERO,
        }
    }
}

impl RateMeter {
    const SMOOTHING: f64 = 0.1;

    /// Generations per second, `0` until two commits have been observed.
    pub fn generations_per_second(&self) -> f64 {
        if self.seconds_per_generation_smoothed > 0. {
            1. / self.seconds_per_generation_smoothed
        } else {
            0.
        }
    }

    /// Time the engine spent on the last step.
    pub fn last_step_duration(&self) -> Duration {
        self.last_step_duration
    }

    /// Records a commit of `generations` generations whose engine work took
    /// `step_duration`.
    pub fn record(&mut self, generations: u64, step_duration: Duration) {
        let now = Instant::now();
        self.last_step_duration = step_duration;
        if let Some(prev) = self.last_commit.replace(now) {
            if generations == 0 {
                return;
            }
            let per_generation = (now - prev).as_secs_f64() / generations as f64;
            if self.seconds_per_generation_smoothed == 0. {
                self.seconds_per_generation_smoothed = per_generation;
            } else {
                self.seconds_per_generation_smoothed +=
                    (per_generation - self.seconds_per_generation_smoothed) * Self::SMOOTHING;
            }
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
