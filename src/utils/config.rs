use crate::{EngineMode, Rule};
use std::str::FromStr;
use tracing::warn;

/// Settings shared by the model, the scheduler and the stability detector.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Target cadence of the step scheduler.
    pub steps_per_second: f64,
    pub engine_mode: EngineMode,
    /// Generations per engine call in accelerated mode.
    pub generation_batch_size: u64,
    pub rule: Rule,
    /// Step budget of the stability detector.
    pub max_steps: u64,
    /// Hashlife clears its memo tables once it holds more than `2^memory_cap_log2` nodes.
    pub memory_cap_log2: u32,
    /// Capacity of the scheduler's signal channel; ticks beyond it are dropped.
    pub signal_buffer: usize,
    pub population_history_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            steps_per_second: Self::DEFAULT_STEPS_PER_SECOND,
            engine_mode: EngineMode::Naive,
            generation_batch_size: 1,
            rule: Rule::CONWAY,
            max_steps: Self::DEFAULT_MAX_STEPS,
            memory_cap_log2: 20,
            signal_buffer: 1,
            population_history_len: 1000,
        }
    }
}

impl Config {
    pub const DEFAULT_STEPS_PER_SECOND: f64 = 30.;
    pub const MIN_STEPS_PER_SECOND: f64 = 1.;
    pub const MAX_STEPS_PER_SECOND: f64 = 60.;

    /// Smallest timer period the scheduler accepts.
    pub const MIN_PERIOD_MS: f64 = 1.;

    pub const DEFAULT_MAX_STEPS: u64 = 200;

    pub const MIN_MEMORY_CAP_LOG2: u32 = 10;
    pub const MAX_MEMORY_CAP_LOG2: u32 = 30;

    /// Timer period in milliseconds derived from `steps_per_second`.
    pub fn period_ms(&self) -> f64 {
        1000. / Self::clamp_steps_per_second(self.steps_per_second)
    }

    pub fn clamp_steps_per_second(sps: f64) -> f64 {
        if sps.is_nan() {
            Self::DEFAULT_STEPS_PER_SECOND
        } else {
            sps.clamp(Self::MIN_STEPS_PER_SECOND, Self::MAX_STEPS_PER_SECOND)
        }
    }

    /// Reads overrides from `LIFE_SPS`, `LIFE_ENGINE`, `LIFE_BATCH`, `LIFE_RULE`,
    /// `LIFE_MAX_STEPS` and `LIFE_MEMORY_CAP_LOG2`.
    ///
    /// Unparsable values are reported and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(sps) = env_var::<f64>("LIFE_SPS") {
            config.steps_per_second = Self::clamp_steps_per_second(sps);
        }
        if let Some(mode) = env_var::<EngineMode>("LIFE_ENGINE") {
            config.engine_mode = mode;
        }
        if let Some(batch) = env_var::<u64>("LIFE_BATCH") {
            if batch == 0 {
                warn!("LIFE_BATCH must be at least 1, keeping {}", config.generation_batch_size);
            } else {
                config.generation_batch_size = batch;
            }
        }
        if let Some(rule) = env_var::<Rule>("LIFE_RULE") {
            config.rule = rule;
        }
        if let Some(max_steps) = env_var::<u64>("LIFE_MAX_STEPS") {
            config.max_steps = max_steps.max(1);
        }
        if let Some(cap) = env_var::<u32>("LIFE_MEMORY_CAP_LOG2") {
            config.memory_cap_log2 = cap.clamp(Self::MIN_MEMORY_CAP_LOG2, Self::MAX_MEMORY_CAP_LOG2);
        }
        config
    }
}

fn env_var<T>(name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(%err, value = raw.as_str(), "ignoring {name}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_follows_clamped_rate() {
        let mut config = Config::default();
        assert!((config.period_ms() - 1000. / 30.).abs() < 1e-9);
        config.steps_per_second = 500.;
        assert!((config.period_ms() - 1000. / 60.).abs() < 1e-9);
        config.steps_per_second = 0.;
        assert!((config.period_ms() - 1000.).abs() < 1e-9);
        config.steps_per_second = f64::NAN;
        assert!((config.period_ms() - 1000. / 30.).abs() < 1e-9);
    }
}
