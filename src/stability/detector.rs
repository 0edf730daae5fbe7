use crate::{Config, Result, StateHash};
use ahash::AHashSet as HashSet;
use std::future::Future;
use tracing::debug;

/// Something the detector can advance one step at a time.
pub trait Steppable {
    /// Advances by one step.
    fn step_once(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Fingerprint of the current state. When it's `None`, repetition is not
    /// tracked and only [`Steppable::is_stable`] ends the run early.
    fn state_hash(&self) -> Option<StateHash> {
        None
    }

    fn is_stable(&self) -> bool {
        false
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    pub current: u64,
    pub total: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Outcome {
    /// A state repeated (or the predicate held) before the budget ran out.
    pub steady: bool,
    pub steps: u64,
}

/// Steps a target until its state repeats or the step budget is spent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StabilityDetector {
    max_steps: u64,
}

impl Default for StabilityDetector {
    fn default() -> Self {
        Self::new(Config::DEFAULT_MAX_STEPS)
    }
}

impl StabilityDetector {
    pub fn new(max_steps: u64) -> Self {
        Self {
            max_steps: max_steps.max(1),
        }
    }

    pub fn max_steps(&self) -> u64 {
        self.max_steps
    }

    /// A step error ends the run and is returned as is.
    ///
    /// Dropping the returned future stops the run between steps.
    pub async fn run<S, F>(&self, target: &mut S, mut on_progress: F) -> Result<Outcome>
    where
        S: Steppable,
        F: FnMut(Progress),
    {
        let mut seen = HashSet::new();
        let tracking = match target.state_hash() {
            Some(hash) => {
                seen.insert(hash);
                true
            }
            None => false,
        };

        let mut steps = 0;
        while steps < self.max_steps {
            if !tracking && target.is_stable() {
                return Ok(self.finish(true, steps));
            }

            target.step_once().await?;
            steps += 1;
            on_progress(Progress {
                current: steps,
                total: self.max_steps,
            });

            if tracking {
                if let Some(hash) = target.state_hash() {
                    if !seen.insert(hash) {
                        return Ok(self.finish(true, steps));
                    }
                }
            } else if target.is_stable() {
                return Ok(self.finish(true, steps));
            }
        }
        Ok(self.finish(false, steps))
    }

    fn finish(&self, steady: bool, steps: u64) -> Outcome {
        debug!(steady, steps, max_steps = self.max_steps, "stability run finished");
        Outcome { steady, steps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    /// Counts up to `limit` and then stays there.
    struct Counter {
        value: u64,
        limit: u64,
        hashed: bool,
    }

    impl Steppable for Counter {
        async fn step_once(&mut self) -> Result<()> {
            self.value = (self.value + 1).min(self.limit);
            Ok(())
        }

        fn state_hash(&self) -> Option<StateHash> {
            self.hashed.then_some(StateHash(self.value as u128))
        }

        fn is_stable(&self) -> bool {
            self.value == self.limit
        }
    }

    struct Failing;

    impl Steppable for Failing {
        async fn step_once(&mut self) -> Result<()> {
            Err(Error::InvalidGenerations(0))
        }
    }

    #[tokio::test]
    async fn repeat_ends_run() {
        let mut counter = Counter {
            value: 0,
            limit: 3,
            hashed: true,
        };
        let mut progress = Vec::new();
        let outcome = StabilityDetector::new(10)
            .run(&mut counter, |p| progress.push(p.current))
            .await
            .unwrap();
        // 0 -> 1 -> 2 -> 3 -> 3
        assert_eq!(outcome, Outcome { steady: true, steps: 4 });
        assert_eq!(progress, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn predicate_checked_before_first_step() {
        let mut counter = Counter {
            value: 3,
            limit: 3,
            hashed: false,
        };
        let outcome = StabilityDetector::new(10).run(&mut counter, |_| {}).await.unwrap();
        assert_eq!(outcome, Outcome { steady: true, steps: 0 });
    }

    #[tokio::test]
    async fn budget_is_clamped() {
        let mut counter = Counter {
            value: 0,
            limit: 100,
            hashed: true,
        };
        let detector = StabilityDetector::new(0);
        assert_eq!(detector.max_steps(), 1);
        let outcome = detector.run(&mut counter, |_| {}).await.unwrap();
        assert_eq!(outcome, Outcome { steady: false, steps: 1 });
    }

    #[tokio::test]
    async fn step_error_propagates() {
        let res = StabilityDetector::default().run(&mut Failing, |_| {}).await;
        assert_eq!(res, Err(Error::InvalidGenerations(0)));
    }
}
