use crate::{Config, Error};
use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{error, info, trace};

/// Request to advance the model by one step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepSignal {
    /// Number of the tick within the timer that emitted it, starting at 1.
    pub tick: u64,
}

/// Receiving side of the scheduler.
pub struct StepSignals {
    receiver: mpsc::Receiver<StepSignal>,
}

impl StepSignals {
    /// Waits for the next signal; `None` once the scheduler is gone.
    pub async fn recv(&mut self) -> Option<StepSignal> {
        self.receiver.recv().await
    }

    /// Returns a pending signal without waiting.
    pub fn try_recv(&mut self) -> Option<StepSignal> {
        self.receiver.try_recv().ok()
    }
}

struct ActiveTimer(Arc<AtomicUsize>);

impl ActiveTimer {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for ActiveTimer {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Periodic timer emitting [`StepSignal`]s.
///
/// At most one timer task exists at a time. Ticks the consumer can't take
/// are dropped instead of queued, so a slow model never accumulates backlog.
pub struct StepScheduler {
    sender: mpsc::Sender<StepSignal>,
    period: Duration,
    handle: Option<JoinHandle<()>>,
    // bumped on every cancellation; a task with a stale epoch never emits
    epoch: Arc<AtomicU64>,
    active: Arc<AtomicUsize>,
}

impl StepScheduler {
    pub fn new(config: &Config) -> (Self, StepSignals) {
        let (sender, receiver) = mpsc::channel(config.signal_buffer.max(1));
        let scheduler = Self {
            sender,
            period: Self::period_from_ms(config.period_ms()),
            handle: None,
            epoch: Arc::new(AtomicU64::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
        };
        (scheduler, StepSignals { receiver })
    }

    fn period_from_ms(period_ms: f64) -> Duration {
        let period_ms = if period_ms.is_finite() && period_ms > 0. {
            period_ms.max(Config::MIN_PERIOD_MS)
        } else {
            Config::MIN_PERIOD_MS
        };
        Duration::from_secs_f64(period_ms / 1000.)
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of timer tasks that have not finished yet.
    pub fn active_timers(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Starts emitting signals, one period from now. No-op if already running.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        self.spawn_timer();
        info!(period = ?self.period, "step scheduler started");
    }

    /// Stops emitting signals. No-op if not running.
    pub fn stop(&mut self) {
        if self.cancel_timer() {
            info!("step scheduler stopped");
        }
    }

    /// Changes the timer period; a running timer is replaced by one with the
    /// new period.
    pub fn set_cadence(&mut self, period_ms: f64) {
        self.period = Self::period_from_ms(period_ms);
        info!(period = ?self.period, "step cadence changed");
        if self.cancel_timer() {
            self.spawn_timer();
        }
    }

    pub fn set_steps_per_second(&mut self, steps_per_second: f64) {
        self.set_cadence(1000. / Config::clamp_steps_per_second(steps_per_second));
    }

    /// Returns whether a timer was running.
    fn cancel_timer(&mut self) -> bool {
        let Some(handle) = self.handle.take() else {
            return false;
        };
        self.epoch.fetch_add(1, Ordering::SeqCst);
        handle.abort();
        true
    }

    fn spawn_timer(&mut self) {
        if self.handle.is_some() {
            error!(error = %Error::SchedulerTimerConflict, "keeping the existing timer");
            return;
        }
        let epoch = self.epoch.load(Ordering::SeqCst);
        let current_epoch = self.epoch.clone();
        let sender = self.sender.clone();
        let period = self.period;
        let guard = ActiveTimer::new(&self.active);

        self.handle = Some(tokio::spawn(async move {
            let _guard = guard;
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut tick = 0;
            loop {
                interval.tick().await;
                if current_epoch.load(Ordering::SeqCst) != epoch {
                    break;
                }
                tick += 1;
                match sender.try_send(StepSignal { tick }) {
                    Ok(()) => trace!(tick, "step signal"),
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        trace!(tick, "consumer busy, dropping step signal")
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
        }));
    }
}

impl Drop for StepScheduler {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_periods_are_clamped() {
        for period in [f64::NAN, f64::INFINITY, -5., 0., 0.25] {
            assert_eq!(
                StepScheduler::period_from_ms(period),
                Duration::from_millis(1),
                "period = {period}"
            );
        }
        assert_eq!(StepScheduler::period_from_ms(250.), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn conflicting_spawn_keeps_existing_timer() {
        let (mut scheduler, _signals) = StepScheduler::new(&Config::default());
        scheduler.start();
        scheduler.spawn_timer();
        assert_eq!(scheduler.active_timers(), 1);
        scheduler.stop();
    }
}
