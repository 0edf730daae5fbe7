#[cfg(test)]
mod tests {
    use life_stepper::{
        CellSet, Config, EngineAdapter, GameModel, Error, Result, Rule, Advance, StepScheduler,
        StepSignal, StepSignals,
    };
    use std::time::Duration;
    use tokio::time::{sleep, Instant};

    fn scheduler(buffer: usize) -> (StepScheduler, StepSignals) {
        StepScheduler::new(&Config {
            signal_buffer: buffer,
            ..Config::default()
        })
    }

    /// Waits for `n` signals and returns them with their arrival times.
    async fn collect(signals: &mut StepSignals, n: usize) -> Vec<(StepSignal, Instant)> {
        let mut res = Vec::new();
        for _ in 0..n {
            let signal = signals.recv().await.unwrap();
            res.push((signal, Instant::now()));
        }
        res
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_runs_one_timer() {
        let (mut scheduler, mut signals) = scheduler(16);
        scheduler.set_cadence(100.);
        let started = Instant::now();
        scheduler.start();
        scheduler.start();
        assert!(scheduler.is_running());
        assert_eq!(scheduler.active_timers(), 1);

        let ticks = collect(&mut signals, 3).await;
        let numbers: Vec<_> = ticks.iter().map(|(s, _)| s.tick).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        for (i, (_, at)) in ticks.iter().enumerate() {
            assert_eq!(*at - started, Duration::from_millis(100 * (i as u64 + 1)));
        }
        assert!(signals.try_recv().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let (mut scheduler, mut signals) = scheduler(16);
        scheduler.set_cadence(10.);
        scheduler.stop();
        scheduler.start();
        sleep(Duration::from_millis(35)).await;
        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_running());

        sleep(Duration::from_millis(100)).await;
        assert_eq!(scheduler.active_timers(), 0);
        let mut received = 0;
        while signals.try_recv().is_some() {
            received += 1;
        }
        assert_eq!(received, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cadence_change_restarts_timer() {
        let (mut scheduler, mut signals) = scheduler(16);
        scheduler.set_cadence(100.);
        scheduler.start();
        sleep(Duration::from_millis(150)).await;
        assert_eq!(signals.try_recv().map(|s| s.tick), Some(1));

        let changed = Instant::now();
        scheduler.set_cadence(50.);
        assert!(scheduler.is_running());
        let ticks = collect(&mut signals, 2).await;
        assert_eq!(ticks[0].0.tick, 1);
        assert_eq!(ticks[0].1 - changed, Duration::from_millis(50));
        assert_eq!(ticks[1].1 - changed, Duration::from_millis(100));

        sleep(Duration::from_millis(1)).await;
        assert_eq!(scheduler.active_timers(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cadence_change_while_stopped() {
        let (mut scheduler, mut signals) = scheduler(16);
        scheduler.set_cadence(20.);
        assert!(!scheduler.is_running());
        sleep(Duration::from_millis(100)).await;
        assert!(signals.try_recv().is_none());
        assert_eq!(scheduler.active_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_consumer_drops_ticks() {
        let (mut scheduler, mut signals) = scheduler(1);
        scheduler.set_cadence(10.);
        scheduler.start();
        sleep(Duration::from_millis(105)).await;
        assert_eq!(signals.try_recv().map(|s| s.tick), Some(1));
        assert!(signals.try_recv().is_none());
    }

    #[test]
    fn test_cadence_clamping() {
        let (mut scheduler, _signals) = scheduler(1);
        assert_eq!(scheduler.period(), Duration::from_secs_f64(1. / 30.));
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 0., -10.] {
            scheduler.set_cadence(bad);
            assert_eq!(scheduler.period(), Duration::from_millis(1), "{bad}");
        }
        scheduler.set_steps_per_second(1000.);
        assert_eq!(scheduler.period(), Duration::from_secs_f64(1. / 60.));
        scheduler.set_steps_per_second(0.);
        assert_eq!(scheduler.period(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_scheduler_closes_signals() {
        let (mut scheduler, mut signals) = scheduler(4);
        scheduler.start();
        drop(scheduler);
        assert_eq!(signals.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_model_follows_scheduler() {
        let (mut scheduler, mut signals) = scheduler(16);
        scheduler.set_cadence(100.);
        scheduler.start();
        tokio::spawn(async move {
            sleep(Duration::from_millis(350)).await;
            drop(scheduler);
        });

        let mut model = GameModel::default();
        model.load([(0, 1), (1, 1), (2, 1)].into_iter().collect(), 0);
        model.follow(&mut signals).await.unwrap();
        assert_eq!(model.generation(), 3);
        assert_eq!(model.population(), 3);
    }

    struct Broken;

    impl EngineAdapter for Broken {
        fn run(&mut self, cells: &CellSet, generations: u64, _rule: &Rule) -> Result<Advance> {
            Ok(Advance {
                cells: cells.clone(),
                generations: generations * 2,
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_stops_on_step_error() {
        let (mut scheduler, mut signals) = scheduler(16);
        scheduler.set_cadence(10.);
        scheduler.start();
        let mut model = GameModel::default().with_engine(Broken);
        let res = model.follow(&mut signals).await;
        assert_eq!(
            res,
            Err(Error::AdapterMismatch {
                requested: 1,
                reported: 2
            })
        );
        assert!(scheduler.is_running());
    }
}
