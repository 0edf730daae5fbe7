#![warn(clippy::all)]

use anyhow::{Context, Result};
use life_stepper::{
    CellSet, Config, GameModel, NiceInt, SharedModel, StabilityDetector, StepScheduler,
};
use std::{sync::Arc, time::Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// How long the scheduler-driven part of the demo runs.
const DRIVE_FOR: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    info!(
        rule = %config.rule,
        engine = %config.engine_mode,
        batch = config.generation_batch_size,
        steps_per_second = config.steps_per_second,
        "starting"
    );

    let r_pentomino: CellSet = [(1, 0), (2, 0), (0, 1), (1, 1), (1, 2)].into_iter().collect();

    let mut model = GameModel::new(config.clone());
    model.load(r_pentomino.clone(), 0);
    let detector = StabilityDetector::new(config.max_steps);
    let outcome = detector
        .run(&mut model, |p| {
            if p.current % 50 == 0 || p.current == p.total {
                info!(current = p.current, total = p.total, "stability progress");
            }
        })
        .await
        .context("stability run failed")?;
    info!(
        steady = outcome.steady,
        steps = outcome.steps,
        generation = model.generation(),
        population = model.population(),
        "stability run finished"
    );

    model.load(r_pentomino, 0);
    let shared: SharedModel = Arc::new(tokio::sync::Mutex::new(model));
    let (mut scheduler, mut signals) = StepScheduler::new(&config);
    scheduler.start();

    let driver = {
        let shared = shared.clone();
        tokio::spawn(async move { GameModel::drive(shared, &mut signals).await })
    };
    tokio::time::sleep(DRIVE_FOR).await;
    // dropping the scheduler closes the channel and lets the driver finish
    drop(scheduler);
    driver
        .await
        .context("driver task panicked")?
        .context("scheduled stepping failed")?;

    let model = shared.lock().await;
    info!(
        generation = %NiceInt::from(model.generation()),
        population = %NiceInt::from_usize(model.population()),
        generations_per_second = model.generations_per_second(),
        "scheduled run finished"
    );
    for line in model.engine_statistics().lines() {
        info!("{line}");
    }
    Ok(())
}
