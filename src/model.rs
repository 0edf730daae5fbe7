use crate::{
    Advance, Cell, CellSet, Config, Engine, EngineAdapter, EngineMode, Error, RateMeter, Result,
    Rule, StateHash, Steppable, StepSignals,
};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Model shared between tasks; the async mutex hands it out in FIFO order.
pub type SharedModel = Arc<tokio::sync::Mutex<GameModel>>;

type SharedEngine = Arc<Mutex<Box<dyn EngineAdapter>>>;

/// Population window checked by [`Steppable::is_stable`].
const STABLE_WINDOW: usize = 50;
const STABLE_TOLERANCE: f64 = 3.;

/// State published to subscribers after every commit and every edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub generation: u64,
    pub cells: Arc<CellSet>,
}

/// Result of [`GameModel::step`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepReport {
    /// Generations asked for by the caller.
    pub requested: u64,
    /// Generations committed; at least `requested`, more when a batch rounds it up.
    pub generations: u64,
    pub engine_calls: u32,
    /// Generation counter after the step.
    pub generation: u64,
    pub population: usize,
    pub duration: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ModelState {
    Idle,
    Stepping,
}

/// Owner of the live cells and the generation counter.
///
/// Steps go through the current engine on the blocking thread pool; the
/// result replaces the live set in one piece, so readers either see the
/// state before the step or after it.
pub struct GameModel {
    config: Config,
    cells: Arc<CellSet>,
    generation: u64,
    engine: SharedEngine,
    engine_mode: EngineMode,
    custom_engine: bool,
    state: ModelState,
    snapshots: watch::Sender<Snapshot>,
    population_history: VecDeque<usize>,
    rate: RateMeter,
}

impl Default for GameModel {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl GameModel {
    pub fn new(config: Config) -> Self {
        let engine: Box<dyn EngineAdapter> = Box::new(Engine::for_mode(config.engine_mode, &config));
        let cells = Arc::new(CellSet::new());
        let (snapshots, _) = watch::channel(Snapshot {
            generation: 0,
            cells: cells.clone(),
        });
        Self {
            engine_mode: config.engine_mode,
            config,
            cells,
            generation: 0,
            engine: Arc::new(Mutex::new(engine)),
            custom_engine: false,
            state: ModelState::Idle,
            snapshots,
            population_history: VecDeque::new(),
            rate: RateMeter::default(),
        }
    }

    /// Replaces the engine of the current mode with `adapter`, until the
    /// mode is changed.
    pub fn with_engine(mut self, adapter: impl EngineAdapter + 'static) -> Self {
        self.engine = Arc::new(Mutex::new(Box::new(adapter)));
        self.custom_engine = true;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Current live cells. The snapshot is never modified afterwards.
    pub fn cells(&self) -> Arc<CellSet> {
        self.cells.clone()
    }

    pub fn population(&self) -> usize {
        self.cells.len()
    }

    pub fn state_hash(&self) -> StateHash {
        self.cells.state_hash()
    }

    pub fn is_cell_alive(&self, x: i64, y: i64) -> bool {
        self.cells.contains(Cell::new(x, y))
    }

    pub fn set_cell_alive(&mut self, x: i64, y: i64, alive: bool) {
        let cell = Cell::new(x, y);
        if self.cells.contains(cell) == alive {
            return;
        }
        let cells = Arc::make_mut(&mut self.cells);
        if alive {
            cells.insert(cell);
        } else {
            cells.remove(cell);
        }
        self.publish();
    }

    /// Adds the cells of `shape` shifted by `(x, y)`, publishing once.
    pub fn place_shape(&mut self, x: i64, y: i64, shape: &CellSet) {
        if shape.is_empty() {
            return;
        }
        let cells = Arc::make_mut(&mut self.cells);
        for cell in shape {
            cells.insert(Cell::new(cell.x.wrapping_add(x), cell.y.wrapping_add(y)));
        }
        self.publish();
    }

    /// Removes every cell and resets the generation counter.
    pub fn clear(&mut self) {
        self.load(CellSet::new(), 0);
    }

    /// Replaces the state wholesale.
    pub fn load(&mut self, cells: CellSet, generation: u64) {
        self.cells = Arc::new(cells);
        self.generation = generation;
        self.population_history.clear();
        self.rate.reset();
        self.publish();
    }

    pub fn engine_mode(&self) -> EngineMode {
        self.engine_mode
    }

    /// Takes effect on the next step.
    pub fn set_engine_mode(&mut self, mode: EngineMode) {
        if mode == self.engine_mode && !self.custom_engine {
            return;
        }
        debug!(from = %self.engine_mode, to = %mode, "switching engine");
        self.engine = Arc::new(Mutex::new(Box::new(Engine::for_mode(mode, &self.config))));
        self.engine_mode = mode;
        self.custom_engine = false;
    }

    pub fn generation_batch_size(&self) -> u64 {
        self.config.generation_batch_size
    }

    /// Generations per engine call in accelerated mode.
    pub fn set_generation_batch_size(&mut self, batch: u64) -> Result<()> {
        if batch == 0 {
            return Err(Error::InvalidBatchSize(batch));
        }
        self.config.generation_batch_size = batch;
        Ok(())
    }

    pub fn rule(&self) -> Rule {
        self.config.rule
    }

    pub fn set_rule(&mut self, rule: Rule) {
        self.config.rule = rule;
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.subscribe()
    }

    /// Population after each of the most recent commits, oldest first.
    pub fn population_history(&self) -> &VecDeque<usize> {
        &self.population_history
    }

    /// `true` once the last `window` populations all stay within
    /// `tolerance` of their mean.
    pub fn is_stable(&self, window: usize, tolerance: f64) -> bool {
        let history = &self.population_history;
        if window == 0 || history.len() < window {
            return false;
        }
        let mut recent = history.range(history.len() - window..);
        let mean = recent.clone().sum::<usize>() as f64 / window as f64;
        recent.all(|&p| (p as f64 - mean).abs() <= tolerance)
    }

    /// Shortest period up to `max_period` the population history repeats
    /// with, matching on at least 90% of the last `max_period` commits.
    ///
    /// Needs `2 * max_period` recorded commits.
    pub fn detect_period(&self, max_period: usize) -> Option<usize> {
        let history = &self.population_history;
        let n = history.len();
        if max_period == 0 || n < 2 * max_period {
            return None;
        }
        (1..=max_period).find(|&period| {
            let matches = (0..max_period)
                .filter(|&i| history[n - 1 - i] == history[n - 1 - i - period])
                .count();
            matches * 10 >= max_period * 9
        })
    }

    pub fn generations_per_second(&self) -> f64 {
        self.rate.generations_per_second()
    }

    pub fn last_step_duration(&self) -> Duration {
        self.rate.last_step_duration()
    }

    /// `true` while a step is in flight, or if the last one was abandoned.
    pub fn is_stepping(&self) -> bool {
        self.state == ModelState::Stepping
    }

    pub fn engine_statistics(&self) -> String {
        match self.engine.try_lock() {
            Ok(engine) => engine.statistics(),
            Err(std::sync::TryLockError::Poisoned(e)) => e.into_inner().statistics(),
            Err(std::sync::TryLockError::WouldBlock) => "Engine busy\n".to_string(),
        }
    }

    /// Advances by `count` generations.
    ///
    /// In accelerated mode the engine is fed whole batches, so `count` is
    /// rounded up to a multiple of the batch size.
    pub async fn step(&mut self, count: u64) -> Result<StepReport> {
        if count == 0 {
            return Err(Error::InvalidGenerations(count));
        }
        if self.state == ModelState::Stepping {
            debug!("previous step was abandoned before it finished");
        }
        let (target, batch) = match self.engine_mode {
            EngineMode::Naive => (count, count),
            EngineMode::Accelerated => {
                let batch = self.config.generation_batch_size;
                (count.div_ceil(batch).saturating_mul(batch), batch)
            }
        };
        if self.generation.checked_add(target).is_none() {
            return Err(Error::GenerationOverflow {
                generation: self.generation,
                requested: target,
            });
        }

        self.state = ModelState::Stepping;
        let res = self.advance(count, target, batch).await;
        self.state = ModelState::Idle;
        res
    }

    async fn advance(&mut self, requested: u64, target: u64, batch: u64) -> Result<StepReport> {
        let started = Instant::now();
        let mut advanced = 0;
        let mut engine_calls = 0;

        while advanced < target {
            let want = batch.min(target - advanced);
            let res = self.run_engine(want).await?;
            engine_calls += 1;
            if res.generations == 0 || res.generations > want {
                warn!(requested = want, reported = res.generations, "engine report rejected");
                return Err(Error::AdapterMismatch {
                    requested: want,
                    reported: res.generations,
                });
            }
            if res.generations < want {
                debug!(
                    requested = want,
                    reported = res.generations,
                    "partial advance, requesting the rest"
                );
            }
            advanced += res.generations;
            self.commit(res);
        }

        let duration = started.elapsed();
        self.rate.record(advanced, duration);
        debug!(
            requested,
            generations = advanced,
            engine_calls,
            generation = self.generation,
            population = self.cells.len(),
            ?duration,
            "step committed"
        );
        Ok(StepReport {
            requested,
            generations: advanced,
            engine_calls,
            generation: self.generation,
            population: self.cells.len(),
            duration,
        })
    }

    async fn run_engine(&self, generations: u64) -> Result<Advance> {
        let engine = self.engine.clone();
        let cells = self.cells.clone();
        let rule = self.config.rule;
        tokio::task::spawn_blocking(move || {
            let mut engine = engine.lock().unwrap_or_else(PoisonError::into_inner);
            engine.run(&cells, generations, &rule)
        })
        .await
        .map_err(|e| Error::EngineTask(e.to_string()))?
    }

    fn commit(&mut self, res: Advance) {
        self.cells = Arc::new(res.cells);
        self.generation = self.generation.saturating_add(res.generations);
        self.population_history.push_back(self.cells.len());
        while self.population_history.len() > self.config.population_history_len {
            self.population_history.pop_front();
        }
        self.publish();
    }

    fn publish(&self) {
        self.snapshots.send_replace(Snapshot {
            generation: self.generation,
            cells: self.cells.clone(),
        });
    }

    /// Steps once per scheduler signal until the scheduler goes away.
    ///
    /// A failed step ends the loop and is returned.
    pub async fn follow(&mut self, signals: &mut StepSignals) -> Result<()> {
        while signals.recv().await.is_some() {
            self.step(1).await?;
        }
        Ok(())
    }

    /// Same as [`GameModel::follow`], locking the shared model for each step.
    pub async fn drive(model: SharedModel, signals: &mut StepSignals) -> Result<()> {
        while signals.recv().await.is_some() {
            model.lock().await.step(1).await?;
        }
        Ok(())
    }
}

impl Steppable for GameModel {
    async fn step_once(&mut self) -> Result<()> {
        self.step(1).await.map(|_| ())
    }

    fn state_hash(&self) -> Option<StateHash> {
        Some(self.cells.state_hash())
    }

    fn is_stable(&self) -> bool {
        GameModel::is_stable(self, STABLE_WINDOW, STABLE_TOLERANCE)
    }
}
