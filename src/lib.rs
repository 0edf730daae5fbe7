mod engine;
mod error;
mod model;
mod naive;
mod quadtree;
mod scheduler;
mod stability;
mod utils;

pub use engine::{Engine, EngineMode};
pub use error::{Error, Result};
pub use model::{GameModel, SharedModel, Snapshot, StepReport};
pub use naive::NaiveEngine;
pub use quadtree::HashLifeEngine;
pub use scheduler::{StepScheduler, StepSignal, StepSignals};
pub use stability::{
    HeuristicConfig, Outcome, Progress, StabilityDetector, SteadyHeuristic, SteadyMode, Steppable,
    Verdict,
};
pub use utils::{
    Advance, Bounds, Cell, CellSet, Config, EngineAdapter, NiceInt, RateMeter, Rule, StateHash,
};
