mod detector;
mod heuristic;

pub use detector::{Outcome, Progress, StabilityDetector, Steppable};
pub use heuristic::{HeuristicConfig, SteadyHeuristic, SteadyMode, Verdict};
