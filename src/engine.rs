use crate::{Advance, CellSet, Config, EngineAdapter, Error, HashLifeEngine, NaiveEngine, Result, Rule};
use std::{fmt, str::FromStr};

/// Which engine variant the model steps with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EngineMode {
    /// One generation per cell-by-cell update.
    #[default]
    Naive,
    /// Hashlife, fed in batches of `Config::generation_batch_size`.
    Accelerated,
}

impl fmt::Display for EngineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EngineMode::Naive => "naive",
            EngineMode::Accelerated => "hashlife",
        })
    }
}

impl FromStr for EngineMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "naive" | "normal" => Ok(EngineMode::Naive),
            "hashlife" | "accelerated" => Ok(EngineMode::Accelerated),
            other => Err(format!("unknown engine mode {other:?}")),
        }
    }
}

/// Built-in engines, selected by [`EngineMode`].
pub enum Engine {
    Naive(NaiveEngine),
    HashLife(HashLifeEngine),
}

impl Engine {
    pub fn for_mode(mode: EngineMode, config: &Config) -> Self {
        match mode {
            EngineMode::Naive => Engine::Naive(NaiveEngine::new()),
            EngineMode::Accelerated => {
                Engine::HashLife(HashLifeEngine::new(config.memory_cap_log2))
            }
        }
    }

    pub fn mode(&self) -> EngineMode {
        match self {
            Engine::Naive(_) => EngineMode::Naive,
            Engine::HashLife(_) => EngineMode::Accelerated,
        }
    }
}

impl EngineAdapter for Engine {
    fn run(&mut self, cells: &CellSet, generations: u64, rule: &Rule) -> Result<Advance> {
        if generations == 0 {
            return Err(Error::InvalidGenerations(generations));
        }
        match self {
            Engine::Naive(e) => e.run(cells, generations, rule),
            Engine::HashLife(e) => e.run(cells, generations, rule),
        }
    }

    fn clear_cache(&mut self) {
        match self {
            Engine::Naive(e) => e.clear_cache(),
            Engine::HashLife(e) => e.clear_cache(),
        }
    }

    fn bytes_total(&self) -> usize {
        match self {
            Engine::Naive(e) => e.bytes_total(),
            Engine::HashLife(e) => e.bytes_total(),
        }
    }

    fn statistics(&self) -> String {
        match self {
            Engine::Naive(e) => e.statistics(),
            Engine::HashLife(e) => e.statistics(),
        }
    }
}
