use crate::{CellSet, StateHash};
use ahash::AHashMap as HashMap;
use std::{collections::VecDeque, fmt};

/// Kind of long-running behaviour recognized by [`SteadyHeuristic`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SteadyMode {
    StillLife,
    Oscillator,
    Spaceship,
    /// Periodic core that keeps emitting cells (guns, puffers).
    PeriodicEmission,
}

impl fmt::Display for SteadyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SteadyMode::StillLife => "still-life",
            SteadyMode::Oscillator => "oscillator",
            SteadyMode::Spaceship => "spaceship",
            SteadyMode::PeriodicEmission => "periodic-with-emission",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub mode: SteadyMode,
    /// Step at which the behaviour was confirmed.
    pub step: u64,
    pub period: u64,
    /// Displacement per period, zero unless `mode` is a spaceship.
    pub dx: i64,
    pub dy: i64,
    pub confidence: u32,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeuristicConfig {
    pub confirmations_needed: u32,
    pub max_ship_period: u64,
    pub max_history_per_shape: usize,
    pub emission_min_history: usize,
    pub emission_max_period: usize,
    pub min_growth_per_period: i64,
    pub min_area_growth_per_period: i128,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            confirmations_needed: 3,
            max_ship_period: 512,
            max_history_per_shape: 4096,
            emission_min_history: 48,
            emission_max_period: 64,
            min_growth_per_period: 2,
            min_area_growth_per_period: 2,
        }
    }
}

/// What is remembered about one observed generation.
#[derive(Clone, Copy)]
struct Summary {
    step: u64,
    population: u64,
    area: u128,
    anchor_x: i64,
    anchor_y: i64,
    absolute: StateHash,
    normalized: StateHash,
}

impl Summary {
    fn new(step: u64, cells: &CellSet) -> Self {
        match cells.bounds() {
            Some(b) => Self {
                step,
                population: cells.len() as u64,
                area: b.area(),
                anchor_x: b.min_x,
                anchor_y: b.min_y,
                absolute: cells.state_hash(),
                normalized: cells.normalized().state_hash(),
            },
            None => Self {
                step,
                population: 0,
                area: 0,
                anchor_x: 0,
                anchor_y: 0,
                absolute: StateHash(0),
                normalized: StateHash(0),
            },
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum CandidateKey {
    Exact(StateHash, u64),
    Ship(StateHash, u64, i64, i64),
    Emission(usize),
}

#[derive(Clone, Copy)]
struct Candidate {
    key: CandidateKey,
    mode: SteadyMode,
    period: u64,
    dx: i64,
    dy: i64,
}

impl Candidate {
    /// Shorter period wins; at equal period an exact repeat beats a spaceship.
    fn preferred(current: Option<Candidate>, next: Candidate) -> Candidate {
        let Some(current) = current else {
            return next;
        };
        if next.period != current.period {
            return if next.period < current.period { next } else { current };
        }
        if current.mode == SteadyMode::Spaceship && next.mode != SteadyMode::Spaceship {
            next
        } else {
            current
        }
    }
}

struct Score {
    score: u32,
    last_step: u64,
    expected_gap: u64,
}

/// Classifies a run as steady once the same repetition has been seen
/// `confirmations_needed` times at its expected spacing.
///
/// Unlike plain hash repetition it also recognizes translating patterns and
/// patterns whose population keeps growing in a periodic way.
pub struct SteadyHeuristic {
    config: HeuristicConfig,
    by_shape: HashMap<StateHash, VecDeque<Summary>>,
    candidates: HashMap<CandidateKey, Score>,
    population_history: VecDeque<u64>,
    area_history: VecDeque<u128>,
}

impl Default for SteadyHeuristic {
    fn default() -> Self {
        Self::new(HeuristicConfig::default())
    }
}

impl SteadyHeuristic {
    pub fn new(config: HeuristicConfig) -> Self {
        Self {
            config,
            by_shape: HashMap::new(),
            candidates: HashMap::new(),
            population_history: VecDeque::new(),
            area_history: VecDeque::new(),
        }
    }

    /// Feeds the state reached at `step`. Steps must be increasing.
    pub fn observe(&mut self, step: u64, cells: &CellSet) -> Option<Verdict> {
        let summary = Summary::new(step, cells);
        let cycle = self.detect_cycle(&summary);
        self.store(summary);
        cycle.or_else(|| self.detect_emission(step))
    }

    fn detect_cycle(&mut self, summary: &Summary) -> Option<Verdict> {
        let matches = self.by_shape.get(&summary.normalized)?;
        let mut best = None;

        for previous in matches.iter().rev() {
            let period = summary.step.saturating_sub(previous.step);
            if period == 0 || period > self.config.max_ship_period {
                continue;
            }
            if summary.absolute == previous.absolute {
                let mode = if period == 1 {
                    SteadyMode::StillLife
                } else {
                    SteadyMode::Oscillator
                };
                let exact = Candidate {
                    key: CandidateKey::Exact(summary.normalized, period),
                    mode,
                    period,
                    dx: 0,
                    dy: 0,
                };
                best = Some(Candidate::preferred(best, exact));
            } else {
                let dx = summary.anchor_x.wrapping_sub(previous.anchor_x);
                let dy = summary.anchor_y.wrapping_sub(previous.anchor_y);
                if dx == 0 && dy == 0 {
                    continue;
                }
                let ship = Candidate {
                    key: CandidateKey::Ship(summary.normalized, period, dx, dy),
                    mode: SteadyMode::Spaceship,
                    period,
                    dx,
                    dy,
                };
                best = Some(Candidate::preferred(best, ship));
            }
            if period == 1 {
                break;
            }
        }

        let best = best?;
        let confidence = self.bump(best.key, summary.step, best.period);
        if confidence < self.config.confirmations_needed {
            return None;
        }
        let reason = if best.mode == SteadyMode::Spaceship {
            format!(
                "translation repeat confirmed (period={}, dx={}, dy={})",
                best.period, best.dx, best.dy
            )
        } else {
            format!("exact repeat confirmed (period={})", best.period)
        };
        Some(Verdict {
            mode: best.mode,
            step: summary.step,
            period: best.period,
            dx: best.dx,
            dy: best.dy,
            confidence,
            reason,
        })
    }

    fn detect_emission(&mut self, step: u64) -> Option<Verdict> {
        let n = self.population_history.len();
        if n < self.config.emission_min_history {
            return None;
        }
        let max_period = self.config.emission_max_period.min((n - 1) / 3);

        for period in 1..=max_period {
            if !self.deltas_repeat(period) {
                continue;
            }
            let last = n - 1;
            let growth =
                self.population_history[last] as i64 - self.population_history[last - period] as i64;
            let (now, then) = (self.area_history[last], self.area_history[last - period]);
            let area_growth = if now >= then {
                i128::try_from(now - then).unwrap_or(i128::MAX)
            } else {
                i128::try_from(then - now).map_or(i128::MIN, |d| -d)
            };
            if growth < self.config.min_growth_per_period
                && area_growth < self.config.min_area_growth_per_period
            {
                continue;
            }
            let confidence = self.bump(CandidateKey::Emission(period), step, 1);
            if confidence < self.config.confirmations_needed {
                continue;
            }
            return Some(Verdict {
                mode: SteadyMode::PeriodicEmission,
                step,
                period: period as u64,
                dx: 0,
                dy: 0,
                confidence,
                reason: format!("population/bounding growth repeats every {period} steps"),
            });
        }
        None
    }

    /// Whether the last three periods show the same population deltas.
    fn deltas_repeat(&self, period: usize) -> bool {
        let h = &self.population_history;
        let n = h.len();
        if n < period * 3 + 1 {
            return false;
        }
        let delta = |i: usize| h[i] as i64 - h[i - 1] as i64;
        (0..period).all(|i| {
            let d0 = delta(n - 1 - i);
            d0 == delta(n - 1 - period - i) && d0 == delta(n - 1 - 2 * period - i)
        })
    }

    /// Returns the updated score of `key`; the score grows only while
    /// repeats arrive exactly `expected_gap` steps apart.
    fn bump(&mut self, key: CandidateKey, step: u64, expected_gap: u64) -> u32 {
        let score = match self.candidates.get(&key) {
            Some(c) if c.expected_gap == expected_gap && step.saturating_sub(c.last_step) == expected_gap => {
                c.score + 1
            }
            _ => 1,
        };
        self.candidates.insert(
            key,
            Score {
                score,
                last_step: step,
                expected_gap,
            },
        );
        score
    }

    fn store(&mut self, summary: Summary) {
        let bucket = self.by_shape.entry(summary.normalized).or_default();
        bucket.push_back(summary);
        if bucket.len() > self.config.max_history_per_shape {
            bucket.pop_front();
        }

        let limit = self.config.max_history_per_shape.max(128);
        self.population_history.push_back(summary.population);
        self.area_history.push_back(summary.area);
        while self.population_history.len() > limit {
            self.population_history.pop_front();
            self.area_history.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EngineAdapter, NaiveEngine, Rule};

    fn classify(cells: CellSet, steps: u64) -> Option<Verdict> {
        let mut heuristic = SteadyHeuristic::default();
        let mut engine = NaiveEngine::new();
        let mut cells = cells;
        for step in 0..steps {
            if let Some(verdict) = heuristic.observe(step, &cells) {
                return Some(verdict);
            }
            cells = engine.run(&cells, 1, &Rule::CONWAY).unwrap().cells;
        }
        None
    }

    #[test]
    fn block_is_still_life() {
        let block: CellSet = [(0, 0), (1, 0), (0, 1), (1, 1)].into_iter().collect();
        let verdict = classify(block, 10).unwrap();
        assert_eq!(verdict.mode, SteadyMode::StillLife);
        assert_eq!(verdict.period, 1);
        assert_eq!(verdict.confidence, 3);
        // seen at steps 0..=3, third confirmation at step 3
        assert_eq!(verdict.step, 3);
    }

    #[test]
    fn blinker_is_oscillator() {
        let blinker: CellSet = [(0, 1), (1, 1), (2, 1)].into_iter().collect();
        let verdict = classify(blinker, 20).unwrap();
        assert_eq!(verdict.mode, SteadyMode::Oscillator);
        assert_eq!(verdict.period, 2);
    }

    #[test]
    fn glider_is_spaceship() {
        let glider: CellSet = [(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)].into_iter().collect();
        let verdict = classify(glider, 40).unwrap();
        assert_eq!(verdict.mode, SteadyMode::Spaceship);
        assert_eq!((verdict.period, verdict.dx, verdict.dy), (4, 1, 1));
    }

    #[test]
    fn steady_growth_is_emission() {
        let mut heuristic = SteadyHeuristic::new(HeuristicConfig {
            emission_min_history: 10,
            ..HeuristicConfig::default()
        });
        // a row growing by two cells per step never repeats its shape
        let mut verdict = None;
        for step in 0..30 {
            let cells: CellSet = (0..=2 * step as i64).map(|x| (x, 0)).collect();
            verdict = heuristic.observe(step, &cells);
            if verdict.is_some() {
                break;
            }
        }
        let verdict = verdict.unwrap();
        assert_eq!(verdict.mode, SteadyMode::PeriodicEmission);
        assert_eq!(verdict.period, 1);
    }

    #[test]
    fn shorter_period_preferred() {
        let still = Candidate {
            key: CandidateKey::Exact(StateHash(1), 2),
            mode: SteadyMode::Oscillator,
            period: 2,
            dx: 0,
            dy: 0,
        };
        let ship = Candidate {
            key: CandidateKey::Ship(StateHash(1), 2, 1, 0),
            mode: SteadyMode::Spaceship,
            period: 2,
            dx: 1,
            dy: 0,
        };
        let short_ship = Candidate { period: 1, ..ship };
        assert_eq!(Candidate::preferred(Some(ship), still).mode, SteadyMode::Oscillator);
        assert_eq!(Candidate::preferred(Some(still), ship).mode, SteadyMode::Oscillator);
        assert_eq!(Candidate::preferred(Some(still), short_ship).period, 1);
    }
}
