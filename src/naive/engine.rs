use crate::{Advance, Cell, CellSet, EngineAdapter, Error, Result, Rule};
use ahash::AHashMap as HashMap;
use tracing::debug;

/// Reference engine: counts neighbours of every live cell, one generation
/// at a time. Only live cells and their neighbours are ever visited.
#[derive(Default)]
pub struct NaiveEngine {
    generation_cap: Option<u64>,
    neighbor_counts: HashMap<Cell, u8>,
}

impl NaiveEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits the number of generations a single [`EngineAdapter::run`] call
    /// advances. Longer requests are cut short and report the shortfall.
    pub fn with_generation_cap(cap: u64) -> Self {
        Self {
            generation_cap: Some(cap.max(1)),
            ..Self::default()
        }
    }

    /// Single generation update.
    pub fn update(&mut self, cells: &CellSet, rule: &Rule) -> CellSet {
        self.neighbor_counts.clear();
        for cell in cells {
            for n in cell.neighbors() {
                *self.neighbor_counts.entry(n).or_default() += 1;
            }
        }

        let mut next = CellSet::with_capacity(cells.len());
        for (&cell, &count) in &self.neighbor_counts {
            if rule.next_state(cells.contains(cell), count) {
                next.insert(cell);
            }
        }
        // isolated live cells never show up in `neighbor_counts`
        if rule.survival_mask() & 1 != 0 {
            for cell in cells {
                if !self.neighbor_counts.contains_key(&cell) {
                    next.insert(cell);
                }
            }
        }
        next
    }
}

impl EngineAdapter for NaiveEngine {
    fn run(&mut self, cells: &CellSet, generations: u64, rule: &Rule) -> Result<Advance> {
        if generations == 0 {
            return Err(Error::InvalidGenerations(generations));
        }
        let generations = self
            .generation_cap
            .map_or(generations, |cap| generations.min(cap));

        let mut curr = cells.clone();
        for _ in 0..generations {
            curr = self.update(&curr, rule);
        }
        debug!(generations, population = curr.len(), "naive engine advanced");

        Ok(Advance {
            cells: curr,
            generations,
        })
    }

    fn clear_cache(&mut self) {
        self.neighbor_counts = HashMap::new();
    }

    fn bytes_total(&self) -> usize {
        self.neighbor_counts.capacity() * std::mem::size_of::<(Cell, u8)>()
    }

    fn statistics(&self) -> String {
        let mut s = "Engine: Naive\n".to_string();
        if let Some(cap) = self.generation_cap {
            s += &format!("Generation cap: {cap}\n");
        }
        s
    }
}
