use crate::{CellSet, Result, Rule};

/// Outcome of [`EngineAdapter::run`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Advance {
    /// Live cells after the advance.
    pub cells: CellSet,
    /// Number of generations actually advanced.
    pub generations: u64,
}

/// Game engine for Life-like cellular automata on an unbounded plane.
pub trait EngineAdapter: Send {
    /// Advances `cells` by `generations` generations under `rule`.
    ///
    /// The input is left untouched. An engine may stop early when it hits an
    /// internal limit; the number of generations actually advanced is then
    /// reported in [`Advance::generations`], never hidden.
    ///
    /// Fails with [`crate::Error::InvalidGenerations`] if `generations == 0`.
    fn run(&mut self, cells: &CellSet, generations: u64, rule: &Rule) -> Result<Advance>;

    /// Some engines accumulate cache that can be freed.
    fn clear_cache(&mut self) {}

    /// Heap memory used by the engine's caches.
    fn bytes_total(&self) -> usize {
        0
    }

    /// Returns multiline string reporting engine stats.
    fn statistics(&self) -> String {
        String::new()
    }
}
