mod cells;
mod config;
mod format_int;
mod rate;
mod rule;
mod traits;

pub use cells::{Bounds, Cell, CellSet, StateHash};
pub use config::Config;
pub use format_int::NiceInt;
pub use rate::RateMeter;
pub use rule::Rule;
pub use traits::{Advance, EngineAdapter};
