mod engine;

pub use engine::NaiveEngine;
